//! Run-wide settings.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// What the driver does when a single step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepErrorPolicy {
    /// Stops the run with the step's error.
    #[default]
    Abort,
    /// Logs the failure and continues with the next step.
    SkipAndLog,
}

/// Settings shared by every node of a run.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct RunSettings {
    /// Skips nodes whose required inputs are empty instead of running them.
    #[builder(default = "true")]
    pub allow_skip_algorithms_without_input: bool,

    /// Maximum number of steps executing at the same time.
    #[builder(default = "default_thread_count()")]
    pub default_thread_count: usize,

    /// Whether the step cache is consulted and filled.
    #[builder(default = "true")]
    pub cache_enabled: bool,

    /// Handling of per-step failures.
    #[builder(default)]
    pub step_error_policy: StepErrorPolicy,
}

impl RunSettings {
    /// Returns a builder for run settings.
    pub fn builder() -> RunSettingsBuilder {
        RunSettingsBuilder::default()
    }
}

impl RunSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(threads) = self.default_thread_count {
            if threads == 0 {
                return Err("default_thread_count must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            allow_skip_algorithms_without_input: true,
            default_thread_count: default_thread_count(),
            cache_enabled: true,
            step_error_policy: StepErrorPolicy::Abort,
        }
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|threads| threads.get())
        .unwrap_or(1)
}
