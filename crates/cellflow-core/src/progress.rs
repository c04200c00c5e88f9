//! Hierarchical progress reporting and cooperative cancellation.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_PROGRESS;

/// Progress handle passed down through a run.
///
/// Children created with [`resolve`](ProgressInfo::resolve) share the parent's
/// cancellation token and journal, and extend its label.
#[derive(Clone)]
pub struct ProgressInfo {
    label: Arc<str>,
    cancellation: CancellationToken,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl ProgressInfo {
    /// Creates a root progress handle.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Creates a root progress handle bound to an existing token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            label: Arc::from(""),
            cancellation,
            journal: None,
        }
    }

    /// Keeps a copy of every logged message, readable via [`messages`](Self::messages).
    pub fn recording(mut self) -> Self {
        self.journal = Some(Arc::new(Mutex::new(Vec::new())));
        self
    }

    /// Returns a child handle for a sub-task.
    pub fn resolve(&self, label: impl fmt::Display) -> Self {
        let label = if self.label.is_empty() {
            label.to_string()
        } else {
            format!("{} | {}", self.label, label)
        };

        Self {
            label: Arc::from(label),
            cancellation: self.cancellation.clone(),
            journal: self.journal.clone(),
        }
    }

    /// Returns a child handle for item `index` of `total`.
    pub fn resolve_item(&self, label: impl fmt::Display, index: usize, total: usize) -> Self {
        self.resolve(format!("{label} {}/{total}", index + 1))
    }

    /// Logs a message under this handle's label.
    pub fn log(&self, message: impl fmt::Display) {
        let line = if self.label.is_empty() {
            message.to_string()
        } else {
            format!("{} | {}", self.label, message)
        };

        tracing::info!(target: TRACING_TARGET_PROGRESS, "{line}");

        if let Some(journal) = &self.journal {
            if let Ok(mut journal) = journal.lock() {
                journal.push(line);
            }
        }
    }

    /// Returns the full label of this handle.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Requests cancellation of the whole run.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns the shared cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns recorded messages, if recording is enabled.
    pub fn messages(&self) -> Vec<String> {
        self.journal
            .as_ref()
            .and_then(|journal| journal.lock().ok().map(|journal| journal.clone()))
            .unwrap_or_default()
    }
}

impl Default for ProgressInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressInfo")
            .field("label", &self.label)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_extends_label() {
        let root = ProgressInfo::new().recording();
        let child = root.resolve("Node A").resolve_item("Step", 0, 3);

        child.log("running");

        assert_eq!(child.label(), "Node A | Step 1/3");
        assert_eq!(root.messages(), vec!["Node A | Step 1/3 | running".to_owned()]);
    }

    #[test]
    fn test_cancellation_is_shared() {
        let root = ProgressInfo::new();
        let child = root.resolve("child");

        child.cancel();

        assert!(root.is_cancelled());
    }

    #[test]
    fn test_messages_empty_without_recording() {
        let root = ProgressInfo::new();
        root.log("hello");

        assert!(root.messages().is_empty());
    }
}
