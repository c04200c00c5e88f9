//! Command implementations; each returns the JSON document printed on stdout.

mod info;
mod plan;

use std::sync::Arc;

use anyhow::Context;
use cellflow_core::DataTypeRegistry;

use crate::config::Command;

/// Runs a command and returns its JSON output.
pub async fn execute(command: Command) -> anyhow::Result<serde_json::Value> {
    let registry = Arc::new(
        DataTypeRegistry::with_builtins().context("failed to register built-in data types")?,
    );

    let output = match command {
        Command::Info(args) => serde_json::to_value(info::execute(&args, registry).await?)?,
        Command::Plan(args) => serde_json::to_value(plan::execute(&args, registry).await?)?,
    };
    Ok(output)
}
