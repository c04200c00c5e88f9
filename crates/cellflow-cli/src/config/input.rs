//! `SLOT=DIR` input arguments.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail};

/// A stored table feeding a named input slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSource {
    /// Input slot name.
    pub slot: String,
    /// Table directory.
    pub path: PathBuf,
}

impl FromStr for SlotSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (slot, path) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected SLOT=DIR, got '{s}'"))?;
        let slot = slot.trim();
        if slot.is_empty() || path.is_empty() {
            bail!("expected SLOT=DIR, got '{s}'");
        }

        Ok(Self {
            slot: slot.to_owned(),
            path: PathBuf::from(path),
        })
    }
}
