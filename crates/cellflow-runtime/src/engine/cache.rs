//! Step result caching.

use std::collections::HashMap;
use std::sync::RwLock;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::batch::MatchingKey;
use crate::node::{NodeId, StepOutputs};

/// Identity of a step result: node, matching key and node parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the hex-encoded SHA-256 fingerprint of a step.
    pub fn compute(node: NodeId, key: &MatchingKey, parameters: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(node.as_bytes());
        hasher.update([0u8]);
        hasher.update(key.serialized().as_bytes());
        hasher.update([0u8]);
        hasher.update(parameters.to_string().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Storage for the outputs of finished steps.
///
/// Consulted before a step runs; a hit bypasses the node body.
pub trait StepCache: Send + Sync {
    /// Returns the cached outputs of a step.
    fn get(&self, fingerprint: &Fingerprint) -> Option<StepOutputs>;

    /// Stores the outputs of a step.
    fn put(&self, fingerprint: Fingerprint, outputs: StepOutputs);
}

/// Process-local [`StepCache`].
#[derive(Debug, Default)]
pub struct InMemoryStepCache {
    entries: RwLock<HashMap<Fingerprint, StepOutputs>>,
}

impl InMemoryStepCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached steps.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl StepCache for InMemoryStepCache {
    fn get(&self, fingerprint: &Fingerprint) -> Option<StepOutputs> {
        self.entries.read().ok()?.get(fingerprint).cloned()
    }

    fn put(&self, fingerprint: Fingerprint, outputs: StepOutputs) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(fingerprint, outputs);
        }
    }
}
