//! Edge data for the underlying petgraph.

use serde::{Deserialize, Serialize};

/// Connects an output slot of one node to an input slot of another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Output slot on the producing node.
    pub from_slot: String,
    /// Input slot on the consuming node.
    pub to_slot: String,
}

impl Connection {
    /// Creates a connection between two slots.
    pub fn new(from_slot: impl Into<String>, to_slot: impl Into<String>) -> Self {
        Self {
            from_slot: from_slot.into(),
            to_slot: to_slot.into(),
        }
    }
}
