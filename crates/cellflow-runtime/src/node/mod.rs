//! Node definitions: slots, batching behavior and step logic.

mod id;
mod io;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use cellflow_core::{BoxedError, SlotInfo, SlotRole};

pub use self::id::NodeId;
pub use self::io::{OutputItem, StepInputs, StepOutputs};
pub use crate::batch::{MissingDataGenerator, PresentRows};
use crate::batch::{BatchingConfig, MergedAnnotations};
use crate::error::{RuntimeError, RuntimeResult};

/// Logic a node runs once per iteration step.
///
/// Bodies are synchronous; the driver moves them onto blocking worker
/// threads. Errors and panics are confined to the step.
pub trait NodeBody: Send + Sync {
    /// Processes one step.
    fn run(
        &self,
        inputs: &StepInputs,
        annotations: &MergedAnnotations,
    ) -> Result<StepOutputs, BoxedError>;
}

impl<F> NodeBody for F
where
    F: Fn(&StepInputs, &MergedAnnotations) -> Result<StepOutputs, BoxedError> + Send + Sync,
{
    fn run(
        &self,
        inputs: &StepInputs,
        annotations: &MergedAnnotations,
    ) -> Result<StepOutputs, BoxedError> {
        self(inputs, annotations)
    }
}

/// A pipeline node.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    inputs: Vec<Arc<SlotInfo>>,
    outputs: Vec<Arc<SlotInfo>>,
    batching: BatchingConfig,
    parallel_safe: bool,
    parameters: serde_json::Value,
    body: Arc<dyn NodeBody>,
    generator: Option<Arc<dyn MissingDataGenerator>>,
}

impl Node {
    /// Creates a node without slots running `body` for every step.
    pub fn new(name: impl Into<String>, body: impl NodeBody + 'static) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            batching: BatchingConfig::default(),
            parallel_safe: false,
            parameters: serde_json::Value::Null,
            body: Arc::new(body),
            generator: None,
        }
    }

    /// Replaces the generated node ID.
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Declares an input slot.
    pub fn with_input(mut self, slot: SlotInfo) -> Self {
        self.inputs.push(Arc::new(slot));
        self
    }

    /// Declares an output slot.
    pub fn with_output(mut self, slot: SlotInfo) -> Self {
        self.outputs.push(Arc::new(slot));
        self
    }

    /// Sets the batching configuration.
    pub fn with_batching(mut self, batching: BatchingConfig) -> Self {
        self.batching = batching;
        self
    }

    /// Allows steps of this node to run concurrently.
    pub fn parallel_safe(mut self, parallel_safe: bool) -> Self {
        self.parallel_safe = parallel_safe;
        self
    }

    /// Sets the parameters that take part in the cache fingerprint.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the generator used for missing data.
    pub fn with_generator(mut self, generator: impl MissingDataGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Returns the node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the input slots in declaration order.
    pub fn inputs(&self) -> &[Arc<SlotInfo>] {
        &self.inputs
    }

    /// Returns the output slots in declaration order.
    pub fn outputs(&self) -> &[Arc<SlotInfo>] {
        &self.outputs
    }

    /// Returns an input slot by name.
    pub fn input(&self, name: &str) -> RuntimeResult<&Arc<SlotInfo>> {
        self.inputs
            .iter()
            .find(|slot| slot.name() == name)
            .ok_or_else(|| self.unknown_slot(name))
    }

    /// Returns an output slot by name.
    pub fn output(&self, name: &str) -> RuntimeResult<&Arc<SlotInfo>> {
        self.outputs
            .iter()
            .find(|slot| slot.name() == name)
            .ok_or_else(|| self.unknown_slot(name))
    }

    /// Returns the batching configuration.
    pub fn batching(&self) -> &BatchingConfig {
        &self.batching
    }

    /// Returns whether steps may run concurrently.
    pub fn is_parallel_safe(&self) -> bool {
        self.parallel_safe
    }

    /// Returns the node parameters.
    pub fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }

    /// Returns the step logic.
    pub fn body(&self) -> &Arc<dyn NodeBody> {
        &self.body
    }

    /// Returns the missing-data generator, if any.
    pub fn generator(&self) -> Option<&dyn MissingDataGenerator> {
        self.generator.as_deref()
    }

    /// Checks slot names and roles.
    pub fn validate(&self) -> RuntimeResult<()> {
        for (slots, role) in [(&self.inputs, SlotRole::Input), (&self.outputs, SlotRole::Output)] {
            let mut names = BTreeSet::new();
            for slot in slots {
                if slot.role() != role {
                    return Err(RuntimeError::InvalidDefinition(format!(
                        "slot '{}' of node '{}' is declared with the wrong role",
                        slot.name(),
                        self.name
                    )));
                }
                if !names.insert(slot.name()) {
                    return Err(RuntimeError::InvalidDefinition(format!(
                        "node '{}' declares slot '{}' twice",
                        self.name,
                        slot.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn unknown_slot(&self, slot: &str) -> RuntimeError {
        RuntimeError::UnknownSlot {
            node: self.name.clone(),
            slot: slot.to_owned(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("batching", &self.batching)
            .field("parallel_safe", &self.parallel_safe)
            .field("has_generator", &self.generator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &StepInputs, _: &MergedAnnotations) -> Result<StepOutputs, BoxedError> {
        Ok(StepOutputs::new())
    }

    #[test]
    fn test_slot_lookup() {
        let node = Node::new("Threshold", noop)
            .with_input(SlotInfo::input("Image", "string"))
            .with_output(SlotInfo::output("Mask", "string"));

        assert!(node.validate().is_ok());
        assert_eq!(node.input("Image").unwrap().name(), "Image");
        assert!(matches!(
            node.output("Image"),
            Err(RuntimeError::UnknownSlot { ref slot, .. }) if slot == "Image"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_slots() {
        let duplicate = Node::new("A", noop)
            .with_input(SlotInfo::input("In", "string"))
            .with_input(SlotInfo::input("In", "number"));
        assert!(duplicate.validate().is_err());

        let wrong_role = Node::new("B", noop).with_input(SlotInfo::output("In", "string"));
        assert!(wrong_role.validate().is_err());
    }
}
