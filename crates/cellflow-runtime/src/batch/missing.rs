//! Handling of slots that have no row for a step.

use std::collections::BTreeMap;

use cellflow_core::{BoxedError, DataRow, DataTypeRegistry, DataValue, SlotInfo, SourceContext};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::key::MatchingKey;
use crate::error::{RuntimeError, RuntimeResult};

/// Origin recorded on rows produced by a [`MissingDataGenerator`].
pub const GENERATED_ORIGIN: &str = "generated";

/// What happens when a slot has no row for a candidate key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingDataPolicy {
    /// Drops the step and logs it.
    #[default]
    Skip,
    /// Asks the node's generator for a placeholder row.
    Generate,
    /// Aborts the assembly.
    Fail,
}

/// Rows already selected for the other slots of a step, by slot name.
pub type PresentRows<'a> = BTreeMap<&'a str, Vec<&'a DataRow>>;

/// Synthesizes a placeholder value for a slot that has no data in a step.
///
/// The generator sees the rows the other slots contribute to the same step,
/// e.g. to create a blank image with the size of a reference image.
pub trait MissingDataGenerator: Send + Sync {
    /// Produces a value for `slot` at `key`.
    fn generate(
        &self,
        slot: &SlotInfo,
        key: &MatchingKey,
        present: &PresentRows<'_>,
    ) -> Result<DataValue, BoxedError>;
}

/// Decision for one missing slot.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// The step is dropped.
    Skip,
    /// The slot stays empty.
    Empty,
    /// The slot receives a generated row.
    Generated(DataRow),
}

/// Applies a [`MissingDataPolicy`] to slots without data.
pub(crate) struct MissingDataResolver<'a> {
    policy: MissingDataPolicy,
    generator: Option<&'a dyn MissingDataGenerator>,
    registry: &'a DataTypeRegistry,
}

impl<'a> MissingDataResolver<'a> {
    pub(crate) fn new(
        policy: MissingDataPolicy,
        generator: Option<&'a dyn MissingDataGenerator>,
        registry: &'a DataTypeRegistry,
    ) -> Self {
        Self {
            policy,
            generator,
            registry,
        }
    }

    /// Resolves one slot without data at `key`.
    ///
    /// Returns `MissingRequiredInput` for required slots under
    /// [`MissingDataPolicy::Fail`] and `Generation` when a placeholder cannot
    /// be produced.
    pub(crate) fn resolve(
        &self,
        slot: &SlotInfo,
        key: &MatchingKey,
        present: &PresentRows<'_>,
    ) -> RuntimeResult<Resolution> {
        match (self.policy, slot.is_optional()) {
            (MissingDataPolicy::Generate, _) => self.generate(slot, key, present),
            (_, true) => Ok(Resolution::Empty),
            (MissingDataPolicy::Skip, false) => Ok(Resolution::Skip),
            (MissingDataPolicy::Fail, false) => Err(RuntimeError::MissingRequiredInput {
                slot: slot.name().to_owned(),
                key: key.serialized(),
            }),
        }
    }

    fn generate(
        &self,
        slot: &SlotInfo,
        key: &MatchingKey,
        present: &PresentRows<'_>,
    ) -> RuntimeResult<Resolution> {
        let generation_error = |source: BoxedError| RuntimeError::Generation {
            slot: slot.name().to_owned(),
            key: key.serialized(),
            source,
        };

        let Some(generator) = self.generator else {
            if slot.is_optional() {
                return Ok(Resolution::Empty);
            }
            return Err(generation_error("node declares no missing-data generator".into()));
        };

        let value = generator
            .generate(slot, key, present)
            .map_err(generation_error)?;
        let value = self
            .registry
            .convert_value(&value, slot.data_type())
            .map_err(|err| generation_error(Box::new(err)))?;

        Ok(Resolution::Generated(DataRow::new(
            value,
            key.annotations().without_reserved(),
            SourceContext::from_origin(GENERATED_ORIGIN),
        )))
    }
}
