//! Step execution for a single node.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use cellflow_core::{
    BoxedError, DataRow, DataTable, DataTypeRegistry, ProgressInfo, RunId, SourceContext,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use super::RunSettings;
use super::cache::{Fingerprint, StepCache};
use super::config::StepErrorPolicy;
use super::receive::SlotReceiver;
use crate::TRACING_TARGET_ENGINE;
use crate::batch::{BatchAssembler, IterationStep, MatchingKey, StepOutcome};
use crate::error::{RuntimeError, RuntimeResult};
use crate::node::{Node, StepInputs, StepOutputs};

/// Upstream tables offered to a node, by input slot name.
///
/// Several tables for one slot are received one after another.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    tables: BTreeMap<String, Vec<DataTable>>,
}

impl NodeInputs {
    /// Creates empty inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a table to an input slot, builder style.
    pub fn with(mut self, slot: impl Into<String>, table: DataTable) -> Self {
        self.push(slot, table);
        self
    }

    /// Offers a table to an input slot.
    pub fn push(&mut self, slot: impl Into<String>, table: DataTable) {
        self.tables.entry(slot.into()).or_default().push(table);
    }

    /// Returns the tables offered to a slot.
    pub fn get(&self, slot: &str) -> &[DataTable] {
        self.tables.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the slot names that were offered tables.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// A step that failed and was skipped under [`StepErrorPolicy::SkipAndLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// Matching key of the step.
    pub key: String,
    /// Error summary.
    pub message: String,
}

/// What happened to the steps of one node run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// The node did not run because a required input was empty.
    pub node_skipped: bool,
    /// Steps whose body ran.
    pub executed: usize,
    /// Steps served from the cache.
    pub cached: usize,
    /// Keys dropped by the missing-data policy.
    pub skipped: Vec<String>,
    /// Steps that failed without aborting the run.
    pub failed: Vec<StepFailure>,
}

/// Output tables and report of one node run.
#[derive(Debug)]
pub struct NodeRun {
    outputs: BTreeMap<String, DataTable>,
    report: RunReport,
}

impl NodeRun {
    /// Returns the table of an output slot.
    pub fn output(&self, slot: &str) -> Option<&DataTable> {
        self.outputs.get(slot)
    }

    /// Returns every output table, by slot name.
    pub fn outputs(&self) -> &BTreeMap<String, DataTable> {
        &self.outputs
    }

    /// Returns the step report.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Consumes the run, returning its output tables.
    pub fn into_outputs(self) -> BTreeMap<String, DataTable> {
        self.outputs
    }
}

/// Result of one step before its outputs are appended.
struct Finished {
    step: IterationStep,
    fingerprint: Option<Fingerprint>,
    cached: bool,
    outcome: RuntimeResult<StepOutputs>,
}

enum Pending {
    Done(Finished),
    Running {
        step: IterationStep,
        fingerprint: Option<Fingerprint>,
        handle: JoinHandle<Result<StepOutputs, BoxedError>>,
    },
}

/// Runs node bodies step by step.
///
/// Steps of parallel-safe nodes run concurrently on blocking worker threads,
/// bounded by the run's thread count. Outputs are always appended in step
/// order, so row indices do not depend on scheduling.
pub struct ExecutionDriver {
    registry: Arc<DataTypeRegistry>,
    settings: RunSettings,
    cache: Option<Arc<dyn StepCache>>,
    semaphore: Arc<Semaphore>,
    run_id: RunId,
}

impl ExecutionDriver {
    /// Creates a driver for one run.
    pub fn new(registry: Arc<DataTypeRegistry>, settings: RunSettings) -> Self {
        let permits = settings.default_thread_count.max(1);
        let run_id = RunId::new();

        tracing::info!(
            target: TRACING_TARGET_ENGINE,
            run_id = %run_id,
            threads = permits,
            cache_enabled = settings.cache_enabled,
            "Execution driver initialized"
        );

        Self {
            registry,
            settings,
            cache: None,
            semaphore: Arc::new(Semaphore::new(permits)),
            run_id,
        }
    }

    /// Attaches a step cache.
    pub fn with_cache(mut self, cache: Arc<dyn StepCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns the run settings.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Returns the data type registry.
    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    /// Returns the ID stamped on every table this driver produces.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Runs a node over its inputs.
    ///
    /// Cancellation is checked before each step; a cancelled run discards its
    /// outputs and returns [`RuntimeError::Cancelled`].
    pub async fn run_node(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        progress: &ProgressInfo,
    ) -> RuntimeResult<NodeRun> {
        node.validate()?;
        for slot in inputs.slots() {
            node.input(slot)?;
        }

        let progress = progress.resolve(node.name());
        let mut report = RunReport::default();

        let received = node
            .inputs()
            .iter()
            .map(|slot| {
                SlotReceiver::new(&self.registry, slot.clone()).receive(inputs.get(slot.name()), self.run_id)
            })
            .collect::<RuntimeResult<Vec<_>>>()?;

        if self.settings.allow_skip_algorithms_without_input {
            if let Some(empty) = received
                .iter()
                .find(|table| !table.slot().is_optional() && table.is_empty())
            {
                tracing::warn!(
                    target: TRACING_TARGET_ENGINE,
                    node_id = %node.id(),
                    slot = empty.slot().name(),
                    "Skipping node without input"
                );
                progress.log(format!("Skipped: slot '{}' has no data", empty.slot().name()));
                report.node_skipped = true;
                return Ok(NodeRun {
                    outputs: self.empty_outputs(node),
                    report,
                });
            }
        }

        let tables: Vec<&DataTable> = received.iter().collect();
        let plan = BatchAssembler::new(&self.registry, node.batching())
            .with_generator(node.generator())
            .assemble(&tables, &progress)?;

        let mut steps = Vec::with_capacity(plan.len());
        for outcome in plan.into_outcomes() {
            match outcome {
                StepOutcome::Step(step) => steps.push(step),
                StepOutcome::Skipped(skipped) => report.skipped.push(skipped.key.to_string()),
                StepOutcome::Failed(failed) => {
                    self.step_failed(node, &failed.key, failed.error, &mut report, &progress)?;
                }
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_ENGINE,
            node_id = %node.id(),
            steps = steps.len(),
            parallel = node.is_parallel_safe(),
            "Executing node"
        );

        let finished = self.execute(node, &tables, steps, &progress).await?;

        let mut outputs = self.empty_outputs(node);
        for Finished {
            step,
            fingerprint,
            cached,
            outcome,
        } in finished
        {
            let rows = outcome.and_then(|produced| {
                let rows = self.output_rows(node, &step, &produced)?;
                Ok((rows, produced))
            });

            match rows {
                Ok((rows, produced)) => {
                    for (slot, row) in rows {
                        if let Some(table) = outputs.get_mut(&slot) {
                            table.push_row(row);
                        }
                    }
                    if cached {
                        report.cached += 1;
                    } else {
                        report.executed += 1;
                        if let (Some(cache), Some(fingerprint)) = (&self.cache, fingerprint) {
                            cache.put(fingerprint, produced);
                        }
                    }
                }
                Err(error) => {
                    self.step_failed(node, step.key(), error, &mut report, &progress)?;
                }
            }
        }

        progress.log(format!(
            "Finished: {} executed, {} cached, {} skipped, {} failed",
            report.executed,
            report.cached,
            report.skipped.len(),
            report.failed.len()
        ));

        Ok(NodeRun { outputs, report })
    }

    async fn execute(
        &self,
        node: &Node,
        tables: &[&DataTable],
        steps: Vec<IterationStep>,
        progress: &ProgressInfo,
    ) -> RuntimeResult<Vec<Finished>> {
        let parallel = node.is_parallel_safe();
        let mut pending = Vec::with_capacity(steps.len());
        let mut cancelled = false;

        for step in steps {
            if progress.is_cancelled() {
                cancelled = true;
                break;
            }

            let fingerprint = self.fingerprint(node, step.key());
            let hit = fingerprint
                .as_ref()
                .zip(self.cache.as_ref())
                .and_then(|(fingerprint, cache)| cache.get(fingerprint));
            if let Some(outputs) = hit {
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    node_id = %node.id(),
                    step = step.index(),
                    "Step served from cache"
                );
                pending.push(Pending::Done(Finished {
                    step,
                    fingerprint,
                    cached: true,
                    outcome: Ok(outputs),
                }));
                continue;
            }

            let inputs = StepInputs::new(step.index(), step.key().clone(), step.materialize(tables)?);
            let annotations = step.annotations().clone();
            let body = node.body().clone();
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| RuntimeError::Internal(format!("semaphore closed: {err}")))?;

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                body.run(&inputs, &annotations)
            });

            if parallel {
                pending.push(Pending::Running {
                    step,
                    fingerprint,
                    handle,
                });
            } else {
                let outcome = finish(node, &step, handle.await);
                pending.push(Pending::Done(Finished {
                    step,
                    fingerprint,
                    cached: false,
                    outcome,
                }));
            }
        }

        let finished = futures::future::join_all(pending.into_iter().map(|pending| async move {
            match pending {
                Pending::Done(finished) => finished,
                Pending::Running {
                    step,
                    fingerprint,
                    handle,
                } => {
                    let outcome = finish(node, &step, handle.await);
                    Finished {
                        step,
                        fingerprint,
                        cached: false,
                        outcome,
                    }
                }
            }
        }))
        .await;

        if cancelled {
            tracing::info!(
                target: TRACING_TARGET_ENGINE,
                node_id = %node.id(),
                completed = finished.len(),
                "Node execution cancelled"
            );
            progress.log("Cancelled");
            return Err(RuntimeError::Cancelled);
        }

        Ok(finished)
    }

    fn fingerprint(&self, node: &Node, key: &MatchingKey) -> Option<Fingerprint> {
        (self.settings.cache_enabled && self.cache.is_some())
            .then(|| Fingerprint::compute(node.id(), key, node.parameters()))
    }

    /// Converts step outputs into output rows; nothing is appended on failure.
    fn output_rows(
        &self,
        node: &Node,
        step: &IterationStep,
        produced: &StepOutputs,
    ) -> RuntimeResult<Vec<(String, DataRow)>> {
        produced
            .items()
            .iter()
            .map(|(slot, item)| -> RuntimeResult<(String, DataRow)> {
                let info = node.output(slot)?;
                let value = self.registry.convert_value(item.value(), info.data_type())?;
                let annotations = step.annotations().for_output(item.added(), item.removed())?;
                let context = SourceContext::produced_by(node.id(), step.index());
                Ok((slot.clone(), DataRow::new(value, annotations, context)))
            })
            .collect()
    }

    fn step_failed(
        &self,
        node: &Node,
        key: &MatchingKey,
        error: RuntimeError,
        report: &mut RunReport,
        progress: &ProgressInfo,
    ) -> RuntimeResult<()> {
        if error.is_configuration() || self.settings.step_error_policy == StepErrorPolicy::Abort {
            return Err(error);
        }

        tracing::warn!(
            target: TRACING_TARGET_ENGINE,
            node_id = %node.id(),
            key = %key,
            error = %error,
            "Step failed and was skipped"
        );
        progress.log(format!("Step {key} failed: {error}"));
        report.failed.push(StepFailure {
            key: key.to_string(),
            message: error.to_string(),
        });
        Ok(())
    }

    fn empty_outputs(&self, node: &Node) -> BTreeMap<String, DataTable> {
        node.outputs()
            .iter()
            .map(|slot| (slot.name().to_owned(), DataTable::new(slot.clone(), self.run_id)))
            .collect()
    }
}

fn finish(
    node: &Node,
    step: &IterationStep,
    joined: Result<Result<StepOutputs, BoxedError>, JoinError>,
) -> RuntimeResult<StepOutputs> {
    match joined {
        Ok(Ok(outputs)) => Ok(outputs),
        Ok(Err(source)) => Err(RuntimeError::NodeFailed {
            node_id: node.id(),
            step: step.index(),
            key: step.key().serialized(),
            source,
        }),
        Err(err) if err.is_panic() => Err(RuntimeError::StepPanicked {
            node_id: node.id(),
            step: step.index(),
            message: panic_message(err.into_panic()),
        }),
        Err(err) => Err(RuntimeError::Internal(format!("step task failed: {err}"))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use cellflow_core::{AnnotationSet, DataValue, SlotInfo};

    use super::*;
    use crate::batch::{
        AnnotationMergeMode, BatchingConfig, ColumnMatching, IterationMode, MergedAnnotations,
    };
    use crate::engine::InMemoryStepCache;
    use crate::node::{NodeBody, OutputItem};

    fn registry() -> Arc<DataTypeRegistry> {
        Arc::new(DataTypeRegistry::with_builtins().unwrap())
    }

    fn settings(threads: usize, policy: StepErrorPolicy) -> RunSettings {
        RunSettings::builder()
            .default_thread_count(threads)
            .step_error_policy(policy)
            .build()
            .unwrap()
    }

    fn upstream(values: &[(&str, &str)]) -> DataTable {
        let mut table = DataTable::new(SlotInfo::output("Source", "string"), RunId::new());
        for (x, value) in values {
            table.add_row(
                DataValue::new("string", value.to_string()),
                AnnotationSet::new().with("X", *x).with("Operator", "kim"),
                SourceContext::new(),
            );
        }
        table
    }

    fn upper(inputs: &StepInputs, _: &MergedAnnotations) -> Result<StepOutputs, BoxedError> {
        let text = inputs.value::<String>("In").ok_or("missing input")?;
        if text == "slow" {
            std::thread::sleep(Duration::from_millis(40));
        }
        Ok(StepOutputs::new().with("Out", DataValue::new("string", text.to_uppercase())))
    }

    fn node(body: impl NodeBody + 'static) -> Node {
        Node::new("Upper", body)
            .with_input(SlotInfo::input("In", "string"))
            .with_output(SlotInfo::output("Out", "string"))
    }

    fn texts(table: &DataTable) -> Vec<String> {
        table
            .rows()
            .iter()
            .filter_map(|row| row.value().downcast_ref::<String>().cloned())
            .collect()
    }

    #[tokio::test]
    async fn test_outputs_follow_step_order() {
        let inputs =
            NodeInputs::new().with("In", upstream(&[("a", "slow"), ("b", "fast"), ("c", "also")]));

        for parallel in [false, true] {
            let driver = ExecutionDriver::new(registry(), settings(4, StepErrorPolicy::Abort));
            let node = node(upper).parallel_safe(parallel);

            let run = driver.run_node(&node, &inputs, &ProgressInfo::new()).await.unwrap();
            let out = run.output("Out").unwrap();

            assert_eq!(texts(out), vec!["SLOW", "FAST", "ALSO"]);
            assert_eq!(out.run_id(), driver.run_id());
            assert_eq!(run.report().executed, 3);

            let second = out.get_row(1).unwrap();
            assert_eq!(second.annotations().get("X"), Some("b"));
            assert_eq!(second.annotations().get("Operator"), Some("kim"));
            assert_eq!(second.context().step, Some(1));
            assert_eq!(second.context().node, Some(node.id().to_string()));
        }
    }

    #[tokio::test]
    async fn test_inputs_are_converted_to_slot_type() {
        let mut numbers = DataTable::new(SlotInfo::output("Source", "number"), RunId::new());
        numbers.add_row(DataValue::new("number", 2.5_f64), AnnotationSet::new(), SourceContext::new());
        let driver = ExecutionDriver::new(registry(), RunSettings::default());

        let run = driver
            .run_node(&node(upper), &NodeInputs::new().with("In", numbers), &ProgressInfo::new())
            .await
            .unwrap();

        assert_eq!(texts(run.output("Out").unwrap()), vec!["2.5"]);
    }

    #[tokio::test]
    async fn test_cache_hit_bypasses_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let node = node(
            move |inputs: &StepInputs, annotations: &MergedAnnotations| -> Result<StepOutputs, BoxedError> {
                counter.fetch_add(1, Ordering::SeqCst);
                upper(inputs, annotations)
            },
        );
        let inputs = NodeInputs::new().with("In", upstream(&[("a", "x"), ("b", "y")]));
        let cache = Arc::new(InMemoryStepCache::new());
        let driver = ExecutionDriver::new(registry(), RunSettings::default()).with_cache(cache.clone());

        let first = driver.run_node(&node, &inputs, &ProgressInfo::new()).await.unwrap();
        let second = driver.run_node(&node, &inputs, &ProgressInfo::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(second.report().cached, 2);
        assert_eq!(second.report().executed, 0);
        assert_eq!(texts(first.output("Out").unwrap()), texts(second.output("Out").unwrap()));

        let uncached = RunSettings::builder().cache_enabled(false).build().unwrap();
        let driver = ExecutionDriver::new(registry(), uncached).with_cache(cache);
        driver.run_node(&node, &inputs, &ProgressInfo::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cancellation_discards_outputs() {
        let progress = ProgressInfo::new();
        let token = progress.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let node = node(
            move |inputs: &StepInputs, annotations: &MergedAnnotations| -> Result<StepOutputs, BoxedError> {
                counter.fetch_add(1, Ordering::SeqCst);
                token.cancel();
                upper(inputs, annotations)
            },
        );
        let inputs = NodeInputs::new().with("In", upstream(&[("a", "x"), ("b", "y"), ("c", "z")]));
        let driver = ExecutionDriver::new(registry(), RunSettings::default());

        let error = driver.run_node(&node, &inputs, &progress).await.unwrap_err();

        assert!(matches!(error, RuntimeError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn failing_on_b(inputs: &StepInputs, annotations: &MergedAnnotations) -> Result<StepOutputs, BoxedError> {
        if inputs.key().get("X") == Some("b") {
            return Err("cannot process b".into());
        }
        upper(inputs, annotations)
    }

    fn panicking_on_b(inputs: &StepInputs, annotations: &MergedAnnotations) -> Result<StepOutputs, BoxedError> {
        if inputs.key().get("X") == Some("b") {
            panic!("corrupt input");
        }
        upper(inputs, annotations)
    }

    #[tokio::test]
    async fn test_step_error_policy() {
        let inputs = NodeInputs::new().with("In", upstream(&[("a", "x"), ("b", "y"), ("c", "z")]));

        let abort = ExecutionDriver::new(registry(), settings(2, StepErrorPolicy::Abort));
        let error = abort
            .run_node(&node(failing_on_b), &inputs, &ProgressInfo::new())
            .await
            .unwrap_err();
        assert!(matches!(error, RuntimeError::NodeFailed { step: 1, .. }));

        let skip = ExecutionDriver::new(registry(), settings(2, StepErrorPolicy::SkipAndLog));
        type Body = fn(&StepInputs, &MergedAnnotations) -> Result<StepOutputs, BoxedError>;
        for body in [failing_on_b as Body, panicking_on_b] {
            let progress = ProgressInfo::new().recording();
            let run = skip
                .run_node(&node(body).parallel_safe(true), &inputs, &progress)
                .await
                .unwrap();

            assert_eq!(texts(run.output("Out").unwrap()), vec!["X", "Z"]);
            assert_eq!(run.report().failed.len(), 1);
            assert!(run.report().failed[0].key.contains("X=b"));
            assert!(progress.messages().iter().any(|line| line.contains("failed")));
        }
    }

    #[tokio::test]
    async fn test_unknown_output_slot_aborts() {
        let body = |_: &StepInputs, _: &MergedAnnotations| -> Result<StepOutputs, BoxedError> {
            Ok(StepOutputs::new().with("Nope", DataValue::new("string", String::new())))
        };
        let inputs = NodeInputs::new().with("In", upstream(&[("a", "x")]));
        let driver = ExecutionDriver::new(registry(), settings(1, StepErrorPolicy::SkipAndLog));

        let error = driver
            .run_node(&node(body), &inputs, &ProgressInfo::new())
            .await
            .unwrap_err();

        assert!(matches!(error, RuntimeError::UnknownSlot { ref slot, .. } if slot == "Nope"));
    }

    #[tokio::test]
    async fn test_unknown_input_slot_rejected() {
        let inputs = NodeInputs::new().with("Other", upstream(&[("a", "x")]));
        let driver = ExecutionDriver::new(registry(), RunSettings::default());

        let error = driver
            .run_node(&node(upper), &inputs, &ProgressInfo::new())
            .await
            .unwrap_err();

        assert!(matches!(error, RuntimeError::UnknownSlot { .. }));
    }

    #[tokio::test]
    async fn test_annotation_conflict_surfaces_on_output() {
        let mut table = DataTable::new(SlotInfo::output("Source", "string"), RunId::new());
        for channel in ["red", "green"] {
            table.add_row(
                DataValue::new("string", channel.to_owned()),
                AnnotationSet::new().with("X", "a").with("Channel", channel),
                SourceContext::new(),
            );
        }
        let inputs = NodeInputs::new().with("In", table);
        let batching = BatchingConfig {
            mode: IterationMode::Merging,
            column_matching: ColumnMatching::Custom(["X".to_owned()].into()),
            merge_mode: AnnotationMergeMode::ErrorOnConflict,
            ..BatchingConfig::default()
        };
        let count = |drop_channel: bool| {
            move |inputs: &StepInputs, _: &MergedAnnotations| -> Result<StepOutputs, BoxedError> {
                let mut item = OutputItem::new(DataValue::new("number", inputs.rows("In").len() as f64));
                if drop_channel {
                    item = item.without_annotation("Channel");
                }
                Ok(StepOutputs::new().with("Out", item))
            }
        };
        let driver = ExecutionDriver::new(registry(), settings(1, StepErrorPolicy::Abort));

        let error = driver
            .run_node(&node(count(false)).with_batching(batching.clone()), &inputs, &ProgressInfo::new())
            .await
            .unwrap_err();
        assert!(matches!(error, RuntimeError::AnnotationConflict { ref name, .. } if name == "Channel"));

        let run = driver
            .run_node(&node(count(true)).with_batching(batching), &inputs, &ProgressInfo::new())
            .await
            .unwrap();
        let row = run.output("Out").unwrap().get_row(0).unwrap();
        assert_eq!(row.value().downcast_ref::<String>().map(String::as_str), Some("2"));
        assert!(!row.annotations().contains("Channel"));
    }

    #[tokio::test]
    async fn test_node_without_input_is_skipped() {
        let empty = NodeInputs::new().with("In", upstream(&[]));

        let driver = ExecutionDriver::new(registry(), RunSettings::default());
        let run = driver.run_node(&node(upper), &empty, &ProgressInfo::new()).await.unwrap();
        assert!(run.report().node_skipped);
        assert!(run.output("Out").unwrap().is_empty());

        let strict = RunSettings::builder()
            .allow_skip_algorithms_without_input(false)
            .build()
            .unwrap();
        let driver = ExecutionDriver::new(registry(), strict);
        let run = driver.run_node(&node(upper), &empty, &ProgressInfo::new()).await.unwrap();
        assert!(!run.report().node_skipped);
        assert_eq!(run.report().executed, 0);
    }
}
