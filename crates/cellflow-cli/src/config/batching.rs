//! Batching options of `cellflow plan`.

use std::collections::BTreeSet;
use std::ops::Range;

use anyhow::{Context, bail};
use cellflow_runtime::batch::{
    AnnotationMergeMode, BatchingConfig, ColumnMatching, IterationMode, MissingDataPolicy,
};
use clap::{Args, ValueEnum};

/// How the matching columns are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MatchingStrategy {
    /// Every annotation name present in any non-empty input.
    #[default]
    Union,
    /// Annotation names present in every non-empty input.
    Intersection,
    /// Like `union`, restricted to `#`-prefixed names.
    PrefixHashUnion,
    /// Like `intersection`, restricted to `#`-prefixed names.
    PrefixHashIntersection,
    /// Exactly the names given with `--columns`.
    Custom,
    /// No columns; a single step over everything.
    None,
    /// Every input row runs as a step of its own.
    SplitAll,
}

/// Batching configuration of the planned node.
///
/// # Environment Variables
///
/// - `CELLFLOW_MODE` - `iterating` (default) or `merging`
/// - `CELLFLOW_MATCHING` - column matching strategy (default: union)
/// - `CELLFLOW_COLUMNS` - comma-separated columns for the custom strategy
/// - `CELLFLOW_IGNORE` - comma-separated columns never used for matching
/// - `CELLFLOW_MERGE` - annotation merge mode (default: merge)
/// - `CELLFLOW_MISSING` - missing data policy (default: skip)
/// - `CELLFLOW_LIMIT` - half-open range of step indices to keep, e.g. `0..10`
#[derive(Debug, Clone, Args)]
pub struct BatchingArgs {
    /// Iteration mode: `iterating` or `merging`.
    #[arg(long, env = "CELLFLOW_MODE", default_value = "iterating")]
    pub mode: IterationMode,

    /// Column matching strategy.
    #[arg(long, env = "CELLFLOW_MATCHING", value_enum, default_value_t = MatchingStrategy::Union)]
    pub matching: MatchingStrategy,

    /// Columns used by the custom matching strategy.
    #[arg(long, env = "CELLFLOW_COLUMNS", value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Columns excluded from matching.
    #[arg(long, env = "CELLFLOW_IGNORE", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Annotation merge mode, e.g. `merge`, `keep_first`, `error_on_conflict`.
    #[arg(long, env = "CELLFLOW_MERGE", default_value = "merge")]
    pub merge: AnnotationMergeMode,

    /// Missing data policy: `skip`, `generate` or `fail`.
    #[arg(long, env = "CELLFLOW_MISSING", default_value = "skip")]
    pub missing: MissingDataPolicy,

    /// Only keeps the steps whose index lies in `START..END`.
    #[arg(long, env = "CELLFLOW_LIMIT", value_parser = parse_limit)]
    pub limit: Option<Range<usize>>,
}

fn parse_limit(value: &str) -> Result<Range<usize>, String> {
    let (start, end) = value
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{value}'"))?;
    let parse = |bound: &str| {
        bound
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid bound '{bound}': {err}"))
    };
    let range = parse(start)?..parse(end)?;
    if range.is_empty() {
        return Err(format!("range '{value}' selects no step"));
    }
    Ok(range)
}

impl BatchingArgs {
    /// Builds the node batching configuration.
    pub fn to_config(&self) -> anyhow::Result<BatchingConfig> {
        let columns: BTreeSet<String> = self.columns.iter().cloned().collect();
        let column_matching = match self.matching {
            MatchingStrategy::Custom => ColumnMatching::Custom(columns),
            _ if !columns.is_empty() => bail!("--columns requires --matching custom"),
            MatchingStrategy::Union => ColumnMatching::Union,
            MatchingStrategy::Intersection => ColumnMatching::Intersection,
            MatchingStrategy::PrefixHashUnion => ColumnMatching::PrefixHashUnion,
            MatchingStrategy::PrefixHashIntersection => ColumnMatching::PrefixHashIntersection,
            MatchingStrategy::None => ColumnMatching::None,
            MatchingStrategy::SplitAll => ColumnMatching::SplitAll,
        };

        BatchingConfig::builder()
            .mode(self.mode)
            .column_matching(column_matching)
            .ignored_columns(self.ignore.iter().cloned().collect::<BTreeSet<_>>())
            .merge_mode(self.merge)
            .missing_data(self.missing)
            .limit(self.limit.clone())
            .build()
            .context("invalid batching configuration")
    }
}
