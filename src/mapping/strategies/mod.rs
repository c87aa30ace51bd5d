//! Independent evidence producers. Each strategy is a pure function of the
//! run's inputs and returns zero or more votes; disagreement between votes is
//! left to the aggregator and optimizer.

mod keyword;
mod learned;
mod pattern;

pub use keyword::KeywordStrategy;
pub use learned::LearnedMappingStrategy;
pub use pattern::PatternStrategy;

use crate::models::{FieldKey, LearnedMappings, StrategyId, StrategyResult};

/// Everything a strategy may look at for one sheet.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    /// Header text per column, 0-indexed; may contain blanks and duplicates.
    pub headers: &'a [String],
    /// Sample values per column, same indexing as `headers`; may be shorter.
    pub samples: &'a [Vec<String>],
    /// Learned mappings fetched for this sheet's fingerprint.
    pub learned: &'a LearnedMappings,
    /// Fields the caller wants mapped.
    pub fields: &'a [FieldKey],
}

pub trait Strategy: Send + Sync {
    fn id(&self) -> StrategyId;

    fn evaluate(&self, input: &MatchInput<'_>) -> Vec<StrategyResult>;
}
