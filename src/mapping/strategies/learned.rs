use super::{MatchInput, Strategy};
use crate::mapping::fingerprint::{column_index_to_letter, column_letter_to_index};
use crate::models::{StrategyId, StrategyResult};

/// Replays column choices the user confirmed earlier for the same header set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LearnedMappingStrategy;

impl Strategy for LearnedMappingStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::LearnedMapping
    }

    fn evaluate(&self, input: &MatchInput<'_>) -> Vec<StrategyResult> {
        input
            .learned
            .iter()
            .filter(|(field, _)| input.fields.contains(*field))
            .filter_map(|(&field, learned)| {
                // stale letters (sheet now has fewer columns) are skipped
                let index = column_letter_to_index(&learned.column_letter)
                    .filter(|&i| i < input.headers.len())?;
                Some(StrategyResult {
                    strategy: self.id(),
                    column_index: index,
                    column_letter: column_index_to_letter(index),
                    field,
                    confidence: learned.confidence.clamp(0.0, 1.0),
                    evidence: "learned from user correction".to_string(),
                })
            })
            .collect()
    }
}
