use super::{MatchInput, Strategy};
use crate::config::MappingConfig;
use crate::mapping::fingerprint::column_index_to_letter;
use crate::mapping::normalizer::normalize_sample;
use crate::mapping::patterns::PatternLibrary;
use crate::models::{FieldKey, StrategyId, StrategyResult};
use std::collections::BTreeSet;

/// Votes from sample cell values that fit a field's regex signatures.
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    library: PatternLibrary,
    min_match_ratio: f64,
    min_confidence: f64,
    max_confidence: f64,
    full_sample_count: usize,
    default_weight: f64,
}

impl PatternStrategy {
    pub fn new(library: PatternLibrary, config: &MappingConfig) -> Self {
        Self {
            library,
            min_match_ratio: config.pattern_min_match_ratio,
            min_confidence: config.pattern_min_confidence,
            max_confidence: config.pattern_max_confidence,
            full_sample_count: config.pattern_full_sample_count.max(1),
            default_weight: config.pattern_default_weight,
        }
    }

    /// Confidence that `samples` (already non-blank) belong to `field`, with
    /// the match ratio; `None` when the pair should be skipped.
    fn score(&self, field: FieldKey, samples: &[String]) -> Option<(f64, f64)> {
        let patterns = self.library.patterns(field);
        if patterns.is_empty() || samples.is_empty() {
            return None;
        }
        let mut matched = 0usize;
        let mut hit_patterns = BTreeSet::new();
        for sample in samples {
            if let Some(idx) = self.library.first_match(field, sample) {
                matched += 1;
                hit_patterns.insert(idx);
            }
        }
        let match_ratio = matched as f64 / samples.len() as f64;
        if match_ratio < self.min_match_ratio {
            return None;
        }
        let best_weight = hit_patterns
            .iter()
            .map(|&i| patterns[i].weight)
            .reduce(f64::max)
            .unwrap_or(self.default_weight);
        let mut confidence = match_ratio * best_weight;
        if samples.len() < self.full_sample_count {
            confidence *= samples.len() as f64 / self.full_sample_count as f64;
        }
        Some((confidence, match_ratio))
    }
}

impl Strategy for PatternStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::PatternMatching
    }

    fn evaluate(&self, input: &MatchInput<'_>) -> Vec<StrategyResult> {
        let mut out = Vec::new();
        for (index, column) in input.samples.iter().enumerate().take(input.headers.len()) {
            let samples: Vec<String> = column
                .iter()
                .map(|v| normalize_sample(v))
                .filter(|v| !v.is_empty())
                .collect();
            if samples.is_empty() {
                continue;
            }
            for &field in input.fields {
                let Some((confidence, match_ratio)) = self.score(field, &samples) else {
                    continue;
                };
                if confidence < self.min_confidence {
                    continue;
                }
                out.push(StrategyResult {
                    strategy: self.id(),
                    column_index: index,
                    column_letter: column_index_to_letter(index),
                    field,
                    confidence: confidence.min(self.max_confidence),
                    evidence: format!(
                        "{:.0}% of {} sample value(s) look like {}",
                        match_ratio * 100.0,
                        samples.len(),
                        field
                    ),
                });
            }
        }
        out
    }
}
