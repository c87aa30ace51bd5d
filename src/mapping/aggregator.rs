//! Fuses strategy votes for the same (field, column) pair into one score.

use crate::config::MappingConfig;
use crate::models::{AggregatedMatch, FieldKey, StrategyId, StrategyResult};
use std::collections::HashMap;

/// Group votes by (field, column letter) and score each group:
///
/// `clamp(weighted_mean + consensus − disagreement + learned_bonus, 0, max)`.
///
/// A learned vote counts twice on purpose: once in the weighted mean (weight
/// 1.0) and once through the flat bonus, which keeps prior user corrections
/// ahead of fresh guesses. Output is sorted by confidence, highest first;
/// equal scores keep first-seen order.
pub fn aggregate(results: &[StrategyResult], config: &MappingConfig) -> Vec<AggregatedMatch> {
    let mut order: Vec<(FieldKey, String)> = Vec::new();
    let mut groups: HashMap<(FieldKey, String), Vec<&StrategyResult>> = HashMap::new();
    for r in results {
        let key = (r.field, r.column_letter.clone());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(r);
    }

    let mut out: Vec<AggregatedMatch> = order
        .into_iter()
        .filter_map(|key| {
            let group = groups.remove(&key)?;
            Some(score_group(key.0, key.1, &group, config))
        })
        .collect();
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}

fn score_group(
    field: FieldKey,
    column_letter: String,
    group: &[&StrategyResult],
    config: &MappingConfig,
) -> AggregatedMatch {
    let base = match group {
        [only] => only.confidence,
        _ => weighted_mean(group, config),
    };

    let consensus = match group.len() {
        0 | 1 => 0.0,
        2 => config.consensus_bonus_two,
        3 => config.consensus_bonus_three,
        _ => config.consensus_bonus_four_plus,
    };

    let std_dev = std_dev(group.iter().map(|r| r.confidence));
    let disagreement = if std_dev > config.disagreement_high_threshold {
        config.disagreement_high_penalty
    } else if std_dev > config.disagreement_low_threshold {
        config.disagreement_low_penalty
    } else {
        0.0
    };

    let learned = if group.iter().any(|r| r.strategy == StrategyId::LearnedMapping) {
        config.learned_bonus
    } else {
        0.0
    };

    let confidence = (base + consensus - disagreement + learned).clamp(0.0, config.max_confidence);

    AggregatedMatch {
        field,
        column_index: group.first().map(|r| r.column_index).unwrap_or_default(),
        column_letter,
        confidence,
        evidence: group.iter().map(|r| r.evidence.clone()).collect(),
        strategy_count: group.len(),
    }
}

fn weighted_mean(group: &[&StrategyResult], config: &MappingConfig) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for r in group {
        let w = config.weights.weight_of(&r.strategy);
        weighted_sum += r.confidence * w;
        weight_total += w;
    }
    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

/// Population standard deviation; 0 for fewer than two values.
fn std_dev(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
