use super::{MatchInput, Strategy};
use crate::config::MappingConfig;
use crate::mapping::fingerprint::column_index_to_letter;
use crate::mapping::keywords::KeywordTable;
use crate::mapping::normalizer::normalize;
use crate::models::{FieldKey, StrategyId, StrategyResult};
use std::collections::BTreeMap;
use strsim::normalized_levenshtein;

/// Fuzzy header-text matching against per-field keyword lists, labels and
/// label aliases.
#[derive(Debug, Clone)]
pub struct KeywordStrategy {
    // keywords, then label followed by aliases; all normalized
    targets: BTreeMap<FieldKey, (Vec<String>, Vec<String>)>,
    threshold: f64,
    max_confidence: f64,
    label_fuzzy_score: f64,
}

impl KeywordStrategy {
    pub fn new(table: &KeywordTable, config: &MappingConfig) -> Self {
        let targets = FieldKey::ALL
            .iter()
            .map(|&field| {
                let keywords = table
                    .keywords(field)
                    .iter()
                    .map(|k| normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                let labels = table
                    .label(field)
                    .into_iter()
                    .chain(table.aliases(field).iter().map(String::as_str))
                    .map(normalize)
                    .filter(|l| !l.is_empty())
                    .collect();
                (field, (keywords, labels))
            })
            .collect();
        Self {
            targets,
            threshold: config.fuzzy_threshold,
            max_confidence: config.keyword_max_confidence,
            label_fuzzy_score: config.label_fuzzy_score,
        }
    }

    /// Best score of a normalized header against one field's keywords, label
    /// and aliases.
    pub fn score(&self, normalized: &str, field: FieldKey) -> f64 {
        if normalized.is_empty() {
            return 0.0;
        }
        let Some((keywords, labels)) = self.targets.get(&field) else {
            return 0.0;
        };
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        let mut best = 0.0_f64;
        for kw in keywords {
            let score = if is_exact_hit(normalized, kw) {
                1.0
            } else {
                best_token_ratio(&tokens, kw)
            };
            best = best.max(score);
        }
        for label in labels {
            let score = if normalized == label {
                1.0
            } else if is_exact_hit(normalized, label)
                || best_token_ratio(&tokens, label) >= self.threshold
            {
                self.label_fuzzy_score
            } else {
                0.0
            };
            best = best.max(score);
        }
        best
    }
}

fn is_exact_hit(normalized: &str, target: &str) -> bool {
    normalized == target || normalized.contains(target) || target.contains(normalized)
}

fn best_token_ratio(tokens: &[&str], target: &str) -> f64 {
    tokens
        .iter()
        .map(|t| normalized_levenshtein(t, target))
        .fold(0.0, f64::max)
}

impl Strategy for KeywordStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::KeywordMatching
    }

    fn evaluate(&self, input: &MatchInput<'_>) -> Vec<StrategyResult> {
        let mut out = Vec::new();
        for (index, header) in input.headers.iter().enumerate() {
            let normalized = normalize(header);
            if normalized.is_empty() {
                continue;
            }
            for &field in input.fields {
                let score = self.score(&normalized, field);
                if score >= self.threshold {
                    out.push(StrategyResult {
                        strategy: self.id(),
                        column_index: index,
                        column_letter: column_index_to_letter(index),
                        field,
                        confidence: score.min(self.max_confidence),
                        evidence: format!("Header \"{}\" matches {} keywords (score {:.2})", header.trim(), field, score),
                    });
                }
            }
        }
        out
    }
}
