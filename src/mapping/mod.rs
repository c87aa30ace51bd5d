//! Header-to-field mapping engine.
//!
//! Strategies vote on (field, column) pairs, the aggregator fuses the votes
//! and the optimizer picks a one-to-one assignment. Everything here is pure
//! apart from the learned-mapping fetch in [`MappingEngine::suggest`].

pub mod aggregator;
pub mod fingerprint;
pub mod keywords;
pub mod normalizer;
pub mod optimizer;
pub mod patterns;
pub mod strategies;

use crate::config::MappingConfig;
use crate::learning::{fetch_learned_mappings, LearningStore};
use crate::models::{FieldKey, LearnedMappings, MappingAction, MappingResult};
use fingerprint::{column_letter_to_index, fingerprint};
use keywords::KeywordTable;
use patterns::PatternLibrary;
use serde::Serialize;
use std::sync::Arc;
use strategies::{KeywordStrategy, LearnedMappingStrategy, MatchInput, PatternStrategy, Strategy};

/// Suggested mapping for one sheet, with the fingerprint it was learned under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMapping {
    pub schema_hash: String,
    #[serde(flatten)]
    pub result: MappingResult,
}

pub struct MappingEngine {
    config: MappingConfig,
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new(MappingConfig::default(), KeywordTable::default(), PatternLibrary::default())
    }
}

impl MappingEngine {
    pub fn new(config: MappingConfig, keywords: KeywordTable, patterns: PatternLibrary) -> Self {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(LearnedMappingStrategy),
            Box::new(KeywordStrategy::new(&keywords, &config)),
            Box::new(PatternStrategy::new(patterns, &config)),
        ];
        Self { config, strategies }
    }

    /// Register an extra evidence producer; its votes are weighted by
    /// `StrategyWeights::weight_of`.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Map columns to `fields` from headers, samples and already-fetched
    /// learned mappings. Never fails; sparse input gives a sparse result.
    pub fn map_columns(
        &self,
        headers: &[String],
        samples: &[Vec<String>],
        learned: &LearnedMappings,
        fields: &[FieldKey],
    ) -> MappingResult {
        if headers.is_empty() || fields.is_empty() {
            return MappingResult::default();
        }
        let input = MatchInput {
            headers,
            samples,
            learned,
            fields,
        };
        let votes: Vec<_> = self
            .strategies
            .iter()
            .flat_map(|s| s.evaluate(&input))
            .collect();
        let aggregated = aggregator::aggregate(&votes, &self.config);
        let result = optimizer::optimize(&aggregated, fields, &self.config);
        tracing::debug!(
            columns = headers.len(),
            votes = votes.len(),
            candidates = aggregated.len(),
            mapped = result.len(),
            "mapped columns"
        );
        result
    }

    /// Fingerprint the headers, fetch learned mappings for every field
    /// concurrently, then run [`map_columns`](Self::map_columns).
    pub async fn suggest(
        &self,
        store: Arc<dyn LearningStore>,
        headers: &[String],
        samples: &[Vec<String>],
    ) -> SheetMapping {
        let schema_hash = fingerprint(headers);
        if headers.is_empty() {
            return SheetMapping {
                schema_hash,
                result: MappingResult::default(),
            };
        }
        let learned = fetch_learned_mappings(store, &schema_hash, &FieldKey::ALL).await;
        let result = self.map_columns(headers, samples, &learned, &FieldKey::ALL);
        SheetMapping { schema_hash, result }
    }
}

/// Report `action` for every mapped column to the learning store.
///
/// Returns how many upserts succeeded; failures are logged and skipped.
pub fn record_outcome(
    store: &dyn LearningStore,
    schema_hash: &str,
    result: &MappingResult,
    action: MappingAction,
) -> usize {
    let mut recorded = 0;
    for (letter, &field) in &result.mapping {
        let Some(index) = column_letter_to_index(letter) else {
            tracing::warn!(column = %letter, "skipping learning for invalid column letter");
            continue;
        };
        match store.upsert_learned_mapping(schema_hash, field, index, letter, action) {
            Ok(()) => recorded += 1,
            Err(e) => tracing::warn!(field = %field, column = %letter, error = %e, "learning upsert failed"),
        }
    }
    tracing::debug!(schema_hash, recorded, action = action.as_str(), "recorded mapping outcome");
    recorded
}
