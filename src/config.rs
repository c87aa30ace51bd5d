//! Tunable constants for the mapping engine and connection settings for the OCR service.

use crate::error::OcrError;
use crate::models::StrategyId;
use serde::Deserialize;
use std::time::Duration;

/// Per-strategy weight used by the aggregator's weighted mean.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub learned_mapping: f64,
    pub keyword_matching: f64,
    pub pattern_matching: f64,
    /// Weight for any strategy registered through `StrategyId::Custom`.
    pub extension_default: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            learned_mapping: 1.0,
            keyword_matching: 0.85,
            pattern_matching: 0.75,
            extension_default: 0.5,
        }
    }
}

impl StrategyWeights {
    pub fn weight_of(&self, strategy: &StrategyId) -> f64 {
        match strategy {
            StrategyId::LearnedMapping => self.learned_mapping,
            StrategyId::KeywordMatching => self.keyword_matching,
            StrategyId::PatternMatching => self.pattern_matching,
            StrategyId::Custom(_) => self.extension_default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    // keyword strategy
    pub fuzzy_threshold: f64,
    pub keyword_max_confidence: f64,
    pub label_fuzzy_score: f64,

    // pattern strategy
    pub pattern_min_match_ratio: f64,
    pub pattern_min_confidence: f64,
    pub pattern_full_sample_count: usize,
    pub pattern_default_weight: f64,
    pub pattern_max_confidence: f64,

    // aggregator
    pub weights: StrategyWeights,
    pub consensus_bonus_two: f64,
    pub consensus_bonus_three: f64,
    pub consensus_bonus_four_plus: f64,
    pub disagreement_low_threshold: f64,
    pub disagreement_high_threshold: f64,
    pub disagreement_low_penalty: f64,
    pub disagreement_high_penalty: f64,
    pub learned_bonus: f64,
    pub max_confidence: f64,

    // optimizer
    pub assignment_floor: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            keyword_max_confidence: 0.95,
            label_fuzzy_score: 0.9,
            pattern_min_match_ratio: 0.3,
            pattern_min_confidence: 0.3,
            pattern_full_sample_count: 5,
            pattern_default_weight: 0.75,
            pattern_max_confidence: 0.95,
            weights: StrategyWeights::default(),
            consensus_bonus_two: 0.05,
            consensus_bonus_three: 0.10,
            consensus_bonus_four_plus: 0.15,
            disagreement_low_threshold: 0.1,
            disagreement_high_threshold: 0.2,
            disagreement_low_penalty: 0.05,
            disagreement_high_penalty: 0.10,
            learned_bonus: 0.08,
            max_confidence: 0.98,
            assignment_floor: 0.3,
        }
    }
}

impl MappingConfig {
    /// Parse a (possibly partial) JSON override; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Azure Document Intelligence connection settings.
#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub endpoint: String,
    pub key: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl AzureConfig {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key: key.into(),
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        }
    }

    /// Read `AZURE_OCR_ENDPOINT` and `AZURE_OCR_KEY`, loading `.env` first if present.
    pub fn from_env() -> Result<Self, OcrError> {
        let _ = dotenvy::dotenv();
        let key = std::env::var("AZURE_OCR_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OcrError::Config("AZURE_OCR_KEY not set in .env".to_string()))?;
        let endpoint = std::env::var("AZURE_OCR_ENDPOINT")
            .ok()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| OcrError::Config("AZURE_OCR_ENDPOINT not set in .env".to_string()))?;
        Ok(Self::new(endpoint.trim(), key.trim()))
    }

    pub fn invoice_analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-invoice:analyze?api-version=2024-11-30",
            self.endpoint
        )
    }
}
