use super::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which evidence producer voted for a (field, column) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    LearnedMapping,
    KeywordMatching,
    PatternMatching,
    /// Extension slot for strategies registered by callers.
    Custom(String),
}

impl StrategyId {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyId::LearnedMapping => "learned_mapping",
            StrategyId::KeywordMatching => "keyword_matching",
            StrategyId::PatternMatching => "pattern_matching",
            StrategyId::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's vote that `column_letter` holds `field`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub strategy: StrategyId,
    pub column_index: usize,
    pub column_letter: String,
    pub field: FieldKey,
    pub confidence: f64,
    pub evidence: String,
}

/// All votes for one (field, column) pair fused into a single score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMatch {
    pub field: FieldKey,
    pub column_index: usize,
    pub column_letter: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub strategy_count: usize,
}

/// Final column → field assignment.
///
/// Partial injection: every column letter maps to at most one field and no
/// field appears under two columns. The confidence and evidence maps are
/// keyed by the same column letters as `mapping`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub mapping: BTreeMap<String, FieldKey>,
    pub confidence: BTreeMap<String, f64>,
    pub evidence: BTreeMap<String, Vec<String>>,
}

impl MappingResult {
    pub fn insert(&mut self, column_letter: &str, field: FieldKey, confidence: f64, evidence: Vec<String>) {
        self.mapping.insert(column_letter.to_string(), field);
        self.confidence.insert(column_letter.to_string(), confidence);
        self.evidence.insert(column_letter.to_string(), evidence);
    }

    pub fn field_for(&self, column_letter: &str) -> Option<FieldKey> {
        self.mapping.get(column_letter).copied()
    }

    pub fn column_for(&self, field: FieldKey) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(_, f)| **f == field)
            .map(|(col, _)| col.as_str())
    }

    pub fn confidence_of(&self, column_letter: &str) -> Option<f64> {
        self.confidence.get(column_letter).copied()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Stored column for a field under one schema fingerprint, after decay/boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedMapping {
    pub column_letter: String,
    pub confidence: f64,
}

/// Learned mappings fetched for the current fingerprint, one per field at most.
pub type LearnedMappings = BTreeMap<FieldKey, LearnedMapping>;

/// User decision recorded against a mapping after a row is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingAction {
    Accept,
    Reject,
    Edit,
    ManualSelect,
}

impl MappingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingAction::Accept => "ACCEPT",
            MappingAction::Reject => "REJECT",
            MappingAction::Edit => "EDIT",
            MappingAction::ManualSelect => "MANUAL_SELECT",
        }
    }
}

impl FromStr for MappingAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(MappingAction::Accept),
            "REJECT" => Ok(MappingAction::Reject),
            "EDIT" => Ok(MappingAction::Edit),
            "MANUAL_SELECT" => Ok(MappingAction::ManualSelect),
            other => Err(format!("Unknown mapping action '{}'", other)),
        }
    }
}
