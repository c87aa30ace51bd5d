//! One-to-one assignment of fields to columns.

use crate::config::MappingConfig;
use crate::models::{AggregatedMatch, FieldKey, MappingResult};
use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;
use std::collections::{BTreeMap, BTreeSet};

// confidence resolution used for the integer weights
const CONFIDENCE_STEPS: f64 = 10_000.0;

/// Maximum-weight assignment of fields to columns (Kuhn–Munkres).
///
/// Candidates below `assignment_floor` are dropped first. Among the rest, the
/// assignment with the highest total confidence wins, so a field can never
/// take a column at 0.9 when that leaves a field with a 0.95 match on it
/// unmapped. Exact ties go to lower columns and to earlier entries of
/// `fields`. Duplicate candidates for a pair keep the higher confidence.
pub fn optimize(aggregated: &[AggregatedMatch], fields: &[FieldKey], config: &MappingConfig) -> MappingResult {
    let mut best: BTreeMap<(usize, usize), &AggregatedMatch> = BTreeMap::new();
    for m in aggregated {
        if m.confidence < config.assignment_floor {
            continue;
        }
        let Some(row) = fields.iter().position(|f| *f == m.field) else {
            continue;
        };
        let slot = best.entry((row, m.column_index)).or_insert(m);
        if m.confidence > slot.confidence {
            *slot = m;
        }
    }
    if best.is_empty() {
        return MappingResult::default();
    }

    let columns: Vec<usize> = best
        .keys()
        .map(|&(_, column)| column)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let rank = |column: usize| columns.binary_search(&column).unwrap_or_default();

    let n_fields = fields.len();
    let size = n_fields.max(columns.len());
    // Tie-break terms sum to less than one confidence step.
    let scale = (n_fields * n_fields * columns.len() + 1) as i64;
    let mut weights = Matrix::new(size, size, 0_i64);
    for (&(row, column), m) in &best {
        let confidence = (m.confidence * CONFIDENCE_STEPS).round() as i64;
        let tie_break = (rank(column) * (n_fields - row) + row) as i64;
        weights[(row, rank(column))] = confidence * scale - tie_break;
    }

    let (_, assignment) = kuhn_munkres(&weights);
    let mut result = MappingResult::default();
    for (row, &slot) in assignment.iter().enumerate().take(n_fields) {
        let Some(&column) = columns.get(slot) else {
            continue;
        };
        if let Some(m) = best.get(&(row, column)) {
            result.insert(&m.column_letter, m.field, m.confidence, m.evidence.clone());
        }
    }
    result
}
