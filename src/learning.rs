//! Boundary to the learned-mapping store and the concurrent per-field fetch.

use crate::error::StoreError;
use crate::models::{FieldKey, LearnedMapping, LearnedMappings, MappingAction};
use futures::future::join_all;
use std::sync::Arc;

/// Persistence of confirmed column choices, keyed by schema fingerprint + field.
///
/// Implementations apply their own confidence decay/boost; the mapping core
/// only reads the adjusted value and reports outcomes.
pub trait LearningStore: Send + Sync {
    fn get_learned_mapping(&self, fingerprint: &str, field: FieldKey) -> Result<Option<LearnedMapping>, StoreError>;

    fn upsert_learned_mapping(
        &self,
        fingerprint: &str,
        field: FieldKey,
        column_index: usize,
        column_letter: &str,
        action: MappingAction,
    ) -> Result<(), StoreError>;
}

/// Look up every field at once on the blocking pool and join the results.
///
/// A failed lookup (store error or panicked task) only loses that field's
/// learned mapping; it is logged and the rest of the batch is kept.
pub async fn fetch_learned_mappings(
    store: Arc<dyn LearningStore>,
    fingerprint: &str,
    fields: &[FieldKey],
) -> LearnedMappings {
    let handles: Vec<_> = fields
        .iter()
        .map(|&field| {
            let store = Arc::clone(&store);
            let fingerprint = fingerprint.to_string();
            tokio::task::spawn_blocking(move || (field, store.get_learned_mapping(&fingerprint, field)))
        })
        .collect();

    let mut learned = LearnedMappings::new();
    for (field, joined) in fields.iter().zip(join_all(handles).await) {
        match joined {
            Ok((_, Ok(Some(mapping)))) => {
                learned.insert(*field, mapping);
            }
            Ok((_, Ok(None))) => {}
            Ok((_, Err(e))) => {
                tracing::warn!(field = %field, error = %e, "learned mapping lookup failed");
            }
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "learned mapping task failed");
            }
        }
    }
    tracing::debug!(fingerprint, found = learned.len(), "fetched learned mappings");
    learned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyStore {
        calls: Mutex<Vec<FieldKey>>,
    }

    impl LearningStore for FlakyStore {
        fn get_learned_mapping(&self, fingerprint: &str, field: FieldKey) -> Result<Option<LearnedMapping>, StoreError> {
            self.calls.lock().unwrap().push(field);
            assert_eq!(fingerprint, "abc");
            match field {
                FieldKey::InvoiceNumber => Ok(Some(LearnedMapping {
                    column_letter: "A".into(),
                    confidence: 0.9,
                })),
                FieldKey::Date => Err(StoreError::Poisoned),
                FieldKey::TotalAmount => panic!("store crashed"),
                _ => Ok(None),
            }
        }

        fn upsert_learned_mapping(
            &self,
            _fingerprint: &str,
            _field: FieldKey,
            _column_index: usize,
            _column_letter: &str,
            _action: MappingAction,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_lookups_do_not_abort_the_batch() {
        let store = Arc::new(FlakyStore { calls: Mutex::new(Vec::new()) });
        let learned = fetch_learned_mappings(store.clone(), "abc", &FieldKey::ALL).await;
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[&FieldKey::InvoiceNumber].column_letter, "A");
        assert_eq!(store.calls.lock().unwrap().len(), FieldKey::ALL.len());
    }
}
