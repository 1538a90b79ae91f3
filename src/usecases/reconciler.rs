//! Reconciler - Insert-or-Update Merge of a Platform Batch
//!
//! Stamps the platform key on every draft, collapses duplicate source
//! identifiers inside the batch (last sighting wins) and hands the
//! batch to the store as one all-or-nothing transaction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::platform::normalize_key;
use crate::domain::{ContestDraft, PersistenceError, ReconcileCounts};
use crate::ports::ContestStore;

pub struct Reconciler {
    store: Arc<dyn ContestStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ContestStore>) -> Self {
        Self { store }
    }

    /// Merge `batch` into the canonical store for `platform`.
    #[instrument(skip(self, batch), fields(rows = batch.len()))]
    pub async fn reconcile(
        &self,
        platform: &str,
        batch: Vec<ContestDraft>,
    ) -> Result<ReconcileCounts, PersistenceError> {
        let platform = normalize_key(platform);
        let batch = dedup_batch(&platform, batch);

        let counts = self.store.upsert_batch(&platform, &batch).await?;
        info!(
            platform = %platform,
            new = counts.new_count,
            updated = counts.updated_count,
            "Batch reconciled"
        );
        Ok(counts)
    }
}

/// Force the platform key and keep one draft per source id.
///
/// Order of first appearance is preserved; the latest draft's content wins.
pub fn dedup_batch(platform: &str, batch: Vec<ContestDraft>) -> Vec<ContestDraft> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut out: Vec<ContestDraft> = Vec::with_capacity(batch.len());

    for mut draft in batch {
        draft.platform = platform.to_string();
        match position.get(&draft.source_id) {
            Some(&i) => {
                debug!(
                    source_id = %draft.source_id,
                    "Duplicate source id in batch, keeping latest"
                );
                out[i] = draft;
            }
            None => {
                position.insert(draft.source_id.clone(), out.len());
                out.push(draft);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryContestStore;
    use crate::ports::ContestQuery;
    use chrono::{Duration, Utc};

    fn draft(source_id: &str, name: &str) -> ContestDraft {
        let now = Utc::now();
        ContestDraft::from_range(
            "AtCoder",
            source_id.to_string(),
            name.to_string(),
            format!("https://atcoder.jp/contests/{source_id}"),
            now + Duration::days(1),
            now + Duration::days(1) + Duration::hours(2),
            now,
        )
    }

    #[test]
    fn duplicates_collapse_to_latest() {
        let out = dedup_batch(
            "atcoder",
            vec![draft("a", "first"), draft("b", "b"), draft("a", "second")],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "second");
        assert!(out.iter().all(|d| d.platform == "atcoder"));
    }

    #[tokio::test]
    async fn reconciling_twice_is_idempotent() {
        let store = Arc::new(MemoryContestStore::new());
        let reconciler = Reconciler::new(store.clone());
        let batch = vec![draft("abc1", "ABC 1"), draft("abc2", "ABC 2")];

        let first = reconciler.reconcile("AtCoder", batch.clone()).await.unwrap();
        assert_eq!(first, ReconcileCounts { new_count: 2, updated_count: 0 });
        let before = store.list(&ContestQuery::default()).await.unwrap();

        let second = reconciler.reconcile("atcoder", batch).await.unwrap();
        assert_eq!(second, ReconcileCounts { new_count: 0, updated_count: 2 });
        assert_eq!(store.list(&ContestQuery::default()).await.unwrap(), before);
    }
}
