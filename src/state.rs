use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub recon_locks: ReconLocks,
}

impl AppState {
    pub fn build(config: AppConfig) -> Self {
        let db_pool = db::build_pool(&config);
        if db_pool.is_none() {
            tracing::warn!("DATABASE_URL is not set — running without a database pool");
        }
        Self {
            config: Arc::new(config),
            db_pool,
            recon_locks: ReconLocks::default(),
        }
    }
}

/// Per-`(project, period)` async locks serializing payroll reconciliation.
///
/// A manual recompute racing the daily batch (or two ledger hooks firing
/// back to back) must not interleave reads and writes against the same
/// payroll record set; callers hold the guard for the whole pipeline run.
#[derive(Clone, Default)]
pub struct ReconLocks {
    inner: Arc<Mutex<HashMap<(Uuid, String), Arc<Mutex<()>>>>>,
}

impl ReconLocks {
    pub async fn acquire(&self, project_id: Uuid, period: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            // Entries nobody holds or is waiting on (the map owns the only
            // Arc) are stale; drop them so the map does not grow with every
            // project/period ever reconciled.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry((project_id, period.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ReconLocks;
    use uuid::Uuid;

    #[tokio::test]
    async fn serializes_same_key_and_not_distinct_keys() {
        let locks = ReconLocks::default();
        let project = Uuid::new_v4();

        let guard = locks.acquire(project, "2026-08").await;

        // A different period for the same project must not block.
        let other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(project, "2026-09"),
        )
        .await;
        assert!(other.is_ok());

        // The same key blocks until the guard is dropped.
        let same = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(project, "2026-08"),
        )
        .await;
        assert!(same.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(project, "2026-08"),
        )
        .await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = ReconLocks::default();

        for month in 1..=6 {
            let guard = locks.acquire(Uuid::new_v4(), &format!("2026-{month:02}")).await;
            drop(guard);
        }

        // Every earlier guard has been dropped, so acquiring one more key
        // sweeps the stale entries and leaves only the live one.
        let guard = locks.acquire(Uuid::new_v4(), "2026-07").await;
        assert_eq!(locks.entry_count().await, 1);
        drop(guard);
    }
}
