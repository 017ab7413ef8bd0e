/// Scheduled retention maintenance
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::store::holdings::TimeSeriesStore;

/// Daily compaction trigger.
///
/// The table TTL already governs row visibility; this only bounds how stale
/// space reclamation can get. Idempotent, and safe to run while a batch
/// insert is in flight - MergeTree merges never block or corrupt concurrent
/// inserts.
pub struct RetentionJob {
    store: Arc<dyn TimeSeriesStore>,
}

impl RetentionJob {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        RetentionJob { store }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        info!("Running retention compaction at {}", now);
        self.store.compact().await?;
        info!("Retention compaction completed");
        Ok(())
    }
}
