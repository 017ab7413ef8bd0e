/// Gated periodic holdings collection
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::broker::holdings::BrokerApi;
use crate::error::Result;
use crate::store::holdings::TimeSeriesStore;
use crate::time::session::SessionWindow;
use crate::types::{SnapshotRow, TickOutcome};

/// One poll of the brokerage portfolio into the time series.
///
/// Delivery is at-most-once per tick: a failed insert discards the whole
/// batch and the next tick recollects. Authentication problems surface as
/// errors here; re-auth belongs to the lifecycle manager alone.
pub struct CollectorLoop {
    window: SessionWindow,
    api: Arc<dyn BrokerApi>,
    store: Arc<dyn TimeSeriesStore>,
}

impl CollectorLoop {
    pub fn new(
        window: SessionWindow,
        api: Arc<dyn BrokerApi>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Self {
        CollectorLoop { window, api, store }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        if !self.window.is_admitted(now) {
            debug!(
                "Outside market hours, skipping data collection (next session open {})",
                self.window.next_open(now)
            );
            return Ok(TickOutcome::SkippedOutsideSession);
        }

        let holdings = self.api.fetch_holdings().await?;
        if holdings.is_empty() {
            info!("No holdings data available");
            return Ok(TickOutcome::NoHoldings);
        }

        // One timestamp for the whole batch: a consistent point-in-time view
        let collected_at = now;
        let rows: Vec<SnapshotRow> = holdings
            .iter()
            .map(|holding| SnapshotRow::from_holding(holding, collected_at))
            .collect();

        self.store.insert_batch(&rows).await?;
        info!("Inserted {} holdings records", rows.len());
        Ok(TickOutcome::Collected(rows.len()))
    }
}
