/// ClickHouse-backed holdings time series
use async_trait::async_trait;
use clickhouse::Client;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{Config, SnapshotRow};

/// Time-series storage capability for holdings snapshots.
///
/// Row expiry is enforced twice: passively by the table TTL and actively by
/// `compact`, which bounds how long reclaimable space lingers.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Create database and table if absent
    async fn ensure_schema(&self) -> Result<()>;

    /// Write one snapshot batch as a single insert
    async fn insert_batch(&self, rows: &[SnapshotRow]) -> Result<()>;

    /// Force merge/purge of expired parts
    async fn compact(&self) -> Result<()>;
}

pub struct ClickHouseStore {
    client: Client,
    database: String,
    table: String,
    retention_days: u32,
}

impl ClickHouseStore {
    pub fn new(config: &Config) -> Self {
        let client = Client::default()
            .with_url(&config.clickhouse_url)
            .with_database(&config.clickhouse_database)
            .with_user(&config.clickhouse_user)
            .with_password(&config.clickhouse_password);

        ClickHouseStore {
            client,
            database: config.clickhouse_database.clone(),
            table: config.holdings_table.clone(),
            retention_days: config.retention_days,
        }
    }
}

/// Holdings table DDL: day partitions ordered by (timestamp, symbol) with
/// store-level TTL expiry
pub fn render_schema_ddl(table: &str, retention_days: u32) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         timestamp DateTime64(3), \
         trading_symbol String, \
         exchange LowCardinality(String), \
         instrument_token UInt64, \
         isin String, \
         product LowCardinality(String), \
         quantity Int32, \
         average_price Float64, \
         last_price Float64, \
         close_price Float64, \
         pnl Float64, \
         day_change Float64, \
         day_change_percentage Float64\
         ) ENGINE = MergeTree() \
         PARTITION BY toYYYYMMDD(timestamp) \
         ORDER BY (timestamp, trading_symbol) \
         TTL toDateTime(timestamp) + INTERVAL {retention_days} DAY DELETE"
    )
}

pub fn render_compact_sql(table: &str) -> String {
    format!("OPTIMIZE TABLE {table} FINAL")
}

#[async_trait]
impl TimeSeriesStore for ClickHouseStore {
    async fn ensure_schema(&self) -> Result<()> {
        info!("Ensuring holdings schema in database {}", self.database);

        self.client
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", self.database))
            .execute()
            .await?;

        self.client
            .query(&render_schema_ddl(&self.table, self.retention_days))
            .execute()
            .await?;

        Ok(())
    }

    async fn insert_batch(&self, rows: &[SnapshotRow]) -> Result<()> {
        let mut insert = self.client.insert(&self.table)?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;

        debug!("Inserted batch of {} rows into {}", rows.len(), self.table);
        Ok(())
    }

    async fn compact(&self) -> Result<()> {
        self.client
            .query(&render_compact_sql(&self.table))
            .execute()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_ddl_shape() {
        let ddl = render_schema_ddl("holdings", 2);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS holdings"));
        assert!(ddl.contains("ENGINE = MergeTree()"));
        assert!(ddl.contains("PARTITION BY toYYYYMMDD(timestamp)"));
        assert!(ddl.contains("ORDER BY (timestamp, trading_symbol)"));
        assert!(ddl.contains("INTERVAL 2 DAY DELETE"));
    }

    #[test]
    fn test_retention_days_configurable() {
        let ddl = render_schema_ddl("holdings", 7);
        assert!(ddl.contains("INTERVAL 7 DAY DELETE"));
    }

    #[test]
    fn test_compact_forces_final_merge() {
        assert_eq!(render_compact_sql("holdings"), "OPTIMIZE TABLE holdings FINAL");
    }
}
