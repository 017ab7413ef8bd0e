/// Core type definitions for the collector daemon
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// Kind of persisted secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Refresh,
    Access,
}

impl TokenKind {
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Refresh => "refresh",
            TokenKind::Access => "access",
        }
    }
}

/// A persisted secret with its last-write timestamp.
///
/// At most one live value per kind; a write replaces value and timestamp
/// together.
#[derive(Debug, Clone)]
pub struct Credential {
    pub kind: TokenKind,
    pub value: String,
    pub saved_at: DateTime<Utc>,
}

/// Derived refresh-token state, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoRefreshToken,
    RefreshTokenStale,
    RefreshTokenValid,
}

/// One holding as reported by the broker API
#[derive(Debug, Clone, Deserialize)]
pub struct Holding {
    #[serde(rename = "tradingsymbol")]
    pub trading_symbol: String,
    pub exchange: String,
    pub instrument_token: u64,
    pub isin: String,
    pub product: String,
    pub quantity: i32,
    pub average_price: f64,
    pub last_price: f64,
    pub close_price: f64,
    pub pnl: f64,
    pub day_change: f64,
    pub day_change_percentage: f64,
}

/// One row of the holdings time series.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS holdings (
///     timestamp DateTime64(3),
///     trading_symbol String,
///     exchange LowCardinality(String),
///     instrument_token UInt64,
///     isin String,
///     product LowCardinality(String),
///     quantity Int32,
///     average_price Float64,
///     last_price Float64,
///     close_price Float64,
///     pnl Float64,
///     day_change Float64,
///     day_change_percentage Float64
/// ) ENGINE = MergeTree()
/// PARTITION BY toYYYYMMDD(timestamp)
/// ORDER BY (timestamp, trading_symbol)
/// TTL toDateTime(timestamp) + INTERVAL 2 DAY DELETE
/// ```
#[derive(Debug, Clone, Row, Serialize)]
pub struct SnapshotRow {
    /// Collection timestamp in milliseconds, shared by the whole batch
    pub timestamp: i64,
    pub trading_symbol: String,
    pub exchange: String,
    pub instrument_token: u64,
    pub isin: String,
    pub product: String,
    pub quantity: i32,
    pub average_price: f64,
    pub last_price: f64,
    pub close_price: f64,
    pub pnl: f64,
    pub day_change: f64,
    pub day_change_percentage: f64,
}

impl SnapshotRow {
    pub fn from_holding(holding: &Holding, collected_at: DateTime<Utc>) -> Self {
        SnapshotRow {
            timestamp: collected_at.timestamp_millis(),
            trading_symbol: holding.trading_symbol.clone(),
            exchange: holding.exchange.clone(),
            instrument_token: holding.instrument_token,
            isin: holding.isin.clone(),
            product: holding.product.clone(),
            quantity: holding.quantity,
            average_price: holding.average_price,
            last_price: holding.last_price,
            close_price: holding.close_price,
            pnl: holding.pnl,
            day_change: holding.day_change,
            day_change_percentage: holding.day_change_percentage,
        }
    }
}

/// Outcome of one collector tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Outside the session window, nothing attempted
    SkippedOutsideSession,
    /// Broker returned an empty portfolio, nothing to write
    NoHoldings,
    /// Batch of N rows written
    Collected(usize),
}

/// Application configuration (loaded from TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Logging
    pub log_level: String,

    // Exchange Session
    pub exchange_timezone: String,
    pub session_open: String,
    pub session_close: String,

    // Scheduling
    pub collect_interval_sec: u64,
    pub refresh_check_time: String,
    pub access_renewal_time: String,
    pub retention_time: String,

    // Token Lifecycle
    pub token_dir: String,
    pub refresh_renew_after_days: i64,
    pub refresh_hard_expiry_days: i64,

    // Auth Broker
    pub auth_exchange_url: String,
    pub app_id_hash: String,
    pub pin: String,
    pub login_command: Vec<String>,

    // Broker API
    pub broker_api_base: String,
    pub broker_api_key: String,

    // HTTP
    pub http_timeout_sec: u64,

    // Time-Series Store
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,
    pub holdings_table: String,
    pub retention_days: u32,
}
