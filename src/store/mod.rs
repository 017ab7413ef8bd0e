pub mod holdings;
pub mod retention;

pub use holdings::{ClickHouseStore, TimeSeriesStore};
pub use retention::RetentionJob;
