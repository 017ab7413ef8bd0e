pub mod holdings;

pub use holdings::{BrokerApi, KiteBrokerApi};
