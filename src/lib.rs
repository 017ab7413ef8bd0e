pub mod types;
pub mod error;
pub mod config;
pub mod time;
pub mod auth;
pub mod broker;
pub mod store;
pub mod collector;
pub mod scheduler;

pub use types::*;
pub use error::{CollectorError, Result};
