pub mod store;
pub mod broker;
pub mod lifecycle;

pub use store::{CredentialStore, FileTokenStore};
pub use broker::{AuthBroker, FyersAuthBroker};
pub use lifecycle::TokenLifecycleManager;
