pub mod session;

pub use session::SessionWindow;
