pub mod config;
pub mod error;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use types::*;
