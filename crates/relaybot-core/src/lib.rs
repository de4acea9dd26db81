pub mod config;
pub mod error;
pub mod types;

pub use config::RelayConfig;
pub use error::{ConfigError, Result};
pub use types::{Tone, TurnResult};
