pub mod config;
pub mod error;
pub mod format;
pub mod types;

pub use config::NetworkConfig;
pub use error::{NetworkError, Result};
pub use format::*;
pub use types::*;
