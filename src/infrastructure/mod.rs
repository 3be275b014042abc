pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheSettings, ConfigLoader, ConfigSource, LoggingSettings, ManagerSettings};
pub use error::{CacheError, ErrorCategory, Result};
pub use logging::{setup_logging, LogFormat, LogOutput, LoggingConfig};
