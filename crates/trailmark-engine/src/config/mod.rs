pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
pub use trailmark_common::config::{LoggingConfig, RecorderConfig, SecurityConfig, ServerConfig};
