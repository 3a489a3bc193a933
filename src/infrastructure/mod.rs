//! Infrastructure layer for configuration, logging, and outbound HTTP
//!
//! Concrete implementations of the engine's operational concerns and of
//! the `Fetcher` gateway. The sheet store, AI text service, and email
//! service remain external: callers inject their own implementations of
//! those gateway traits.

pub mod config;
pub mod http_fetcher;
pub mod logging;

// Re-export commonly used items
pub use config::{ConfigManager, EngineConfig};
pub use http_fetcher::HttpFetcher;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
