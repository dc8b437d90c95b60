pub mod config;
pub mod error;
pub mod indexer;
pub mod metadata;
pub mod paths;

pub use config::{Config, SessionConfigEntry};
pub use error::{ConfigError, DiscoveryError, IndexError};
pub use indexer::{Indexer, IndexerConfig};
