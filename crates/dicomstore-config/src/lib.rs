pub mod config;
pub mod observability;

pub use self::config::{
    ConfigError, LoggingConfig, QueryConfig, QueryableTagEntry, StorageConfig, StoreConfig,
};
