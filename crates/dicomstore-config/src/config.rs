use std::collections::HashSet;
use std::sync::Arc;

use dicomstore_core::{
    CoreError, DictionaryTag, Level, ValueMultiplicity, ValueRepresentation, parse_tag_number,
};
use dicomstore_search::{
    ColumnNaming, Dialect, QueryableTagRegistry, SelectRequest, StatementAssembler, TagCodec,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(String),

    #[error("config deserialize error: {0}")]
    Deserialize(String),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("queryable entry {index}: {source}")]
    InvalidTag {
        index: usize,
        #[source]
        source: CoreError,
    },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Tags that may be filtered and sorted on, per level.
    #[serde(default)]
    pub queryable: Vec<QueryableTagEntry>,
}

impl StoreConfig {
    /// Parse a TOML document without consulting files or the environment.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: StoreConfig =
            toml::from_str(s).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Query limits
        if self.query.max_records == 0 {
            return Err(ConfigError::validation("query.max_records must be > 0"));
        }
        if self.query.default_max_records > self.query.max_records {
            return Err(ConfigError::validation(
                "query.default_max_records must be <= query.max_records",
            ));
        }
        // Logging
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        // Queryable tags
        let mut seen = HashSet::with_capacity(self.queryable.len());
        for (index, entry) in self.queryable.iter().enumerate() {
            let (level, tag) = entry
                .to_dictionary_tag()
                .map_err(|source| ConfigError::InvalidTag { index, source })?;
            if !seen.insert((level, tag.tag, tag.implementer_id.clone())) {
                return Err(ConfigError::validation(format!(
                    "duplicate queryable tag {tag} at level {level}"
                )));
            }
        }
        Ok(())
    }

    pub fn codec(&self) -> TagCodec {
        TagCodec::new(self.storage.column_naming)
    }

    /// Registry holding every configured tag as queryable, and as storable
    /// where flagged.
    pub fn build_registry(&self) -> Result<QueryableTagRegistry, ConfigError> {
        let registry = QueryableTagRegistry::new();
        for (index, entry) in self.queryable.iter().enumerate() {
            let (level, tag) = entry
                .to_dictionary_tag()
                .map_err(|source| ConfigError::InvalidTag { index, source })?;
            if entry.storable {
                registry.register_storable(level, tag.clone());
            }
            registry.register_queryable(level, tag);
        }
        tracing::debug!(tags = registry.len(), "queryable tag registry built");
        Ok(registry)
    }

    /// Statement assembler for the configured dialect, naming and tags.
    pub fn assembler(&self) -> Result<StatementAssembler, ConfigError> {
        let registry = Arc::new(self.build_registry()?);
        Ok(StatementAssembler::new(self.storage.dialect, registry).with_codec(self.codec()))
    }

    /// Record cap for a request: the configured default when none is
    /// given, never above `query.max_records`.
    pub fn effective_max_records(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.query.default_max_records)
            .min(self.query.max_records)
    }

    /// Request for `level` scoped to the configured device.
    pub fn select_request(&self, level: Level, max_records: Option<usize>) -> SelectRequest {
        SelectRequest::new(level, self.storage.device_id)
            .max_records(self.effective_max_records(max_records))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub column_naming: ColumnNaming,
    #[serde(default = "default_device_id")]
    pub device_id: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            column_naming: ColumnNaming::default(),
            device_id: default_device_id(),
        }
    }
}

fn default_device_id() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_records")]
    pub default_max_records: usize,
    #[serde(default = "max_records_limit")]
    pub max_records: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_records: default_max_records(),
            max_records: max_records_limit(),
        }
    }
}

fn default_max_records() -> usize {
    100
}

fn max_records_limit() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One `[[queryable]]` entry. Fields stay textual until validation so a
/// bad entry is reported with its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryableTagEntry {
    pub level: String,
    /// Eight hex digits, e.g. `00100010`.
    pub tag: String,
    pub vr: String,
    #[serde(default = "default_vm")]
    pub vm: String,
    #[serde(default)]
    pub name: String,
    /// Private creator; empty for standard tags.
    #[serde(default)]
    pub implementer: String,
    #[serde(default)]
    pub storable: bool,
}

fn default_vm() -> String {
    "1".to_string()
}

impl QueryableTagEntry {
    pub fn to_dictionary_tag(&self) -> Result<(Level, DictionaryTag), CoreError> {
        let level: Level = self.level.parse()?;
        let tag = parse_tag_number(&self.tag)?;
        let vr: ValueRepresentation = self.vr.parse()?;
        let vm: ValueMultiplicity = self.vm.parse()?;
        Ok((
            level,
            DictionaryTag::private(tag, vr, vm, self.name.clone(), self.implementer.trim()),
        ))
    }
}

pub mod loader {
    use super::{ConfigError, StoreConfig};
    use ::config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "dicomstore.toml";

    /// Load the file at `path` (or `dicomstore.toml` when `None`) if it
    /// exists, then apply `DICOMSTORE__SECTION__KEY` overrides.
    pub fn load_config(path: Option<&str>) -> Result<StoreConfig, ConfigError> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        // e.g. DICOMSTORE__STORAGE__DIALECT=sqlite
        builder = builder.add_source(
            Environment::with_prefix("DICOMSTORE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Build(e.to_string()))?;
        let merged: StoreConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        merged.validate()?;
        tracing::debug!(
            dialect = %merged.storage.dialect,
            queryable = merged.queryable.len(),
            "configuration loaded"
        );
        Ok(merged)
    }

    pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<StoreConfig, ConfigError> {
        let p = path.as_ref().to_string_lossy().to_string();
        load_config(Some(&p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[storage]
dialect = "sqlite"
column_naming = "explicit"
device_id = 7

[query]
default_max_records = 50
max_records = 200

[[queryable]]
level = "study"
tag = "00080020"
vr = "DA"
name = "StudyDate"
storable = true

[[queryable]]
level = "study"
tag = "00080061"
vr = "CS"
vm = "n"
name = "ModalitiesInStudy"

[[queryable]]
level = "series"
tag = "00091001"
vr = "LO"
name = "VendorFlag"
implementer = "ACME"
"#;

    #[test]
    fn test_defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.storage.dialect, Dialect::SqlServer);
        assert_eq!(cfg.storage.column_naming, ColumnNaming::Legacy);
        assert_eq!(cfg.storage.device_id, 1);
        assert_eq!(cfg.query.default_max_records, 100);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let cfg = StoreConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.storage.dialect, Dialect::Sqlite);
        assert_eq!(cfg.storage.column_naming, ColumnNaming::Explicit);
        assert_eq!(cfg.queryable.len(), 3);

        let (level, tag) = cfg.queryable[1].to_dictionary_tag().unwrap();
        assert_eq!(level, Level::Study);
        assert_eq!(tag.vm, ValueMultiplicity::Many);
    }

    #[test]
    fn test_build_registry() {
        let cfg = StoreConfig::from_toml_str(SAMPLE).unwrap();
        let registry = cfg.build_registry().unwrap();
        assert_eq!(registry.count_for_level(Level::Study), 2);
        assert_eq!(registry.count_for_level(Level::Series), 1);

        use dicomstore_search::TagProvider;
        let storable = registry.storable_tags(Level::Study);
        assert_eq!(storable.len(), 1);
        assert_eq!(storable[0].tag, 0x0008_0020);
        assert!(registry.storable_tags(Level::Series).is_empty());
    }

    #[test]
    fn test_assembler_uses_configured_dialect_and_naming() {
        let cfg = StoreConfig::from_toml_str(SAMPLE).unwrap();
        let assembler = cfg.assembler().unwrap();
        assert_eq!(assembler.dialect(), Dialect::Sqlite);

        let query = assembler
            .build_select(&cfg.select_request(Level::Study, None))
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT [uid], [parUid], [tag2_00080020_] FROM [Study] WHERE [deviceId] = @deviceId_0"
        );
    }

    #[test]
    fn test_effective_max_records() {
        let cfg = StoreConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.effective_max_records(None), 50);
        assert_eq!(cfg.effective_max_records(Some(10)), 10);
        assert_eq!(cfg.effective_max_records(Some(5000)), 200);
    }

    #[test]
    fn test_rejects_default_above_max() {
        let err = StoreConfig::from_toml_str("[query]\ndefault_max_records = 10\nmax_records = 5\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let err = StoreConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_rejects_malformed_tag_entry() {
        let toml = r#"
[[queryable]]
level = "study"
tag = "0008002"
vr = "DA"
"#;
        let err = StoreConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidTag {
                index: 0,
                source: CoreError::InvalidTag(_)
            }
        ));

        let bad_level = toml.replace("\"study\"", "\"visit\"");
        assert!(matches!(
            StoreConfig::from_toml_str(&bad_level),
            Err(ConfigError::InvalidTag {
                source: CoreError::InvalidLevel(_),
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_duplicate_level_tag() {
        let toml = r#"
[[queryable]]
level = "study"
tag = "00080020"
vr = "DA"

[[queryable]]
level = "Study"
tag = "00080020"
vr = "DA"
"#;
        let err = StoreConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        // Same tag on another level is fine.
        let other_level = toml.replacen("\"Study\"", "\"series\"", 1);
        assert!(StoreConfig::from_toml_str(&other_level).is_ok());
    }
}
