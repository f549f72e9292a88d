//! ### Config
//! TOML configuration naming the data source, its column mapping and the
//! cache lifetime.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::load::{LoadError, SchemaMapping, WideCsvSource};
use crate::record::Field;

const CONFIG_ENV: &str = "CONGESTION_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "congestion.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SourceConfig {
    /// Long-form CSV, one observation per row.
    Csv { path: PathBuf },
    /// Daily extract with one column per hour.
    WideCsv {
        path: PathBuf,
        #[serde(default = "default_hour_suffix")]
        hour_suffix: String,
    },
    Sqlite { path: PathBuf, table: String },
}

fn default_hour_suffix() -> String {
    WideCsvSource::DEFAULT_HOUR_SUFFIX.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Zero disables the cache.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub source: SourceConfig,
    /// Source column name -> canonical field.
    #[serde(default = "default_schema")]
    pub schema: BTreeMap<String, Field>,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Column names of the published charging-load extract.
fn default_schema() -> BTreeMap<String, Field> {
    BTreeMap::from([
        ("일자".to_string(), Field::Date),
        ("충전방식".to_string(), Field::ChargeType),
        ("hour".to_string(), Field::Hour),
        ("kWh".to_string(), Field::EnergyKwh),
    ])
}

impl AppConfig {
    /// Loads from `path`, else `$CONGESTION_CONFIG`, else `congestion.toml`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{}': {e}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn schema_mapping(&self) -> Result<SchemaMapping, LoadError> {
        SchemaMapping::from_source_columns(
            self.schema
                .iter()
                .map(|(column, field)| (column.as_str(), *field)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wide_csv_with_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [source]
            kind = "wide_csv"
            path = "data/ev_load.csv"
            "#,
        )
        .unwrap();

        match &cfg.source {
            SourceConfig::WideCsv { path, hour_suffix } => {
                assert_eq!(path, Path::new("data/ev_load.csv"));
                assert_eq!(hour_suffix, "시");
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(3600));

        let mapping = cfg.schema_mapping().unwrap();
        assert_eq!(mapping.column(Field::ChargeType), Some("충전방식"));
        assert_eq!(mapping.column(Field::EnergyKwh), Some("kWh"));
    }

    #[test]
    fn parses_sqlite_with_custom_schema() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [source]
            kind = "sqlite"
            path = "ev.db"
            table = "ev_load"

            [schema]
            day = "date"
            method = "charge_type"
            hr = "hour"
            energy = "energy_kwh"

            [cache]
            ttl_secs = 0
            "#,
        )
        .unwrap();

        assert!(matches!(cfg.source, SourceConfig::Sqlite { ref table, .. } if table == "ev_load"));
        assert!(cfg.cache.ttl().is_zero());
        let mapping = cfg.schema_mapping().unwrap();
        assert_eq!(mapping.column(Field::Hour), Some("hr"));
        assert!(mapping.require(&Field::ALL).is_ok());
    }

    #[test]
    fn duplicate_field_mapping_fails() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [source]
            kind = "csv"
            path = "ev.csv"

            [schema]
            a = "hour"
            b = "hour"
            "#,
        )
        .unwrap();
        assert!(cfg.schema_mapping().is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let res = AppConfig::from_toml_str(
            r#"
            [source]
            kind = "csv"
            path = "ev.csv"
            encoding = "cp949"
            "#,
        );
        assert!(res.is_err());

        let res = AppConfig::from_toml_str(
            r#"
            [source]
            kind = "parquet"
            path = "ev.parquet"
            "#,
        );
        assert!(res.is_err());
    }
}
