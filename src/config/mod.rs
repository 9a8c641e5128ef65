mod file_config;

pub use file_config::FileConfig;

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that participate in config resolution. TOML values
/// override CLI values where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

fn parse_logging_level(raw: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(raw, true).ok()
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML config.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in the config file")
            })?;

        if db_dir.exists() && !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let logging_level = file
            .logging_level
            .and_then(|raw| parse_logging_level(&raw))
            .unwrap_or_else(|| cli.logging_level.clone());

        Ok(AppConfig {
            db_dir,
            port: file.port.unwrap_or(cli.port),
            metrics_port: file.metrics_port.unwrap_or(cli.metrics_port),
            logging_level,
            frontend_dir_path: file.frontend_dir_path.or_else(|| cli.frontend_dir_path.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliConfig {
        CliConfig {
            db_dir: Some(PathBuf::from("/tmp/data")),
            port: 3000,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            frontend_dir_path: None,
        }
    }

    #[test]
    fn cli_values_used_without_file() {
        let config = AppConfig::resolve(&cli(), None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_dir, PathBuf::from("/tmp/data"));
    }

    #[test]
    fn file_overrides_cli() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080
            logging_level = "none"
            "#,
        )
        .unwrap();
        let config = AppConfig::resolve(&cli(), Some(file)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.logging_level, RequestsLoggingLevel::None);
        // Untouched fields keep CLI values
        assert_eq!(config.metrics_port, 9091);
    }

    #[test]
    fn missing_db_dir_is_an_error() {
        let mut cli = cli();
        cli.db_dir = None;
        assert!(AppConfig::resolve(&cli, None).is_err());
    }
}
