use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use depot_utils::{
    path::{resolve_path, xdg_config_home, xdg_data_home},
    time::parse_duration,
};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::info;

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_INDEX_URL: &str = "https://github.com/rust-lang/crates.io-index";
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "crate";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "60s";

/// Registry mirror configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Git URL of the registry index.
    /// Default: https://github.com/rust-lang/crates.io-index
    pub index_url: Option<String>,

    /// Local checkout of the registry index.
    /// Default: $DEPOT_ROOT/index
    pub index_path: Option<String>,

    /// Path to the SQLite catalog.
    /// Default: $DEPOT_ROOT/catalog.db
    pub db_path: Option<String>,

    /// Root directory for downloaded archives.
    /// Default: $DEPOT_ROOT/crates
    pub archive_path: Option<String>,

    /// Refresh the index checkout before reconciling.
    /// Default: true
    pub update_index: Option<bool>,

    /// Number of concurrent workers for reconciliation and downloads.
    /// Default: twice the number of available CPUs
    pub workers: Option<usize>,

    /// Look up the license of every new version through the registry API.
    /// Default: true
    pub fetch_licenses: Option<bool>,

    /// Download archives of yanked versions too.
    /// Default: true
    pub download_yanked: Option<bool>,

    /// File extension for stored archives.
    /// Default: crate
    pub archive_extension: Option<String>,

    /// Base URL of the metadata API, overriding the index config.json.
    pub api_url: Option<String>,

    /// Timeout for a single HTTP request, e.g. 30s or 2m.
    /// Default: 60s
    pub request_timeout: Option<String>,

    /// User agent sent with every HTTP request.
    /// Default: depot/<version>
    pub user_agent: Option<String>,
}

/// Returns the configuration file location: `explicit`, then `$DEPOT_CONFIG`, then
/// `$XDG_CONFIG_HOME/depot/config.toml`.
pub fn config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(resolve_path(path)?);
    }
    match std::env::var("DEPOT_CONFIG") {
        Ok(path) => Ok(resolve_path(&path)?),
        Err(_) => Ok(xdg_config_home().join("depot").join("config.toml")),
    }
}

fn depot_root() -> String {
    std::env::var("DEPOT_ROOT").unwrap_or_else(|_| format!("{}/depot", xdg_data_home().display()))
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
}

fn default_user_agent() -> String {
    format!("depot/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    pub fn default_config() -> Self {
        let root = depot_root();

        Self {
            index_url: Some(DEFAULT_INDEX_URL.to_string()),
            index_path: Some(format!("{root}/index")),
            db_path: Some(format!("{root}/catalog.db")),
            archive_path: Some(format!("{root}/crates")),
            update_index: Some(true),
            workers: Some(default_workers()),
            fetch_licenses: Some(true),
            download_yanked: Some(true),
            archive_extension: Some(DEFAULT_ARCHIVE_EXTENSION.to_string()),
            api_url: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT.to_string()),
            user_agent: Some(default_user_agent()),
        }
    }

    /// Loads the configuration at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills unset keys with defaults and validates the result.
    pub fn resolve(&mut self) -> Result<()> {
        let root = depot_root();

        self.index_url
            .get_or_insert_with(|| DEFAULT_INDEX_URL.to_string());
        self.index_path.get_or_insert_with(|| format!("{root}/index"));
        self.db_path.get_or_insert_with(|| format!("{root}/catalog.db"));
        self.archive_path
            .get_or_insert_with(|| format!("{root}/crates"));
        self.update_index.get_or_insert(true);
        self.fetch_licenses.get_or_insert(true);
        self.download_yanked.get_or_insert(true);
        self.user_agent.get_or_insert_with(default_user_agent);

        let workers = *self.workers.get_or_insert_with(default_workers);
        if workers == 0 {
            return Err(ConfigError::InvalidWorkers(workers));
        }

        let ext = self
            .archive_extension
            .get_or_insert_with(|| DEFAULT_ARCHIVE_EXTENSION.to_string());
        let trimmed = ext.trim_start_matches('.').to_string();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "archive_extension",
                reason: format!("`{ext}` is not a usable file extension"),
            });
        }
        *ext = trimmed;

        let timeout = self
            .request_timeout
            .get_or_insert_with(|| DEFAULT_REQUEST_TIMEOUT.to_string());
        if parse_duration(timeout).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout",
                reason: format!("cannot parse `{timeout}` as a duration"),
            });
        }

        if let Some(api_url) = &self.api_url {
            match url::Url::parse(api_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => {
                    return Err(ConfigError::InvalidValue {
                        field: "api_url",
                        reason: format!("unsupported scheme `{}`", url.scheme()),
                    });
                }
                Err(err) => {
                    return Err(ConfigError::InvalidValue {
                        field: "api_url",
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn get_index_url(&self) -> &str {
        self.index_url.as_deref().unwrap_or(DEFAULT_INDEX_URL)
    }

    pub fn get_index_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("DEPOT_INDEX") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.index_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(resolve_path(&format!("{}/index", depot_root()))?),
        }
    }

    pub fn get_db_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("DEPOT_DB") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.db_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(resolve_path(&format!("{}/catalog.db", depot_root()))?),
        }
    }

    pub fn get_archive_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("DEPOT_ARCHIVES") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.archive_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(resolve_path(&format!("{}/crates", depot_root()))?),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }

    pub fn update_index(&self) -> bool {
        self.update_index.unwrap_or(true)
    }

    pub fn fetch_licenses(&self) -> bool {
        self.fetch_licenses.unwrap_or(true)
    }

    pub fn download_yanked(&self) -> bool {
        self.download_yanked.unwrap_or(true)
    }

    pub fn archive_extension(&self) -> &str {
        self.archive_extension
            .as_deref()
            .unwrap_or(DEFAULT_ARCHIVE_EXTENSION)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(Duration::from_secs(60))
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(default_user_agent)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;
        Ok(doc)
    }
}

/// Writes the annotated default configuration to `path`.
///
/// Refuses to overwrite an existing file.
pub fn generate_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(path.display().to_string()));
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    #[serial]
    fn test_default_config_uses_depot_root() {
        with_env(vec![("DEPOT_ROOT", "/srv/depot")], || {
            let config = Config::default_config();
            assert_eq!(config.index_path.as_deref(), Some("/srv/depot/index"));
            assert_eq!(config.db_path.as_deref(), Some("/srv/depot/catalog.db"));
            assert_eq!(config.archive_path.as_deref(), Some("/srv/depot/crates"));
            assert_eq!(config.get_index_url(), DEFAULT_INDEX_URL);
            assert!(config.workers() >= 2);
        });
    }

    #[test]
    #[serial]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.update_index());
        assert!(config.fetch_licenses());
        assert_eq!(config.archive_extension(), "crate");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "workers = 3\nupdate_index = false\narchive_extension = \".tar\"\nrequest_timeout = \"2m\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers(), 3);
        assert!(!config.update_index());
        assert_eq!(config.archive_extension(), "tar");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert!(config.download_yanked());
        assert!(config.db_path.is_some());
    }

    #[test]
    fn test_resolve_rejects_zero_workers() {
        let mut config = Config {
            workers: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidWorkers(0))
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_timeout_and_api_url() {
        let mut config = Config {
            request_timeout: Some("soon".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue {
                field: "request_timeout",
                ..
            })
        ));

        let mut config = Config {
            api_url: Some("ftp://mirror.example/api".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue { field: "api_url", .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_empty_extension() {
        let mut config = Config {
            archive_extension: Some(".".into()),
            ..Default::default()
        };
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "workers = \"many\"").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides_win_over_file() {
        let config = Config {
            db_path: Some("/from/file.db".into()),
            archive_path: Some("/from/file/crates".into()),
            ..Default::default()
        };
        with_env(
            vec![("DEPOT_DB", "/env/catalog.db"), ("DEPOT_ARCHIVES", "/env/crates")],
            || {
                assert_eq!(config.get_db_path().unwrap(), PathBuf::from("/env/catalog.db"));
                assert_eq!(
                    config.get_archive_path().unwrap(),
                    PathBuf::from("/env/crates")
                );
            },
        );
        assert_eq!(config.get_db_path().unwrap(), PathBuf::from("/from/file.db"));
    }

    #[test]
    #[serial]
    fn test_config_path_precedence() {
        with_env(vec![("DEPOT_CONFIG", "/etc/depot.toml")], || {
            assert_eq!(
                config_path(Some("/opt/depot.toml")).unwrap(),
                PathBuf::from("/opt/depot.toml")
            );
            assert_eq!(config_path(None).unwrap(), PathBuf::from("/etc/depot.toml"));
        });
    }

    #[test]
    fn test_generate_default_config_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        generate_default_config(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let parsed: Config = toml::from_str(&written).unwrap();
        assert_eq!(parsed.get_index_url(), DEFAULT_INDEX_URL);

        assert!(matches!(
            generate_default_config(&path),
            Err(ConfigError::ConfigAlreadyExists(_))
        ));
    }
}
