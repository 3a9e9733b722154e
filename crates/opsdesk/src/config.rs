//! Configuration management for opsdesk.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. The
//! credential table lives here too: it is injected at startup, never compiled
//! in.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::assignment::{DeletionPolicy, REQUIRED_FIELDS};
use crate::collection::{
    default_collections, validate_name, CollectionKind, CollectionSpec, LAST_ACCESS,
};
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "opsdesk";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "opsdesk.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `OPSDESK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/opsdesk/config.toml`
/// 3. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub store: StoreConfig,
    /// Credential table.
    pub auth: AuthConfig,
    /// Work-assignment configuration.
    pub assignments: AssignmentConfig,
    /// Collections shown on the dashboard.
    pub collections: Vec<CollectionSpec>,
}

/// Which backend store persists the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// One JSON file per collection.
    #[default]
    File,
    /// Remote HTTP collection API.
    Remote,
    /// Embedded `SQLite` database.
    Sqlite,
    /// Process memory (nothing persisted).
    Memory,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use.
    pub backend: StoreBackend,
    /// Directory for collection files.
    /// Defaults to `~/.local/share/opsdesk`
    pub data_dir: Option<PathBuf>,
    /// Path to the `SQLite` database.
    /// Defaults to `~/.local/share/opsdesk/opsdesk.db`
    pub database_path: Option<PathBuf>,
    /// Remote API settings.
    pub remote: RemoteConfig,
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the collection API.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// One entry of the credential table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Login name.
    pub username: String,
    /// Argon2 PHC string (see `opsdesk hash-password`).
    pub password_hash: String,
}

impl Credential {
    /// Create a credential entry.
    #[must_use]
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Credential table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identities with the editor role.
    pub editors: Vec<Credential>,
    /// Identities with the restricted-publisher role.
    pub publishers: Vec<Credential>,
    /// Shared password granting the viewer role to any name.
    pub viewer_password_hash: Option<String>,
}

/// Work-assignment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Name of the work-assignment collection.
    pub collection: String,
    /// Who may delete assignments.
    pub deletion_policy: DeletionPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            collection: "assignments".to_string(),
            deletion_policy: DeletionPolicy::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            assignments: AssignmentConfig::default(),
            collections: default_collections(),
        }
    }
}

impl StoreConfig {
    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Config::default_data_dir)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DATABASE_FILE_NAME))
    }
}

impl RemoteConfig {
    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("OPSDESK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Look up a collection by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.validate_collections()?;
        self.validate_assignments()?;
        self.validate_store()?;
        self.validate_auth()
    }

    fn validate_collections(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.collections {
            validate_name(&spec.name)
                .map_err(|_| Error::config(format!("invalid collection name '{}'", spec.name)))?;
            if spec.name == LAST_ACCESS {
                return Err(Error::config(format!(
                    "collection name '{LAST_ACCESS}' is reserved"
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate collection '{}'",
                    spec.name
                )));
            }
            if spec.fields.is_empty() {
                return Err(Error::config(format!(
                    "collection '{}' has no fields",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    fn validate_assignments(&self) -> Result<()> {
        let name = &self.assignments.collection;
        let spec = self.collection(name).ok_or_else(|| {
            Error::config(format!("assignments collection '{name}' is not configured"))
        })?;
        if spec.kind != CollectionKind::WorkAssignment {
            return Err(Error::config(format!(
                "assignments collection '{name}' must have kind work_assignment"
            )));
        }
        for required in REQUIRED_FIELDS {
            if !spec.fields.iter().any(|f| f == required) {
                return Err(Error::config(format!(
                    "assignments collection '{name}' is missing field '{required}'"
                )));
            }
        }
        let extra = self
            .collections
            .iter()
            .filter(|c| c.kind == CollectionKind::WorkAssignment && &c.name != name)
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        if !extra.is_empty() {
            return Err(Error::config(format!(
                "only '{name}' may have kind work_assignment (also found: {})",
                extra.join(", ")
            )));
        }
        Ok(())
    }

    fn validate_store(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Remote && self.store.remote.base_url.is_none() {
            return Err(Error::config(
                "store.remote.base_url is required for the remote backend",
            ));
        }
        if self.store.remote.timeout_secs == 0 {
            return Err(Error::config(
                "store.remote.timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_auth(&self) -> Result<()> {
        let tables = self.auth.editors.iter().chain(&self.auth.publishers);
        for credential in tables {
            if credential.username.trim().is_empty() {
                return Err(Error::config("credential with empty username"));
            }
            check_phc(&credential.password_hash).map_err(|_| {
                Error::config(format!(
                    "password hash for '{}' is not a valid PHC string",
                    credential.username
                ))
            })?;
        }
        if let Some(hash) = &self.auth.viewer_password_hash {
            check_phc(hash)
                .map_err(|_| Error::config("viewer_password_hash is not a valid PHC string"))?;
        }
        Ok(())
    }
}

fn check_phc(hash: &str) -> std::result::Result<(), argon2::password_hash::Error> {
    argon2::PasswordHash::new(hash).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::hash_password;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(config.auth.editors.is_empty());
        assert!(config.auth.viewer_password_hash.is_none());
        assert_eq!(config.assignments.collection, "assignments");
        assert_eq!(
            config.assignments.deletion_policy,
            DeletionPolicy::OwnerOrEditor
        );
        assert_eq!(config.collections.len(), 9);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_collection() {
        let mut config = Config::default();
        config
            .collections
            .push(CollectionSpec::new("ideas", "Ideas again", &["idea"], CollectionKind::Standard));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate collection 'ideas'"));
    }

    #[test]
    fn test_validate_reserved_name() {
        let mut config = Config::default();
        config.collections.push(CollectionSpec::new(
            LAST_ACCESS,
            "Oops",
            &["user"],
            CollectionKind::Standard,
        ));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("reserved"));
    }

    #[test]
    fn test_validate_bad_collection_name() {
        let mut config = Config::default();
        config.collections.push(CollectionSpec::new(
            "../up",
            "Bad",
            &["x"],
            CollectionKind::Standard,
        ));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid collection name"));
    }

    #[test]
    fn test_validate_empty_fields() {
        let mut config = Config::default();
        config
            .collections
            .push(CollectionSpec::new("empty", "Empty", &[], CollectionKind::Standard));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("has no fields"));
    }

    #[test]
    fn test_validate_missing_assignments_collection() {
        let mut config = Config::default();
        config.assignments.collection = "work".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("'work' is not configured"));
    }

    #[test]
    fn test_validate_assignments_kind() {
        let mut config = Config::default();
        config.assignments.collection = "ideas".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must have kind work_assignment"));
    }

    #[test]
    fn test_validate_assignments_required_fields() {
        let mut config = Config::default();
        for spec in &mut config.collections {
            if spec.kind == CollectionKind::WorkAssignment {
                spec.fields.retain(|f| f != "done");
            }
        }

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("missing field 'done'"));
    }

    #[test]
    fn test_validate_remote_requires_url() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Remote;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("base_url"));

        config.store.remote.base_url = Some("https://ops.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.store.remote.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_bad_password_hash() {
        let mut config = Config::default();
        config
            .auth
            .editors
            .push(Credential::new("anna", "plaintext"));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("'anna'"));
    }

    #[test]
    fn test_validate_good_password_hash() {
        let mut config = Config::default();
        config
            .auth
            .editors
            .push(Credential::new("anna", hash_password("pw").unwrap()));
        config.auth.viewer_password_hash = Some(hash_password("shared").unwrap());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_dir_and_database_path() {
        let mut store = StoreConfig::default();
        assert!(store.data_dir().to_string_lossy().contains("opsdesk"));
        assert!(store.database_path().ends_with("opsdesk.db"));

        store.data_dir = Some(PathBuf::from("/srv/ops"));
        assert_eq!(store.database_path(), PathBuf::from("/srv/ops/opsdesk.db"));

        store.database_path = Some(PathBuf::from("/tmp/x.db"));
        assert_eq!(store.database_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_remote_timeout() {
        assert_eq!(RemoteConfig::default().timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("opsdesk"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let hash = hash_password("Q6D").unwrap();
        std::fs::write(
            &path,
            format!(
                r#"
[store]
backend = "sqlite"
data_dir = "/srv/opsdesk"

[assignments]
deletion_policy = "owner_only"

[[auth.editors]]
username = "anna"
password_hash = "{hash}"
"#
            ),
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.data_dir, Some(PathBuf::from("/srv/opsdesk")));
        assert_eq!(config.assignments.deletion_policy, DeletionPolicy::OwnerOnly);
        assert_eq!(config.auth.editors.len(), 1);
        assert_eq!(config.auth.editors[0].username, "anna");
        // collections not mentioned in the file keep their defaults
        assert_eq!(config.collections, default_collections());
    }

    #[test]
    fn test_load_invalid_toml_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "remote"
"#,
        )
        .unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_config_serialize_round_trip_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("deletion_policy"));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
