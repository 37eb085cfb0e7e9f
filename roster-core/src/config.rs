//! Immutable, validated runtime configuration.
//!
//! # Sources
//!
//! 1. Optional YAML file (`--config`, `$ROSTER_CONFIG`, or `~/.roster/config.yaml`).
//! 2. `ROSTER_*` environment variables, which override file values.
//!
//! Everything is validated once in [`Config::resolve`]; the rest of the
//! workspace only ever sees a fully populated [`Config`].
//!
//! # API pattern
//!
//! As with the other path helpers in this crate, loaders come in two forms:
//! - `load_with(path, env)`: explicit environment lookup; used in tests
//! - `load(path)`: reads the process environment, delegates to `load_with`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Dn;

/// Used when neither `ROSTER_SOURCE_TOKEN` nor a token file is configured.
pub const DEFAULT_TOKEN_FILE: &str = "/run/secrets/roster_token";

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MANAGED_OU: &str = "users";
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_EXCLUDE_SURNAME: &str = "land";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;
pub const DEFAULT_PACING_MS: u64 = 200;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// Access-control API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// API root, e.g. `https://10.0.0.2:12445/api/v1/developer`. No trailing slash.
    pub base_url: String,
    pub token: Secret,
    pub timeout: Duration,
    pub page_size: u32,
    /// Restrict policy discovery to the site with this name.
    pub site_name: Option<String>,
}

/// Directory connection and placement settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// `ldap://host:389` or `ldaps://host:636`.
    pub url: String,
    pub bind_dn: String,
    pub bind_password: Secret,
    pub base_dn: String,
    pub managed_ou: String,
}

impl DirectoryConfig {
    /// DN of the managed subtree: `ou=<managed_ou>,<base_dn>`.
    pub fn managed_dn(&self) -> Dn {
        Dn::for_subtree(&self.managed_ou, &self.base_dn)
    }
}

/// Reconciliation behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub interval: Duration,
    /// Case-insensitive surname substrings that mark service accounts.
    pub exclude_surnames: Vec<String>,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub pacing_delay: Duration,
    /// When set, an LDIF snapshot is written here before any mutation.
    pub backup_dir: Option<PathBuf>,
}

/// Root configuration, immutable after [`Config::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: SourceConfig,
    pub directory: DirectoryConfig,
    pub sync: SyncConfig,
}

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

/// YAML file layout. Every field is optional; env vars fill or override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub source: SourceSection,
    pub directory: DirectorySection,
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorySection {
    pub url: Option<String>,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub base_dn: Option<String>,
    pub managed_ou: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub interval_secs: Option<u64>,
    pub exclude_surnames: Option<Vec<String>>,
    pub retry_max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub pacing_delay_ms: Option<u64>,
    pub backup_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.roster/config.yaml`. Pure, no I/O.
pub fn default_config_path_at(home: &Path) -> PathBuf {
    home.join(".roster").join("config.yaml")
}

/// `default_config_path_at` convenience wrapper.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(default_config_path_at(&home))
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse a YAML config file.
pub fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load from an optional file plus an explicit environment lookup.
pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(path) => read_file(path)?,
        None => ConfigFile::default(),
    };
    Config::resolve(file, env)
}

/// `load_with` convenience wrapper over the process environment.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

impl Config {
    /// Merge `file` with the environment and validate the result.
    ///
    /// Collects every problem before failing so operators fix them in one pass.
    pub fn resolve<F>(file: ConfigFile, env: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();
        let lookup = |key: &str| env(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        // source
        let base_url = lookup("ROSTER_SOURCE_URL")
            .or(file.source.base_url)
            .map(|url| url.trim_end_matches('/').to_owned());
        match base_url.as_deref() {
            None => problems.push("ROSTER_SOURCE_URL is required".to_owned()),
            Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => {
                problems.push(format!("ROSTER_SOURCE_URL must be an http(s) URL, got '{url}'"))
            }
            Some(_) => {}
        }

        let token_file = lookup("ROSTER_SOURCE_TOKEN_FILE")
            .map(PathBuf::from)
            .or(file.source.token_file);
        let token = match lookup("ROSTER_SOURCE_TOKEN").or(file.source.token) {
            Some(token) => Some(token),
            None => read_token_file(token_file.as_deref(), &mut problems),
        };
        if token.as_deref().map_or(true, str::is_empty) && token_file.is_none() {
            problems.push(format!(
                "ROSTER_SOURCE_TOKEN or a token file ({DEFAULT_TOKEN_FILE}) is required"
            ));
        }

        let timeout_secs = pick(
            &lookup,
            "ROSTER_SOURCE_TIMEOUT_SECS",
            file.source.timeout_secs,
            DEFAULT_TIMEOUT_SECS,
            &mut problems,
        );
        let page_size = pick(
            &lookup,
            "ROSTER_PAGE_SIZE",
            file.source.page_size,
            DEFAULT_PAGE_SIZE,
            &mut problems,
        );
        if page_size == 0 {
            problems.push("ROSTER_PAGE_SIZE must be greater than zero".to_owned());
        }
        let site_name = lookup("ROSTER_SITE_NAME").or(file.source.site_name);

        // directory
        let url = lookup("ROSTER_LDAP_URL").or(file.directory.url);
        match url.as_deref() {
            None => problems.push("ROSTER_LDAP_URL is required".to_owned()),
            Some(url) if !(url.starts_with("ldap://") || url.starts_with("ldaps://")) => {
                problems.push(format!("ROSTER_LDAP_URL must be an ldap(s) URL, got '{url}'"))
            }
            Some(_) => {}
        }
        let bind_dn = lookup("ROSTER_LDAP_BIND_DN").or(file.directory.bind_dn);
        if bind_dn.is_none() {
            problems.push("ROSTER_LDAP_BIND_DN is required".to_owned());
        }
        let bind_password = lookup("ROSTER_LDAP_BIND_PASSWORD")
            .or(file.directory.bind_password)
            .unwrap_or_default();
        let base_dn = lookup("ROSTER_LDAP_BASE_DN").or(file.directory.base_dn);
        if base_dn.is_none() {
            problems.push("ROSTER_LDAP_BASE_DN is required".to_owned());
        }
        let managed_ou = lookup("ROSTER_LDAP_MANAGED_OU")
            .or(file.directory.managed_ou)
            .unwrap_or_else(|| DEFAULT_MANAGED_OU.to_owned());

        // sync
        let interval_secs = pick(
            &lookup,
            "ROSTER_SYNC_INTERVAL_SECS",
            file.sync.interval_secs,
            DEFAULT_INTERVAL_SECS,
            &mut problems,
        );
        if interval_secs == 0 {
            problems.push("ROSTER_SYNC_INTERVAL_SECS must be greater than zero".to_owned());
        }
        let exclude_surnames = match lookup("ROSTER_EXCLUDE_SURNAMES") {
            Some(raw) => split_list(&raw),
            None => file
                .sync
                .exclude_surnames
                .unwrap_or_else(|| vec![DEFAULT_EXCLUDE_SURNAME.to_owned()]),
        };
        let retry_max_attempts = pick(
            &lookup,
            "ROSTER_MAX_ATTEMPTS",
            file.sync.retry_max_attempts,
            DEFAULT_MAX_ATTEMPTS,
            &mut problems,
        );
        if retry_max_attempts == 0 {
            problems.push("ROSTER_MAX_ATTEMPTS must be at least 1".to_owned());
        }
        let retry_base_ms = pick(
            &lookup,
            "ROSTER_RETRY_BASE_MS",
            file.sync.retry_base_delay_ms,
            DEFAULT_RETRY_BASE_MS,
            &mut problems,
        );
        let pacing_ms = pick(
            &lookup,
            "ROSTER_PACING_MS",
            file.sync.pacing_delay_ms,
            DEFAULT_PACING_MS,
            &mut problems,
        );
        let backup_dir = lookup("ROSTER_BACKUP_DIR")
            .map(PathBuf::from)
            .or(file.sync.backup_dir);

        match (base_url, token, url, bind_dn, base_dn) {
            (Some(base_url), Some(token), Some(url), Some(bind_dn), Some(base_dn))
                if problems.is_empty() =>
            {
                Ok(Config {
                    source: SourceConfig {
                        base_url,
                        token: Secret::new(token),
                        timeout: Duration::from_secs(timeout_secs),
                        page_size,
                        site_name,
                    },
                    directory: DirectoryConfig {
                        url,
                        bind_dn,
                        bind_password: Secret::new(bind_password),
                        base_dn,
                        managed_ou,
                    },
                    sync: SyncConfig {
                        interval: Duration::from_secs(interval_secs),
                        exclude_surnames,
                        retry_max_attempts,
                        retry_base_delay: Duration::from_millis(retry_base_ms),
                        pacing_delay: Duration::from_millis(pacing_ms),
                        backup_dir,
                    },
                })
            }
            _ => Err(ConfigError::Invalid { problems }),
        }
    }
}

fn read_token_file(explicit: Option<&Path>, problems: &mut Vec<String>) -> Option<String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_TOKEN_FILE);
            if !fallback.exists() {
                return None;
            }
            fallback
        }
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let token = contents.trim().to_owned();
            if token.is_empty() {
                problems.push(format!("token file {} is empty", path.display()));
                None
            } else {
                Some(token)
            }
        }
        Err(err) => {
            problems.push(format!("cannot read token file {}: {err}", path.display()));
            None
        }
    }
}

fn pick<T, L>(lookup: &L, key: &str, file: Option<T>, default: T, problems: &mut Vec<String>) -> T
where
    T: FromStr + Copy,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                problems.push(format!("{key}: expected a non-negative integer, got '{raw}'"));
                default
            }
        },
        None => file.unwrap_or(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
