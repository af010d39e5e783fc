//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and the
//! remaining sources are used. A TOML file that exists but cannot be parsed
//! is reported as [`Error::Config`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "CRM_ROOT_FOLDER";
/// Environment variable overriding the listen port
pub const ENV_PORT: &str = "CRM_PORT";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "CRM_LOG_LEVEL";

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "crm.db";

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Logging section of the TOML file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`
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

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_ttl_hours: Option<i64>,
    /// Password for the `admin` user created on first start
    pub admin_password: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub session_ttl_hours: i64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        // ~/.local/share/crm, ~/Library/Application Support/crm, %LOCALAPPDATA%\crm
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("crm"))
            .unwrap_or_else(|| PathBuf::from("./crm_data"));

        Self {
            root_folder,
            bind_address: "127.0.0.1".to_string(),
            port: 5730,
            log_level: default_log_level(),
            session_ttl_hours: 24 * 7,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub session_ttl_hours: i64,
    pub admin_password: Option<String>,
}

impl ServiceConfig {
    /// Resolve configuration from all sources
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let toml = match &cli.config_file {
            // An explicitly requested file must exist
            Some(path) => TomlConfig::load(path)?,
            None => match default_config_file() {
                Some(path) => {
                    info!("Loading config file {}", path.display());
                    TomlConfig::load(&path)?
                }
                None => {
                    warn!("No config file found, using defaults");
                    TomlConfig::default()
                }
            },
        };

        Self::merge(cli, toml, CompiledDefaults::for_current_platform())
    }

    /// Merge already loaded sources, reading the environment for tier 2
    pub fn merge(cli: &CliOverrides, toml: TomlConfig, defaults: CompiledDefaults) -> Result<Self> {
        let root_folder = cli
            .root_folder
            .clone()
            .or_else(|| std::env::var(ENV_ROOT_FOLDER).ok().map(PathBuf::from))
            .or(toml.root_folder)
            .unwrap_or(defaults.root_folder);

        let port = match cli.port {
            Some(port) => port,
            None => match std::env::var(ENV_PORT) {
                Ok(value) => value.parse::<u16>().map_err(|e| {
                    Error::Config(format!("{} is not a valid port ({}): {}", ENV_PORT, value, e))
                })?,
                Err(_) => toml.port.unwrap_or(defaults.port),
            },
        };

        let log_level = cli
            .log_level
            .clone()
            .or_else(|| std::env::var(ENV_LOG_LEVEL).ok())
            .unwrap_or_else(|| {
                if toml.logging.level.is_empty() {
                    defaults.log_level.clone()
                } else {
                    toml.logging.level.clone()
                }
            });

        let bind_address = cli
            .bind_address
            .clone()
            .or(toml.bind_address)
            .unwrap_or(defaults.bind_address);

        let session_ttl_hours = toml.session_ttl_hours.unwrap_or(defaults.session_ttl_hours);
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(Error::Config(format!(
                "session_ttl_hours must be between 1 and {}, got {}",
                MAX_SESSION_TTL_HOURS, session_ttl_hours
            )));
        }

        Ok(Self {
            root_folder,
            bind_address,
            port,
            log_level,
            session_ttl_hours,
            admin_password: toml.admin_password,
        })
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    /// `host:port` string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Create the root folder if it is missing
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}

/// Locate the default config file for the platform
///
/// Tries the per-user config dir first, then `/etc/crm/config.toml` on Linux.
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("crm").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/crm/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
