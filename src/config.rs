//! Configuration for groomtrack paths and runtime settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GROOMTRACK_HOME, GROOMTRACK_DB, GROOMTRACK_CATALOG)
//! 2. Config file (.groomtrack/config.yaml)
//! 3. Defaults (~/.groomtrack)
//!
//! Config file discovery:
//! - Searches current directory and parents for .groomtrack/config.yaml
//! - `home` is relative to the .groomtrack/ directory, other paths to the
//!   project root holding it

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".groomtrack";
const DEFAULT_TENANT: &str = "default";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .groomtrack/)
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Service catalog YAML
    pub catalog: Option<String>,
    /// Delivery notification outbox (JSONL)
    pub outbox: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub home: PathBuf,
    pub database: PathBuf,
    pub catalog: PathBuf,
    pub outbox: PathBuf,
    pub tenant_id: String,
    pub retry: RetryPolicy,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment overrides, read once per load
#[derive(Debug, Default)]
struct EnvOverrides {
    home: Option<PathBuf>,
    database: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().map(PathBuf::from);
        Self {
            home: var("GROOMTRACK_HOME"),
            database: var("GROOMTRACK_DB"),
            catalog: var("GROOMTRACK_CATALOG"),
        }
    }
}

/// Combine overrides, an optional config file and defaults
fn resolve(
    env: EnvOverrides,
    default_home: PathBuf,
    config_file: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };
    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    // .groomtrack/ and the project root above it
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = config_dir.parent().unwrap_or(Path::new("."));

    let home = env
        .home
        .or_else(|| paths.home.as_deref().map(|h| resolve_path(config_dir, h)))
        .unwrap_or(default_home);

    let database = env
        .database
        .or_else(|| paths.database.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("groomtrack.db"));

    let catalog = env
        .catalog
        .or_else(|| paths.catalog.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("catalog.yaml"));

    let outbox = paths
        .outbox
        .as_deref()
        .map(|p| resolve_path(base_dir, p))
        .unwrap_or_else(|| home.join("outbox.jsonl"));

    let (tenant_id, retry) = match file {
        Some(f) => (
            f.tenant.unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            f.retry.unwrap_or_default(),
        ),
        None => (DEFAULT_TENANT.to_string(), RetryPolicy::default()),
    };

    Ok(ResolvedConfig {
        home,
        database,
        catalog,
        outbox,
        tenant_id,
        retry,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    resolve(EnvOverrides::from_env(), default_home, find_config_file(&cwd))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration, bypassing the cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
