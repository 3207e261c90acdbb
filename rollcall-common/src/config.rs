//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ROLLCALL_ROOT_FOLDER`, then `ROLLCALL_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: it is logged and the
//! next source is used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Primary root folder environment variable
pub const ROOT_FOLDER_ENV: &str = "ROLLCALL_ROOT_FOLDER";

/// Secondary root folder environment variable
pub const ROOT_ENV: &str = "ROLLCALL_ROOT";

/// Default durable attendance log file name
pub const DEFAULT_ATTENDANCE_FILE: &str = "attendance.csv";

/// Default student directory file name
pub const DEFAULT_STUDENTS_FILE: &str = "students.csv";

/// Default scan cooldown in milliseconds
pub const DEFAULT_COOLDOWN_MS: u64 = 3000;

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file; stderr when absent
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Contents of `<module>.toml`
///
/// Every field is optional so a partial file still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub attendance_file: Option<PathBuf>,
    pub students_file: Option<PathBuf>,
    pub cooldown_ms: Option<u64>,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Scan cooldown, falling back to the compiled default
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS)
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Serialize a TOML config to `path`
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("serialize failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// OS-dependent defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\rollcall
        dirs::data_local_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\rollcall"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/rollcall
        dirs::data_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/rollcall"))
    } else {
        // ~/.local/share/rollcall (or /var/lib/rollcall for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/rollcall"))
    }
}

/// Resolves the root folder for one rollcall module
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
        }
    }

    /// Root folder given on the command line, if any
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    /// `~/.config/rollcall/<module>.toml` (platform config dir)
    pub fn config_file_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join("rollcall")
                .join(format!("{}.toml", self.module_name))
        })
    }

    /// Load the module's TOML config; `Ok(None)` when there is no file
    pub fn try_load_config(&self) -> Result<Option<TomlConfig>> {
        let Some(path) = self.config_file_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        load_toml_config(&path).map(Some)
    }

    /// Load the module's TOML config, or defaults if absent or broken
    pub fn load_config(&self) -> TomlConfig {
        match self.try_load_config() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("No config file for {}, using defaults", self.module_name);
                TomlConfig::default()
            }
            Err(e) => {
                warn!("Ignoring config file: {}", e);
                TomlConfig::default()
            }
        }
    }

    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(&self.load_config())
    }

    /// Resolve using an already loaded config
    pub fn resolve_with(&self, config: &TomlConfig) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_override {
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &config.root_folder {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives file locations under it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents); safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Durable log path; `configured` may be absolute or root-relative
    pub fn attendance_path(&self, configured: Option<&Path>) -> PathBuf {
        self.under_root(configured, DEFAULT_ATTENDANCE_FILE)
    }

    /// Student directory path; `configured` may be absolute or root-relative
    pub fn students_path(&self, configured: Option<&Path>) -> PathBuf {
        self.under_root(configured, DEFAULT_STUDENTS_FILE)
    }

    fn under_root(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root_folder.join(path),
            None => self.root_folder.join(default_name),
        }
    }
}
