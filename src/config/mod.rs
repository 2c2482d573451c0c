//! Configuration management.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "THEMEPORT_CONFIG_PATH";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "THEMEPORT_DATA_DIR";

/// File name of the `SQLite` database inside the data directory.
pub const DATABASE_FILE: &str = "content.sqlite";

/// Main configuration for themeport.
#[derive(Debug, Clone)]
pub struct PorterConfig {
    /// Directory holding the content database.
    pub data_dir: PathBuf,
    /// Default directory for export files.
    pub export_dir: PathBuf,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Output format: "pretty" or "json".
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. "info" or "themeport=debug".
    pub level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Export directory.
    pub export_dir: Option<String>,
    /// Logging configuration.
    pub logging: Option<LoggingSettings>,
}

impl Default for PorterConfig {
    fn default() -> Self {
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".themeport"),
            |dirs| dirs.data_local_dir().join("themeport"),
        );
        Self {
            data_dir,
            export_dir: PathBuf::from("."),
            logging: LoggingSettings::default(),
        }
    }
}

impl PorterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration following the lookup order.
    ///
    /// 1. `explicit` (the `--config` flag)
    /// 2. `THEMEPORT_CONFIG_PATH`
    /// 3. [`Self::load_default`]
    ///
    /// `THEMEPORT_DATA_DIR` is applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        let config = if let Some(path) = explicit {
            Self::load_from_file(path)?
        } else if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            Self::load_from_file(Path::new(&path))?
        } else {
            Self::load_default()
        };
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid config TOML.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/themeport/` on macOS)
    /// 2. XDG config dir (`~/.config/themeport/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("themeport").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("themeport")
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `PorterConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(export_dir) = file.export_dir {
            config.export_dir = PathBuf::from(export_dir);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies `THEMEPORT_DATA_DIR` if set.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => self.with_data_dir(dir),
            _ => self,
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the `SQLite` content database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}
