//! TOML settings file on disk.
//!
//! Default location per platform:
//!
//! | Platform | Path                                                   |
//! |----------|--------------------------------------------------------|
//! | Windows  | `%APPDATA%\padlink\server.toml`                        |
//! | Linux    | `$XDG_CONFIG_HOME/padlink/server.toml` (or `~/.config`) |
//! | macOS    | `~/Library/Application Support/padlink/server.toml`    |

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::SettingsStore;
use crate::domain::{ConfigError, ServerSettings};

const FILE_NAME: &str = "server.toml";

/// Loads and saves [`ServerSettings`] as pretty-printed TOML.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoPlatformConfigDir`] when the environment does not say
    /// where configuration lives.
    pub fn at_default_location() -> Result<Self, ConfigError> {
        let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
        Ok(Self::new(dir.join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    /// Returns defaults when the file does not exist yet.
    fn load(&self) -> Result<ServerSettings, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings file at {}; using defaults", self.path.display());
                Ok(ServerSettings::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, settings: &ServerSettings) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("padlink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("padlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("padlink"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
