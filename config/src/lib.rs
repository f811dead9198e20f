//! Settings for the J language server.
//!
//! Settings are layered: built-in defaults, then the optional user file
//! (`<config_dir>/jls/config.toml`), then whatever the editor sends as
//! `initializationOptions` or `workspace/didChangeConfiguration`.
//!
//! ```toml
//! executable_path = "~/.j/bin/j"
//! enable_linting = true
//! show_output_on_run = true
//! check_timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

/// Default toolchain executable, looked up on `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "j";

/// Default timeout for background `check` runs.
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;

/// Keys under which editors commonly nest extension settings.
const CLIENT_SECTION_KEYS: &[&str] = &["j-lang", "jLang", "jls"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Effective settings after all layers are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Toolchain binary; bare name or path. Env vars and `~` already expanded.
    pub executable_path: String,
    /// Validate automatically on save.
    pub enable_linting: bool,
    /// Reveal the output surface when a file is run.
    pub show_output_on_run: bool,
    /// Timeout for background `check` runs; `None` disables it.
    pub check_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable_path: DEFAULT_EXECUTABLE.to_string(),
            enable_linting: true,
            show_output_on_run: true,
            check_timeout: Some(Duration::from_secs(DEFAULT_CHECK_TIMEOUT_SECS)),
        }
    }
}

/// The user config file. Every key is optional; absent keys keep the lower layer.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub executable_path: Option<String>,
    pub enable_linting: Option<bool>,
    pub show_output_on_run: Option<bool>,
    pub check_timeout_secs: Option<u64>,
}

/// Settings as sent by the editor (camelCase).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    pub executable_path: Option<String>,
    pub enable_linting: Option<bool>,
    pub show_output_on_run: Option<bool>,
    pub check_timeout_secs: Option<u64>,
}

impl ClientSettings {
    /// Deserialize client settings, accepting either a flat object or one
    /// nested under a `j-lang` section.
    ///
    /// `None` when the payload carries no settings at all (`null`, a
    /// non-object, or a `null` section); callers keep what they have.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        let Some(object) = value.as_object() else {
            return Ok(None);
        };
        let section = CLIENT_SECTION_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .unwrap_or(value);
        if !section.is_object() {
            return Ok(None);
        }
        serde_json::from_value(section.clone()).map(Some)
    }
}

impl Settings {
    /// Defaults overlaid with the user file, if any.
    pub fn with_file(file: Option<&FileConfig>) -> Self {
        let mut settings = Self::default();
        if let Some(file) = file {
            settings.overlay(
                file.executable_path.as_deref(),
                file.enable_linting,
                file.show_output_on_run,
                file.check_timeout_secs,
            );
        }
        settings
    }

    /// A copy of `self` overlaid with client-provided settings.
    #[must_use]
    pub fn with_client(&self, client: &ClientSettings) -> Self {
        let mut settings = self.clone();
        settings.overlay(
            client.executable_path.as_deref(),
            client.enable_linting,
            client.show_output_on_run,
            client.check_timeout_secs,
        );
        settings
    }

    fn overlay(
        &mut self,
        executable_path: Option<&str>,
        enable_linting: Option<bool>,
        show_output_on_run: Option<bool>,
        check_timeout_secs: Option<u64>,
    ) {
        // An empty path falls back to the previous layer, matching editors that
        // store "" for "unset".
        if let Some(path) = executable_path.map(str::trim).filter(|p| !p.is_empty()) {
            self.executable_path = expand_path(path);
        }
        if let Some(enabled) = enable_linting {
            self.enable_linting = enabled;
        }
        if let Some(show) = show_output_on_run {
            self.show_output_on_run = show;
        }
        if let Some(secs) = check_timeout_secs {
            self.check_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

impl FileConfig {
    /// Load the user config file.
    ///
    /// Returns `Ok(None)` when there is no config directory or no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jls").join("config.toml"))
}

/// Expand `${VAR}` references and a leading `~`.
fn expand_path(value: &str) -> String {
    let expanded = expand_env_vars(value);
    if expanded == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.display().to_string();
        }
    } else if let Some(rest) = expanded
        .strip_prefix("~/")
        .or_else(|| expanded.strip_prefix("~\\"))
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest).display().to_string();
    }
    expanded
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
