//! Configuration types for the wslhost system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::hostname::DEFAULT_SUFFIX;

/// Hosts file comment token that marks tool-managed lines
pub const DEFAULT_MARKER: &str = "wsl2-host";

/// Main wslhost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WslHostConfig {
    /// Environment source configuration
    pub source: SourceConfig,

    /// Mapping store configuration
    pub store: StoreConfig,

    /// Optional reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl WslHostConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            source: SourceConfig::default(),
            store: StoreConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.source.validate()?;
        self.store.validate()?;
        self.reconciler.validate()?;

        Ok(())
    }
}

impl Default for WslHostConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// WSL distributions queried through `wsl.exe`
    Wsl {
        /// Path or name of the `wsl.exe` executable
        #[serde(default = "default_wsl_exe")]
        wsl_exe: String,
        /// Alias file, read inside the default distribution
        #[serde(default = "default_alias_file")]
        alias_file: String,
    },

    /// Custom environment source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Wsl {
                wsl_exe,
                alias_file,
            } => {
                if wsl_exe.trim().is_empty() {
                    return Err(crate::Error::config("WSL executable cannot be empty"));
                }
                if alias_file.trim().is_empty() {
                    return Err(crate::Error::config("WSL alias file cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom environment source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom environment source config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Wsl { .. } => "wsl",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Wsl {
            wsl_exe: default_wsl_exe(),
            alias_file: default_alias_file(),
        }
    }
}

/// Mapping store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Hosts file store
    HostsFile {
        /// Path to the hosts file
        #[serde(default = "default_hosts_path")]
        path: String,
        /// Comment token identifying managed lines
        #[serde(default = "default_marker")]
        marker: String,
    },

    /// In-memory store (not persistent)
    Memory,

    /// Custom mapping store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::HostsFile { path, marker } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Hosts file path cannot be empty"));
                }
                if marker.is_empty() || marker.chars().any(char::is_whitespace) {
                    return Err(crate::Error::config(format!(
                        "Hosts file marker must be a single non-empty token, got {:?}",
                        marker
                    )));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom mapping store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom mapping store config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::HostsFile { .. } => "hosts_file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::HostsFile {
            path: default_hosts_path(),
            marker: default_marker(),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Suffix appended to derived hostnames
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Treat an unresolvable address as fatal when adding a new entry
    ///
    /// An unresolvable address is always fatal when an existing entry has to
    /// be compared. With this off (the default) a running environment that
    /// has no entry yet and cannot be resolved is skipped for the pass.
    #[serde(default)]
    pub strict_resolution: bool,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.suffix.chars().any(|c| c.is_whitespace() || c == '#') {
            return Err(crate::Error::config(format!(
                "Hostname suffix cannot contain whitespace or '#', got {:?}",
                self.suffix
            )));
        }
        Ok(())
    }

    /// Set the hostname suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Enable or disable strict resolution
    pub fn with_strict_resolution(mut self, strict: bool) -> Self {
        self.strict_resolution = strict;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            strict_resolution: false,
        }
    }
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_wsl_exe() -> String {
    "wsl.exe".to_string()
}

fn default_alias_file() -> String {
    "~/.wsl2hosts".to_string()
}

fn default_hosts_path() -> String {
    r"C:\Windows\System32\drivers\etc\hosts".to_string()
}
