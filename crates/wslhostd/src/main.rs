// # wslhostd - WSL hosts-file daemon
//
// This daemon is a thin integration layer. All reconciliation logic lives in
// wslhost-core; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Registers the WSL source and the built-in stores
// 4. Runs one reconciliation pass, or keeps reconciling on an interval
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `WSLHOST_HOSTS_PATH`: hosts file to manage
//   (default: `C:\Windows\System32\drivers\etc\hosts`)
// - `WSLHOST_MARKER`: comment token marking managed lines (default: `wsl2-host`)
// - `WSLHOST_SUFFIX`: suffix for derived hostnames (default: `.wsl`)
// - `WSLHOST_WSL_EXE`: `wsl.exe` binary (default: `wsl.exe`)
// - `WSLHOST_ALIAS_FILE`: alias file inside the default distribution
//   (default: `~/.wsl2hosts`)
// - `WSLHOST_STRICT_RESOLUTION`: fail the pass when a new distribution cannot
//   be resolved (default: false)
// - `WSLHOST_INTERVAL_SECS`: seconds between passes; unset or 0 runs once
// - `WSLHOST_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export WSLHOST_INTERVAL_SECS=30
// export WSLHOST_LOG_LEVEL=debug
//
// wslhostd
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use wslhost_core::{
    Reconciler, ReconcilerConfig, SourceConfig, SourceRegistry, StoreConfig, WslHostConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Longest accepted interval between passes
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Exit codes for different termination scenarios
///
/// - 0: Clean exit (pass succeeded, or loop stopped by a signal)
/// - 1: Configuration or startup error
/// - 2: Runtime error (the single pass failed)
#[derive(Debug, Clone, Copy)]
enum WslHostExitCode {
    /// Clean exit
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<WslHostExitCode> for ExitCode {
    fn from(code: WslHostExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    hosts_path: Option<String>,
    marker: Option<String>,
    suffix: Option<String>,
    wsl_exe: Option<String>,
    alias_file: Option<String>,
    strict_resolution: bool,
    interval_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            hosts_path: env::var("WSLHOST_HOSTS_PATH").ok(),
            marker: env::var("WSLHOST_MARKER").ok(),
            suffix: env::var("WSLHOST_SUFFIX").ok(),
            wsl_exe: env::var("WSLHOST_WSL_EXE").ok(),
            alias_file: env::var("WSLHOST_ALIAS_FILE").ok(),
            strict_resolution: match env::var("WSLHOST_STRICT_RESOLUTION") {
                Ok(value) => parse_bool(&value).with_context(|| {
                    format!("WSLHOST_STRICT_RESOLUTION must be true or false. Got: {}", value)
                })?,
                Err(_) => false,
            },
            interval_secs: match env::var("WSLHOST_INTERVAL_SECS") {
                Ok(value) => value.trim().parse().with_context(|| {
                    format!("WSLHOST_INTERVAL_SECS must be a whole number. Got: {}", value)
                })?,
                Err(_) => 0,
            },
            log_level: env::var("WSLHOST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Library-level rules (marker, suffix, paths) are checked again by
    /// `WslHostConfig::validate`; this covers what only the daemon knows.
    fn validate(&self) -> Result<()> {
        if self.interval_secs > MAX_INTERVAL_SECS {
            anyhow::bail!(
                "WSLHOST_INTERVAL_SECS must be at most {} seconds. Got: {}",
                MAX_INTERVAL_SECS,
                self.interval_secs
            );
        }

        if let Some(ref path) = self.hosts_path
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "WSLHOST_HOSTS_PATH parent directory does not exist: {}",
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "WSLHOST_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_wslhost_config()
            .validate()
            .context("Invalid wslhost configuration")?;

        Ok(())
    }

    /// Build the library configuration, filling unset values with defaults
    fn to_wslhost_config(&self) -> WslHostConfig {
        let mut config = WslHostConfig::default();

        if let SourceConfig::Wsl {
            wsl_exe,
            alias_file,
        } = &mut config.source
        {
            if let Some(ref value) = self.wsl_exe {
                *wsl_exe = value.clone();
            }
            if let Some(ref value) = self.alias_file {
                *alias_file = value.clone();
            }
        }

        if let StoreConfig::HostsFile { path, marker } = &mut config.store {
            if let Some(ref value) = self.hosts_path {
                *path = value.clone();
            }
            if let Some(ref value) = self.marker {
                *marker = value.clone();
            }
        }

        let mut reconciler = ReconcilerConfig::default().with_strict_resolution(self.strict_resolution);
        if let Some(ref suffix) = self.suffix {
            reconciler = reconciler.with_suffix(suffix.clone());
        }
        config.reconciler = reconciler;

        config
    }

    fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

/// Parse a boolean environment value
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return WslHostExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return WslHostExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WslHostExitCode::ConfigError.into();
    }

    info!("Starting wslhostd");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WslHostExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> WslHostExitCode {
    let reconciler = match build_reconciler(&config).await {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return WslHostExitCode::ConfigError;
        }
    };

    let Some(interval) = config.interval() else {
        return match reconciler.run_pass().await {
            Ok(report) => {
                info!(
                    "Pass complete: {} environment(s), {} change(s) applied, {} failed, committed={}",
                    report.environments,
                    report.applied().count(),
                    report.failed_count(),
                    report.committed
                );
                WslHostExitCode::CleanShutdown
            }
            Err(e) => {
                error!("{}", e.display_chain());
                WslHostExitCode::RuntimeError
            }
        };
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    match reconciler.run_with_shutdown(interval, shutdown_rx).await {
        Ok(()) => {
            info!("Shutting down");
            WslHostExitCode::CleanShutdown
        }
        Err(e) => {
            error!("{}", e.display_chain());
            WslHostExitCode::RuntimeError
        }
    }
}

/// Register factories and construct the reconciler from configuration
async fn build_reconciler(config: &Config) -> Result<Reconciler> {
    let wslhost_config = config.to_wslhost_config();

    let registry = SourceRegistry::with_builtin_stores();
    wslhost_wsl::register(&registry);

    info!("Environment source: {}", wslhost_config.source.type_name());
    info!("Mapping store: {}", wslhost_config.store.type_name());

    let source = registry.create_source(&wslhost_config.source)?;
    let store = registry.create_store(&wslhost_config.store).await?;

    Ok(Reconciler::new(source, store, wslhost_config.reconciler)?)
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("CTRL-C")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            hosts_path: None,
            marker: None,
            suffix: None,
            wsl_exe: None,
            alias_file: None,
            strict_resolution: false,
            interval_secs: 0,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), None);
    }

    #[test]
    fn test_overrides_reach_library_config() {
        let config = Config {
            hosts_path: Some("hosts".to_string()),
            marker: Some("my-marker".to_string()),
            suffix: Some(".local".to_string()),
            wsl_exe: Some("/mnt/c/Windows/System32/wsl.exe".to_string()),
            strict_resolution: true,
            interval_secs: 30,
            ..config()
        };
        let lib = config.to_wslhost_config();

        assert!(matches!(
            &lib.store,
            StoreConfig::HostsFile { path, marker } if path == "hosts" && marker == "my-marker"
        ));
        assert!(matches!(
            &lib.source,
            SourceConfig::Wsl { wsl_exe, alias_file }
                if wsl_exe == "/mnt/c/Windows/System32/wsl.exe" && alias_file == "~/.wsl2hosts"
        ));
        assert_eq!(lib.reconciler.suffix, ".local");
        assert!(lib.reconciler.strict_resolution);
        assert_eq!(config.interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_marker = Config {
            marker: Some("two words".to_string()),
            ..config()
        };
        assert!(bad_marker.validate().is_err());

        let bad_level = Config {
            log_level: "verbose".to_string(),
            ..config()
        };
        assert!(bad_level.validate().is_err());

        let bad_interval = Config {
            interval_secs: MAX_INTERVAL_SECS + 1,
            ..config()
        };
        assert!(bad_interval.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
