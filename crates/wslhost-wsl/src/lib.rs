// # WSL Environment Source
//
// This crate provides an EnvironmentSource backed by `wsl.exe`.
//
// ## Commands
//
// - `wsl.exe -l -v`: distributions, their state and the default marker
// - `wsl.exe -d <name> -- hostname -I`: address of a running distribution
// - `wsl.exe -d <default> -- sh -c 'cat <alias file>'`: desired aliases
//
// ## Platform Support
//
// `wsl.exe` only exists on Windows hosts (and inside WSL via interop). On any
// other system every query fails with a query error, which the reconciler
// reports like any other unavailable source.
//
// Running a command inside a stopped distribution boots it, so callers must
// only resolve addresses of distributions reported as running.

pub mod parse;

use std::net::IpAddr;
use std::time::Duration;

use tokio::process::Command;
use wslhost_core::config::SourceConfig;
use wslhost_core::traits::{
    AliasSet, DefaultEnvironment, Environment, EnvironmentSource, EnvironmentSourceFactory,
};
use wslhost_core::{Error, Result, SourceRegistry};

pub use parse::DistroInfo;

/// Upper bound for a single `wsl.exe` invocation
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment source that shells out to `wsl.exe`
#[derive(Debug, Clone)]
pub struct WslSource {
    /// Path or name of the `wsl.exe` binary
    wsl_exe: String,

    /// Alias file path inside the default distribution
    alias_file: String,
}

impl WslSource {
    /// Create a new WSL source
    ///
    /// # Parameters
    ///
    /// - `wsl_exe`: `wsl.exe` binary, looked up on `PATH` if not absolute
    /// - `alias_file`: alias file inside the default distribution; a leading
    ///   `~/` is expanded by the distribution's shell
    pub fn new(wsl_exe: impl Into<String>, alias_file: impl Into<String>) -> Self {
        Self {
            wsl_exe: wsl_exe.into(),
            alias_file: alias_file.into(),
        }
    }

    /// List distributions as reported by `wsl.exe -l -v`
    pub async fn distros(&self) -> Result<Vec<DistroInfo>> {
        let stdout = self
            .exec(&["-l", "-v"])
            .await
            .map_err(|e| Error::query(format!("wsl.exe -l -v: {}", e)))?;
        Ok(parse::parse_distro_list(&parse::decode_output(&stdout)))
    }

    /// Run `wsl.exe` with `args` and return stdout
    ///
    /// Errors are plain messages; callers wrap them in the variant that fits.
    async fn exec(&self, args: &[&str]) -> std::result::Result<Vec<u8>, String> {
        tracing::trace!("Running {} {}", self.wsl_exe, args.join(" "));

        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            Command::new(&self.wsl_exe)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| format!("timed out after {:?}", COMMAND_TIMEOUT))?
        .map_err(|e| format!("failed to run {}: {}", self.wsl_exe, e))?;

        if !output.status.success() {
            let stderr = parse::decode_output(&output.stderr);
            return Err(format!("{}: {}", output.status, stderr.trim()));
        }

        Ok(output.stdout)
    }

    /// Shell snippet that prints the alias file
    fn cat_alias_file(&self) -> String {
        match self.alias_file.strip_prefix("~/") {
            Some(relative) => format!("cat \"$HOME\"/{}", shell_quote(relative)),
            None => format!("cat {}", shell_quote(&self.alias_file)),
        }
    }
}

/// Single-quote a string for `sh`
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[async_trait::async_trait]
impl EnvironmentSource for WslSource {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        let environments = self
            .distros()
            .await?
            .into_iter()
            .map(|distro| {
                if distro.running() {
                    Environment::running(distro.name)
                } else {
                    Environment::stopped(distro.name)
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!("wsl.exe reported {} distributions", environments.len());
        Ok(environments)
    }

    async fn address_of(&self, name: &str) -> Result<IpAddr> {
        let stdout = self
            .exec(&["-d", name, "--", "hostname", "-I"])
            .await
            .map_err(|e| Error::resolution(name, e))?;
        let text = parse::decode_output(&stdout);

        parse::parse_address(&text).ok_or_else(|| {
            Error::resolution(name, format!("hostname -I returned {:?}", text.trim()))
        })
    }

    async fn default_environment(&self) -> Result<DefaultEnvironment> {
        self.distros()
            .await?
            .into_iter()
            .find(|distro| distro.is_default)
            .map(|distro| DefaultEnvironment {
                running: distro.running(),
                name: distro.name,
            })
            .ok_or_else(|| Error::query("wsl.exe reports no default distribution"))
    }

    async fn desired_aliases(&self, default: &str) -> Result<AliasSet> {
        let script = self.cat_alias_file();
        let stdout = self
            .exec(&["-d", default, "--", "sh", "-c", &script])
            .await
            .map_err(|e| Error::query(format!("reading {}: {}", self.alias_file, e)))?;

        Ok(parse::parse_aliases(&parse::decode_output(&stdout)))
    }

    fn source_name(&self) -> &'static str {
        "wsl"
    }
}

/// Factory for creating WSL sources
pub struct WslSourceFactory;

impl EnvironmentSourceFactory for WslSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn EnvironmentSource>> {
        match config {
            SourceConfig::Wsl {
                wsl_exe,
                alias_file,
            } => Ok(Box::new(WslSource::new(wsl_exe.clone(), alias_file.clone()))),
            _ => Err(Error::config("Invalid config for WSL source")),
        }
    }
}

/// Register the WSL source with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_source("wsl", Box::new(WslSourceFactory));
}
