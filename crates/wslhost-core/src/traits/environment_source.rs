// # Environment Source Trait
//
// Defines the interface for enumerating environments and their live state.
//
// ## Implementations
//
// - WSL: `wslhost-wsl` crate (`wsl.exe -l -v`, `hostname -I`, alias file)
// - Tests and demos: static in-memory sources
//
// ## Usage
//
// ```rust,ignore
// use wslhost_core::EnvironmentSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* EnvironmentSource implementation */;
//
//     for env in source.list_environments().await? {
//         if env.running {
//             println!("{} -> {}", env.name, source.address_of(&env.name).await?);
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Desired alias hostnames, membership only
pub type AliasSet = BTreeSet<String>;

/// A named environment as seen during one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name, unique among currently known environments
    pub name: String,
    /// Whether the environment is running
    pub running: bool,
    /// Address already known to the source, if any
    ///
    /// When `None` the reconciler asks [`EnvironmentSource::address_of`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
}

impl Environment {
    /// A running environment whose address must be resolved on demand
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: true,
            address: None,
        }
    }

    /// A stopped environment
    pub fn stopped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: false,
            address: None,
        }
    }

    /// Attach a pre-resolved address
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }
}

/// The environment aliases resolve to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultEnvironment {
    /// Environment name
    pub name: String,
    /// Whether the environment is running
    pub running: bool,
}

/// Trait for environment source implementations
///
/// A source is an observer: it reports what exists and how to reach it. It
/// never decides what the mapping store should contain.
///
/// # Errors
///
/// - Enumeration failures are reported as [`Error::Query`](crate::Error::Query)
/// - Address lookups that fail are reported as
///   [`Error::Resolution`](crate::Error::Resolution)
///
/// Whether a given failure is fatal is decided by the reconciler, not here.
#[async_trait]
pub trait EnvironmentSource: Send + Sync {
    /// List every known environment with its running state
    async fn list_environments(&self) -> Result<Vec<Environment>, crate::Error>;

    /// Resolve the current address of a running environment
    async fn address_of(&self, name: &str) -> Result<IpAddr, crate::Error>;

    /// Get the default environment
    async fn default_environment(&self) -> Result<DefaultEnvironment, crate::Error>;

    /// Get the alias hostnames that should point at the default environment
    ///
    /// `default` is the name [`EnvironmentSource::default_environment`]
    /// reported earlier in the same pass, so sources that keep the alias list
    /// inside the default environment need not look it up again.
    async fn desired_aliases(&self, default: &str) -> Result<AliasSet, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing environment sources from configuration
pub trait EnvironmentSourceFactory: Send + Sync {
    /// Create an EnvironmentSource instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn EnvironmentSource>, crate::Error>;
}
