//! Hostname derivation for environment names
//!
//! `Ubuntu-18.04` becomes `ubuntu1804.wsl`: the name is lowercased, every run
//! of characters outside `[a-z0-9]` is deleted, and the suffix is appended.

/// Suffix appended to derived hostnames unless configured otherwise
pub const DEFAULT_SUFFIX: &str = ".wsl";

/// Derive the managed hostname for an environment name
///
/// Total and deterministic: any input, including the empty string, yields
/// `<lowercase alphanumerics><suffix>`.
///
/// # Example
///
/// ```rust
/// use wslhost_core::hostname::{derive_hostname, DEFAULT_SUFFIX};
///
/// assert_eq!(derive_hostname("Ubuntu-18.04", DEFAULT_SUFFIX), "ubuntu1804.wsl");
/// ```
pub fn derive_hostname(name: &str, suffix: &str) -> String {
    let mut hostname: String = name
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    hostname.push_str(suffix);
    hostname
}
