// # Hosts File Mapping Store
//
// MappingStore backed by a system hosts file.
//
// ## Ownership
//
// Only lines whose comment starts with the configured marker are managed.
// Every other line (comments, blank lines, foreign entries) is kept verbatim
// and in its original position.
//
// ## Line Format
//
// ```text
// 172.20.1.5 ubuntu2204.wsl # wsl2-host env=Ubuntu-22.04
// 172.20.1.5 myapp.local # wsl2-host alias=Ubuntu-22.04
// 172.20.1.9 legacy.wsl # wsl2-host
// ```
//
// A bare marker is read as an environment-owned entry with an unknown owner.
// A managed line listing several hostnames yields one entry per hostname.
//
// ## Commit
//
// - Atomic writes: the new file is written to `<path>.tmp`, then renamed
// - Backup: the previous file is copied to `<path>.backup` first
// - Line endings: CRLF is kept if the file used it
// - Managed entries are written after all preserved lines, sorted by hostname

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::mapping_store::{EntryTag, MappedEntry, MappingStore, MappingStoreFactory};

/// Longest hostname accepted (RFC 1035)
const MAX_HOSTNAME_LEN: usize = 253;

/// Hosts-file backed mapping store
///
/// Mutations are buffered in memory and written by [`MappingStore::commit`].
/// While no mutation is pending, every snapshot re-reads the file so edits
/// made between passes are picked up and preserved.
///
/// # Example
///
/// ```rust,no_run
/// use wslhost_core::store::HostsFileStore;
/// use wslhost_core::traits::MappingStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = HostsFileStore::open("/etc/hosts", "wsl2-host").await?;
///
///     for (hostname, entry) in store.current_entries().await? {
///         println!("{} -> {}", hostname, entry.address);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct HostsFileStore {
    path: PathBuf,
    marker: String,
    state: Arc<RwLock<HostsState>>,
}

/// In-memory view of the hosts file
#[derive(Debug, Default)]
struct HostsState {
    /// Unmanaged lines, verbatim, without line endings
    preserved: Vec<String>,
    /// Managed entries keyed by hostname
    managed: BTreeMap<String, MappedEntry>,
    /// Line ending to use when writing
    line_ending: &'static str,
    /// Whether there are uncommitted mutations
    dirty: bool,
}

impl HostsFileStore {
    /// Open a hosts file store
    ///
    /// A missing file is treated as empty and created on first commit.
    pub async fn open<P: AsRef<Path>>(path: P, marker: impl Into<String>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let marker = marker.into();

        if marker.is_empty() || marker.chars().any(char::is_whitespace) {
            return Err(Error::config(format!("Invalid hosts file marker {:?}", marker)));
        }

        let state = Self::load(&path, &marker).await?;
        tracing::debug!(
            "Loaded hosts file {}: {} managed entries, {} preserved lines",
            path.display(),
            state.managed.len(),
            state.preserved.len()
        );

        Ok(Self {
            path,
            marker,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Path of the hosts file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the hosts file
    async fn load(path: &Path, marker: &str) -> Result<HostsState, Error> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!("Hosts file does not exist: {}", path.display());
            return Ok(HostsState {
                line_ending: "\n",
                ..HostsState::default()
            });
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read hosts file {}: {}", path.display(), e))
        })?;

        Ok(parse_hosts(&content, marker))
    }

    /// Reload from disk unless mutations are pending
    async fn refresh(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            return Ok(());
        }

        let fresh = Self::load(&self.path, &self.marker).await?;
        let mut guard = self.state.write().await;
        // a mutation may have landed while the file was being read
        if !guard.dirty {
            *guard = fresh;
        }
        Ok(())
    }

    /// Write the hosts file atomically
    async fn write_file(&self, content: &str) -> Result<(), Error> {
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persist(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::persist(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::persist(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous file around
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup {}: {}", backup_path.display(), e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persist(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Hosts file written: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl MappingStore for HostsFileStore {
    async fn current_entries(&self) -> Result<BTreeMap<String, MappedEntry>, Error> {
        self.refresh().await?;
        Ok(self.state.read().await.managed.clone())
    }

    async fn add_entry(&self, entry: MappedEntry) -> Result<(), Error> {
        if !entry.tag.is_managed() {
            return Err(Error::write(format!(
                "Refusing to add unmanaged entry {}",
                entry.hostname
            )));
        }
        validate_hostname(&entry.hostname)?;

        let mut guard = self.state.write().await;
        if guard.managed.contains_key(&entry.hostname) {
            return Err(Error::write(format!("{} already exists", entry.hostname)));
        }
        guard.managed.insert(entry.hostname.clone(), entry);
        guard.dirty = true;
        Ok(())
    }

    async fn update_address(&self, hostname: &str, address: IpAddr) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        let entry = guard
            .managed
            .get_mut(hostname)
            .ok_or_else(|| Error::not_found(hostname))?;
        entry.address = address;
        guard.dirty = true;
        Ok(())
    }

    async fn remove_entry(&self, hostname: &str) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        if guard.managed.remove(hostname).is_none() {
            return Err(Error::not_found(hostname));
        }
        guard.dirty = true;
        Ok(())
    }

    async fn commit(&self) -> Result<(), Error> {
        let content = {
            let guard = self.state.read().await;
            if !guard.dirty {
                tracing::debug!("Hosts file unchanged, nothing to commit");
                return Ok(());
            }
            render_hosts(&guard, &self.marker)
        };

        self.write_file(&content).await?;
        self.state.write().await.dirty = false;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "hosts_file"
    }
}

/// Factory for creating hosts file stores
pub struct HostsFileStoreFactory;

#[async_trait]
impl MappingStoreFactory for HostsFileStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn MappingStore>, Error> {
        match serde_json::from_value::<StoreConfig>(config.clone())? {
            StoreConfig::HostsFile { path, marker } => {
                Ok(Box::new(HostsFileStore::open(path, marker).await?))
            }
            _ => Err(Error::config("Invalid config for hosts file store")),
        }
    }
}

/// Parse hosts file content into preserved lines and managed entries
fn parse_hosts(content: &str, marker: &str) -> HostsState {
    let line_ending = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut state = HostsState {
        line_ending,
        ..HostsState::default()
    };

    for line in content.lines() {
        match parse_managed_line(line, marker) {
            Some((address, hostnames, tag)) => {
                for hostname in hostnames {
                    if state.managed.contains_key(hostname) {
                        tracing::warn!("Duplicate managed hostname {}, keeping the first", hostname);
                        continue;
                    }
                    state.managed.insert(
                        hostname.to_string(),
                        MappedEntry::new(hostname, address, tag.clone()),
                    );
                }
            }
            None => state.preserved.push(line.to_string()),
        }
    }

    state
}

/// Parse a line carrying the marker; `None` for anything the store does not own
fn parse_managed_line<'a>(line: &'a str, marker: &str) -> Option<(IpAddr, Vec<&'a str>, EntryTag)> {
    let (data, comment) = line.split_once('#')?;
    let tag = parse_tag(comment, marker);
    if !tag.is_managed() {
        return None;
    }

    let mut tokens = data.split_whitespace();
    let address: IpAddr = tokens.next()?.parse().ok()?;
    let hostnames: Vec<&str> = tokens.collect();
    if hostnames.is_empty() {
        return None;
    }

    Some((address, hostnames, tag))
}

/// Classify a comment (text after `#`)
fn parse_tag(comment: &str, marker: &str) -> EntryTag {
    let comment = comment.trim();
    let Some(rest) = comment.strip_prefix(marker) else {
        return EntryTag::Unmanaged;
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        // marker is only a prefix of another token
        return EntryTag::Unmanaged;
    }

    let rest = rest.trim();
    if rest.is_empty() {
        EntryTag::environment("")
    } else if let Some(name) = rest.strip_prefix("env=") {
        EntryTag::environment(name.trim())
    } else if let Some(provenance) = rest.strip_prefix("alias=") {
        EntryTag::alias(provenance.trim())
    } else {
        EntryTag::Unmanaged
    }
}

/// Render the comment for a managed tag
fn format_tag(tag: &EntryTag, marker: &str) -> String {
    match tag {
        EntryTag::Environment { name } if name.is_empty() => marker.to_string(),
        EntryTag::Environment { name } => format!("{} env={}", marker, name),
        EntryTag::Alias { provenance } => format!("{} alias={}", marker, provenance),
        EntryTag::Unmanaged => String::new(),
    }
}

/// Render the full file
fn render_hosts(state: &HostsState, marker: &str) -> String {
    let mut lines: Vec<String> = state.preserved.clone();
    lines.extend(state.managed.values().map(|entry| {
        format!(
            "{} {} # {}",
            entry.address,
            entry.hostname,
            format_tag(&entry.tag, marker)
        )
    }));

    let mut content = lines.join(state.line_ending);
    content.push_str(state.line_ending);
    content
}

/// Check that a hostname can be written to a hosts file
fn validate_hostname(hostname: &str) -> Result<(), Error> {
    if hostname.is_empty() {
        return Err(Error::write("Hostname cannot be empty"));
    }

    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(Error::write(format!(
            "Hostname too long: {} chars (max {}). Got: {}",
            hostname.len(),
            MAX_HOSTNAME_LEN,
            hostname
        )));
    }

    for label in hostname.split('.') {
        if label.is_empty() {
            return Err(Error::write(format!("Hostname has empty label: '{}'", hostname)));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::write(format!(
                "Hostname label contains invalid characters. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
