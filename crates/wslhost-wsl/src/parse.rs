//! Parsers for `wsl.exe` output
//!
//! Kept free of I/O so they can be tested on any platform.

use std::net::IpAddr;

use wslhost_core::traits::AliasSet;

/// One row of `wsl.exe -l -v`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroInfo {
    /// Distribution name
    pub name: String,
    /// Raw state column (Running, Stopped, Installing, ...)
    pub state: String,
    /// WSL version (1 or 2), 0 when the column is missing
    pub version: u8,
    /// Whether this is the default distribution
    pub is_default: bool,
}

impl DistroInfo {
    /// Only "Running" counts; transitional states are treated as stopped
    pub fn running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Decode raw `wsl.exe` output
///
/// `wsl.exe` writes UTF-16LE unless `WSL_UTF8=1` is set, in which case the
/// output is UTF-8. Commands run inside a distribution always write UTF-8.
pub fn decode_output(bytes: &[u8]) -> String {
    let looks_utf16 = bytes.starts_with(&[0xFF, 0xFE])
        || (bytes.len() >= 2 && bytes.len() % 2 == 0 && bytes[1] == 0);

    let text = if looks_utf16 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    text.trim_start_matches('\u{feff}').replace('\0', "")
}

/// Parse the table printed by `wsl.exe -l -v`
///
/// ```text
///   NAME            STATE           VERSION
/// * Ubuntu-18.04    Running         2
///   Debian          Stopped         2
/// ```
///
/// The header row is localized, so the first non-empty line is skipped
/// without looking at it.
pub fn parse_distro_list(output: &str) -> Vec<DistroInfo> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(parse_distro_row)
        .collect()
}

fn parse_distro_row(line: &str) -> Option<DistroInfo> {
    let line = line.trim();
    let (is_default, rest) = match line.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    // Names cannot contain whitespace; state and version are the last columns
    let mut columns: Vec<&str> = rest.split_whitespace().collect();
    if columns.len() < 2 {
        return None;
    }

    let version = match columns.last().and_then(|v| v.parse::<u8>().ok()) {
        Some(version) => {
            columns.pop();
            version
        }
        None => 0,
    };
    if columns.len() < 2 {
        return None;
    }

    Some(DistroInfo {
        name: columns[0].to_string(),
        state: columns[1..].join(" "),
        version,
        is_default,
    })
}

/// First address printed by `hostname -I`
pub fn parse_address(output: &str) -> Option<IpAddr> {
    output.split_whitespace().next()?.parse().ok()
}

/// Parse an alias file: whitespace-separated hostnames, `#` starts a comment
pub fn parse_aliases(content: &str) -> AliasSet {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(data, _)| data))
        .flat_map(str::split_whitespace)
        .map(|alias| alias.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    const LISTING: &str = "  NAME            STATE           VERSION\r\n\
                           * Ubuntu-18.04    Running         2\r\n  \
                           Debian          Stopped         2\r\n  \
                           docker-desktop  Installing      2\r\n";

    #[test]
    fn test_decode_utf16() {
        let decoded = decode_output(&utf16le(LISTING));
        assert_eq!(decoded, LISTING);
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_output(b"172.20.1.5 \n"), "172.20.1.5 \n");
    }

    #[test]
    fn test_parse_distro_list() {
        let distros = parse_distro_list(LISTING);
        assert_eq!(distros.len(), 3);

        assert_eq!(distros[0].name, "Ubuntu-18.04");
        assert!(distros[0].is_default);
        assert!(distros[0].running());
        assert_eq!(distros[0].version, 2);

        assert_eq!(distros[1].name, "Debian");
        assert!(!distros[1].is_default);
        assert!(!distros[1].running());

        assert_eq!(distros[2].state, "Installing");
        assert!(!distros[2].running());
    }

    #[test]
    fn test_parse_distro_list_without_distros() {
        assert!(parse_distro_list("  NAME   STATE   VERSION\n").is_empty());
        assert!(parse_distro_list("").is_empty());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("172.20.1.5 172.17.0.1 \n"),
            Some("172.20.1.5".parse().unwrap())
        );
        assert_eq!(parse_address("  \n"), None);
        assert_eq!(parse_address("garbage"), None);
    }

    #[test]
    fn test_parse_aliases() {
        let aliases = parse_aliases(
            "# aliases for the default distro\n\
             myapp.local api.local\n\
             \n\
             Admin.Local # upper case is folded\n",
        );
        let expected: AliasSet = ["myapp.local", "api.local", "admin.local"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(aliases, expected);
    }
}
