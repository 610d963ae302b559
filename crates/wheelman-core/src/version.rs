//! Browser version string handling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A browser version as the installation reports it, e.g. `136.0.3240.64`.
///
/// The version is opaque once obtained; it is only ever spliced verbatim
/// into the driver download URL. Construction validates the shape so stray
/// subprocess output never reaches a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrowserVersion(String);

impl BrowserVersion {
    /// Parse a dot-separated numeric version string. Leading/trailing
    /// whitespace is tolerated; anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let numeric = trimmed
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
        numeric.then(|| Self(trimmed.to_string()))
    }

    /// Scan arbitrary command output for the first version-shaped token
    /// with at least two components. Handles `wmic` (`Version=136.0.…`),
    /// `reg query` (`version    REG_SZ    136.0.…`), and `--version`
    /// (`Microsoft Edge 136.0.…`) output alike.
    pub fn scan(output: &str) -> Option<Self> {
        output
            .split(|c: char| c.is_whitespace() || c == '=')
            .filter_map(Self::parse)
            .find(|v| v.0.contains('.'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let v = BrowserVersion::parse("136.0.3240.64").unwrap();
        assert_eq!(v.as_str(), "136.0.3240.64");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let v = BrowserVersion::parse("  137.0.0.1\r\n").unwrap();
        assert_eq!(v.as_str(), "137.0.0.1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BrowserVersion::parse("").is_none());
        assert!(BrowserVersion::parse("latest").is_none());
        assert!(BrowserVersion::parse("136.0a.1").is_none());
        assert!(BrowserVersion::parse("136..1").is_none());
        assert!(BrowserVersion::parse("<html>error</html>").is_none());
    }

    #[test]
    fn test_scan_wmic_output() {
        let out = "Version=136.0.3240.64\r\n\r\n";
        assert_eq!(BrowserVersion::scan(out).unwrap().as_str(), "136.0.3240.64");
    }

    #[test]
    fn test_scan_reg_query_output() {
        let out = "HKEY_CURRENT_USER\\Software\\Microsoft\\Edge\\BLBeacon\r\n    version    REG_SZ    136.0.3240.64\r\n";
        assert_eq!(BrowserVersion::scan(out).unwrap().as_str(), "136.0.3240.64");
    }

    #[test]
    fn test_scan_version_flag_output() {
        let out = "Microsoft Edge 136.0.3240.64";
        assert_eq!(BrowserVersion::scan(out).unwrap().as_str(), "136.0.3240.64");
    }

    #[test]
    fn test_scan_skips_bare_integers() {
        // A lone number is not version-shaped enough to trust.
        assert!(BrowserVersion::scan("exit code 0").is_none());
    }
}
