//! Version extraction and comparison for tool probes and template compatibility

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

static VERSION_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid version regex"));

/// Pull the first `N[.N[.N]]` run out of tool output and pad it to three parts
///
/// `"Xcode 15.2\nBuild version 15C500b"` yields `15.2.0`,
/// `"Python 3.11.4"` yields `3.11.4`.
pub fn extract_version(output: &str) -> Option<Version> {
    let caps = VERSION_RUN.captures(output)?;
    let part = |i: usize| -> Option<u64> {
        caps.get(i)
            .map(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(Some(0))
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Parse a user- or manifest-supplied version, tolerating a leading `v` and
/// missing minor/patch components
pub fn parse_version(version_str: &str) -> Option<Version> {
    let cleaned = version_str.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned)
        .ok()
        .or_else(|| extract_version(cleaned))
}

/// Compare CLI version against template version
/// Returns a warning message if the CLI is older than the template expects
pub fn check_compatibility(cli_version: &str, template_version: &str) -> Option<String> {
    let cli_ver = parse_version(cli_version)?;
    let template_ver = parse_version(template_version)?;

    if cli_ver < template_ver {
        Some(format!(
            "This template set was designed for mobile-deploy {} or newer; you are running {}",
            template_version, cli_version
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_tool_banners() {
        assert_eq!(extract_version("Python 3.11.4"), Some(Version::new(3, 11, 4)));
        assert_eq!(
            extract_version("Xcode 15.2\nBuild version 15C500b"),
            Some(Version::new(15, 2, 0))
        );
        assert_eq!(extract_version("2.5.1\n"), Some(Version::new(2, 5, 1)));
        assert_eq!(extract_version("v20"), Some(Version::new(20, 0, 0)));
        assert_eq!(extract_version("no digits here"), None);
    }

    #[test]
    fn test_comparison_is_semantic_not_lexicographic() {
        let found = extract_version("Python 3.10.0").unwrap();
        let floor = parse_version("3.8").unwrap();
        assert!(found >= floor);
        assert!("3.10.0" < "3.8.0");
    }

    #[test]
    fn test_cli_older_than_template() {
        let warning = check_compatibility("0.1.0", "0.2.0");
        assert!(warning.is_some());
        assert!(warning.unwrap().contains("0.2.0"));
    }

    #[test]
    fn test_cli_same_or_newer_than_template() {
        assert!(check_compatibility("0.1.0", "0.1.0").is_none());
        assert!(check_compatibility("0.2.0", "0.1.0").is_none());
    }

    #[test]
    fn test_invalid_versions() {
        assert!(check_compatibility("invalid", "0.1.0").is_none());
    }
}
