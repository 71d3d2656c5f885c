//! Semantic version comparison and release-descriptor parsing.
//!
//! The actual HTTP fetch is platform-specific and lives in the
//! platform crate (`velario-windows::version_check`).

use serde::Deserialize;

/// A parsed `major.minor.patch` version. Ordering is component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Parses `"1.2.3"` or `"v1.2.3"`. Anything that is not exactly
    /// three numeric parts returns `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let parts: Vec<u32> = s.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
        if parts.len() != 3 {
            return None;
        }
        Some(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A published release, parsed from the GitHub releases endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// The raw tag, e.g. `"v1.0.4"`.
    pub tag: String,
    pub version: Version,
    /// Direct download URL of the first asset.
    pub download_url: String,
}

#[derive(Deserialize)]
struct ReleaseDoc {
    tag_name: String,
    #[serde(default)]
    assets: Vec<AssetDoc>,
}

#[derive(Deserialize)]
struct AssetDoc {
    browser_download_url: String,
}

/// Parses a GitHub release document.
///
/// A missing `tag_name`, a tag that is not a semantic version, or a
/// missing/empty `assets` list are all errors; the caller treats any
/// of them as a failed check.
pub fn parse_release(json: &str) -> Result<Release, String> {
    let doc: ReleaseDoc = serde_json::from_str(json).map_err(|e| format!("bad release descriptor: {e}"))?;

    let version = Version::parse(&doc.tag_name)
        .ok_or_else(|| format!("tag {:?} is not a semantic version", doc.tag_name))?;

    let asset = doc
        .assets
        .into_iter()
        .next()
        .ok_or("release has no downloadable assets")?;

    Ok(Release {
        tag: doc.tag_name,
        version,
        download_url: asset.browser_download_url,
    })
}

/// Returns the release if it is strictly newer than `local_version`.
pub fn check_for_update(json: &str, local_version: &str) -> Result<Option<Release>, String> {
    let release = parse_release(json)?;
    let local = Version::parse(local_version).ok_or("local version is malformed")?;
    if release.version > local {
        Ok(Some(release))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(tag: &str) -> String {
        format!(
            r#"{{"tag_name":"{tag}","assets":[{{"browser_download_url":"https://github.com/velario-app/velario/releases/download/{tag}/velario.exe"}}]}}"#
        )
    }

    #[test]
    fn parse_plain_and_prefixed() {
        assert_eq!(
            Version::parse("1.2.3"),
            Some(Version { major: 1, minor: 2, patch: 3 })
        );
        assert_eq!(Version::parse("v0.9.0"), Some(Version { major: 0, minor: 9, patch: 0 }));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(Version::parse("abc"), None);
        assert_eq!(Version::parse("1.0"), None);
        assert_eq!(Version::parse("1.0.0.0"), None);
        assert_eq!(Version::parse(""), None);
    }

    #[test]
    fn ordering_is_numeric_not_lexical() {
        let v = |s| Version::parse(s).unwrap();

        // Assert
        assert!(v("1.0.10") > v("1.0.9"));
        assert!(v("1.0.9") > v("1.0.1"));
        assert!(v("2.0.0") > v("1.9.9"));
        assert!(!(v("1.0.0") > v("1.0.0")));
    }

    #[test]
    fn release_parses_tag_and_asset() {
        let release = parse_release(&descriptor("v1.0.4")).unwrap();

        assert_eq!(release.tag, "v1.0.4");
        assert_eq!(release.version, Version { major: 1, minor: 0, patch: 4 });
        assert!(release.download_url.ends_with("velario.exe"));
    }

    #[test]
    fn missing_assets_is_an_error() {
        let json = r#"{"tag_name":"v1.0.4"}"#;
        assert!(parse_release(json).is_err());

        let json = r#"{"tag_name":"v1.0.4","assets":[]}"#;
        assert!(parse_release(json).is_err());
    }

    #[test]
    fn non_semantic_tag_is_an_error() {
        let json = r#"{"tag_name":"nightly","assets":[{"browser_download_url":"x"}]}"#;
        assert!(parse_release(json).is_err());
    }

    #[test]
    fn garbage_json_is_an_error_not_a_panic() {
        assert!(parse_release("not json").is_err());
        assert!(parse_release("{}").is_err());
    }

    #[test]
    fn newer_remote_is_an_update() {
        let found = check_for_update(&descriptor("v1.0.4"), "1.0.3").unwrap();
        assert_eq!(found.unwrap().tag, "v1.0.4");
    }

    #[test]
    fn same_remote_is_up_to_date() {
        assert_eq!(check_for_update(&descriptor("v1.0.3"), "1.0.3").unwrap(), None);
    }

    #[test]
    fn older_remote_is_up_to_date() {
        assert_eq!(check_for_update(&descriptor("v0.9.0"), "1.0.3").unwrap(), None);
    }
}
