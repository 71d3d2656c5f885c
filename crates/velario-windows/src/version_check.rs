//! Checks GitHub for a newer release of velario.
//!
//! Thin HTTP wrapper around the parsing and comparison logic in
//! [`velario_core::version`].

use velario_core::version::{self, Release};

use crate::http;

const GITHUB_HOST: &str = "api.github.com";
const RELEASES_PATH: &str = "/repos/velario-app/velario/releases/latest";
const TIMEOUT_MS: i32 = 5000;

/// Fetches the latest release descriptor and compares it against the
/// running binary.
///
/// Returns `Ok(Some(release))` when a strictly newer version exists,
/// `Ok(None)` when up to date, and `Err` on network errors or a
/// malformed descriptor (both count as a failed check).
pub fn check_for_update() -> Result<Option<Release>, String> {
    let body = http::get(GITHUB_HOST, RELEASES_PATH, TIMEOUT_MS)?;
    version::check_for_update(&body, env!("CARGO_PKG_VERSION"))
}
