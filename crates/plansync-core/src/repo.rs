//! Repository coordinate detection from the local git checkout.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::plan::model::Repository;

/// Placeholder coordinates used when nothing better is known.
pub const FALLBACK_OWNER: &str = "owner";
pub const FALLBACK_NAME: &str = "repo";

static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[:/]([^/]+?)/([^/]+?)(?:\.git)?/?$").expect("valid remote url regex")
});

/// Extract owner and name from a GitHub remote URL (HTTPS or SSH form).
pub fn parse_remote_url(url: &str) -> Option<Repository> {
    let caps = REMOTE_RE.captures(url.trim())?;
    Some(Repository::new(&caps[1], &caps[2]))
}

/// Read `origin` of the checkout at `dir`.
pub fn detect_repository(dir: &Path) -> Option<Repository> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;
    if !output.status.success() {
        debug!(dir = %dir.display(), "no origin remote");
        return None;
    }
    parse_remote_url(&String::from_utf8_lossy(&output.stdout))
}

/// Combine explicit coordinates with detection.
///
/// Explicit values win. Anything still missing comes from the `origin`
/// remote of `dir`, then from the placeholders.
pub fn resolve_repository(owner: Option<&str>, name: Option<&str>, dir: &Path) -> Repository {
    if let (Some(owner), Some(name)) = (owner, name) {
        return Repository::new(owner, name);
    }
    let detected = detect_repository(dir);
    let owner = owner
        .map(str::to_owned)
        .or_else(|| detected.as_ref().map(|r| r.owner.clone()))
        .unwrap_or_else(|| FALLBACK_OWNER.to_owned());
    let name = name
        .map(str::to_owned)
        .or_else(|| detected.map(|r| r.name))
        .unwrap_or_else(|| FALLBACK_NAME.to_owned());
    Repository::new(owner, name)
}
