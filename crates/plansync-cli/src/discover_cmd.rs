//! CLI handler for `plansync discover-types`.

use std::path::Path;

use anyhow::{Context, Result};

use plansync_core::IssueTracker;
use plansync_core::repo::resolve_repository;
use plansync_core::tracker::{GhTracker, IssueTypeMap, normalize_type_name, templates_to_type_map};

use crate::config::PlansyncConfig;
use crate::type_cache;

pub async fn run_discover(
    config: &PlansyncConfig,
    owner: Option<&str>,
    repo: Option<&str>,
    dir: &Path,
) -> Result<()> {
    let repository = resolve_repository(owner, repo, dir);
    println!("Discovering issue types for {repository}...");

    let tracker = GhTracker::with_binary(config.gh_binary.clone(), repository);
    let map = discover_with(&tracker, dir).await?;

    if map.is_empty() {
        println!("No issue types are configured for this repository.");
    }
    Ok(())
}

/// Query templates, print the mapping, and write the cache under `dir`.
pub async fn discover_with(tracker: &dyn IssueTracker, dir: &Path) -> Result<IssueTypeMap> {
    let templates = tracker
        .discover_issue_types()
        .await
        .context("failed to discover issue types")?;

    for template in &templates {
        let semantic = normalize_type_name(&template.name).unwrap_or_else(|| "-".to_string());
        println!("  {:<24} -> {:<10} {}", template.name, semantic, template.id);
    }

    let map = templates_to_type_map(&templates);
    let path = type_cache::save(dir, &map)?;
    println!("Cached {} type mapping(s) at {}", map.len(), path.display());
    Ok(map)
}
