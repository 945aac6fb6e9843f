//! CLI handler for `plansync create-issue`.

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use plansync_core::IssueTracker;
use plansync_core::plan::{ItemType, TypeMapping};
use plansync_core::repo::resolve_repository;
use plansync_core::tracker::{CreateIssueInput, CreatedIssue, GhTracker};

use crate::config::PlansyncConfig;
use crate::type_cache;

pub struct IssueRequest {
    pub item_type: String,
    pub title: String,
    pub body: String,
}

pub async fn run_create_issue(
    config: &PlansyncConfig,
    request: &IssueRequest,
    owner: Option<&str>,
    repo: Option<&str>,
    dir: &Path,
) -> Result<()> {
    let mapping = TypeMapping::new(config.issue_types.clone()).with_discovered(type_cache::load(dir)?);
    let repository = resolve_repository(owner, repo, dir);
    let tracker = GhTracker::with_binary(config.gh_binary.clone(), repository);

    let issue = create_with(&tracker, &mapping, request).await?;
    match &issue.url {
        Some(url) => println!("Created #{}: {url}", issue.number),
        None => println!("Created #{}", issue.number),
    }
    Ok(())
}

/// Resolve the issue type id and create the issue on `tracker`.
pub async fn create_with(
    tracker: &dyn IssueTracker,
    mapping: &TypeMapping,
    request: &IssueRequest,
) -> Result<CreatedIssue> {
    let item_type: ItemType = request.item_type.parse()?;
    let issue_type = mapping.resolve(item_type.as_str()).ok_or_else(|| {
        anyhow!(
            "no issue type id for {:?}; run `plansync discover-types` or add it to [issue_types]",
            item_type.as_str()
        )
    })?;

    let repository_id = tracker
        .repository_id()
        .await
        .context("failed to resolve repository id")?;

    let input = CreateIssueInput {
        title: request.title.clone(),
        body: request.body.clone(),
        issue_type: issue_type.to_string(),
        repository_id,
    };
    tracker
        .create_issue(&input)
        .await
        .with_context(|| format!("failed to create issue {:?}", request.title))
}
