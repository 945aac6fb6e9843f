//! CLI handler for `plansync sync`.

use std::path::Path;

use anyhow::{Context, Result};

use plansync_core::plan::PlanStore;
use plansync_core::sync::{DryRunReport, PlannedAction};
use plansync_core::tracker::GhTracker;
use plansync_core::{CreationResult, FixedDelay, IssueTracker, SyncEngine};

use crate::config::PlansyncConfig;

/// Synchronize `plan_path` against the repository it names.
///
/// Returns `false` when any item failed so the caller can exit non-zero.
pub async fn run_sync(config: &PlansyncConfig, plan_path: &Path, dry_run: bool) -> Result<bool> {
    let store = PlanStore::new(plan_path);
    let plan = store
        .load()
        .with_context(|| format!("cannot sync {}", plan_path.display()))?;

    let tracker = GhTracker::with_binary(config.gh_binary.clone(), plan.project.repository.clone());
    println!(
        "Syncing {} ({} items) to {}",
        plan.project.name,
        plan.items.len(),
        plan.project.repository
    );

    sync_with(&tracker, config, &store, dry_run).await
}

/// Run against an arbitrary tracker. Split out so the report path can be
/// exercised without `gh`.
pub async fn sync_with(
    tracker: &dyn IssueTracker,
    config: &PlansyncConfig,
    store: &PlanStore,
    dry_run: bool,
) -> Result<bool> {
    let engine = SyncEngine::new(tracker, FixedDelay::from_millis(config.rate_limit_ms));

    if dry_run {
        let report = engine.dry_run(store).await?;
        print!("{}", render_dry_run(&report));
        return Ok(true);
    }

    let result = engine.run(store).await?;
    print!("{}", render_result(&result, store));
    Ok(result.is_success())
}

// -----------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------

fn render_result(result: &CreationResult, store: &PlanStore) -> String {
    let mut out = String::new();
    out.push_str(&format!("Created: {}\n", result.created));
    out.push_str(&format!("Skipped: {}\n", result.skipped));
    out.push_str(&format!("Failed:  {}\n", result.failed));

    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &result.errors {
            out.push_str(&format!("  - {error}\n"));
        }
    }

    out.push_str(&format!(
        "\nPlan updated: {} (backup at {})\n",
        store.path().display(),
        store.backup_path().display()
    ));
    out
}

fn render_dry_run(report: &DryRunReport) -> String {
    let mut out = String::from("Dry run; nothing will be created.\n");
    for level in &report.levels {
        out.push_str(&format!("\nLevel {}:\n", level.depth));
        for issue in &level.issues {
            let marker = match issue.action {
                PlannedAction::Skip(n) => format!("skip   #{n}"),
                PlannedAction::Exists(n) => format!("exists #{n}"),
                PlannedAction::Create => "create".to_string(),
            };
            out.push_str(&format!(
                "  [{marker}] {} ({}): {}\n",
                issue.id, issue.item_type, issue.title
            ));
        }
    }

    let create = report.count(|a| *a == PlannedAction::Create);
    let skip = report.count(|a| matches!(a, PlannedAction::Skip(_)));
    let exists = report.count(|a| matches!(a, PlannedAction::Exists(_)));
    out.push_str(&format!(
        "\nWould create {create}, skip {skip}; {exists} title(s) already exist on the tracker.\n"
    ));
    out
}
