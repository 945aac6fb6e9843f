//! Level-ordered, batched issue creation.
//!
//! A run walks the plan root-first. Items that already carry an issue number
//! are skipped, so an interrupted run can simply be started again.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimitPolicy;
use super::relationships::link_relationships;
use crate::plan::levels::{Level, ScheduleError, schedule_levels};
use crate::plan::model::{CreationResult, ImplementationPlan, PlanItem};
use crate::plan::store::{PlanStore, PlanStoreError};
use crate::plan::validate::{TypeMapping, ValidationError, validate_issue_types, validate_structure};
use crate::tracker::{CreateIssueInput, IssueTracker, IssueTypeMap, templates_to_type_map};

/// Items per aliased batch call.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Failures that abort a run before anything is created.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load plan: {0}")]
    Load(#[source] PlanStoreError),

    #[error("plan validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("plan scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("failed to back up plan: {0}")]
    Backup(#[source] PlanStoreError),

    #[error("failed to resolve repository id: {0:#}")]
    Repository(#[source] anyhow::Error),
}

/// What a dry run would do with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Already carries this issue number.
    Skip(u64),
    /// An issue with the same title exists on the tracker.
    Exists(u64),
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedIssue {
    pub id: String,
    pub title: String,
    pub item_type: String,
    pub action: PlannedAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLevel {
    pub depth: usize,
    pub issues: Vec<PlannedIssue>,
}

/// Preview of a run. Nothing is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunReport {
    pub levels: Vec<PlannedLevel>,
}

impl DryRunReport {
    pub fn count(&self, pred: impl Fn(&PlannedAction) -> bool) -> usize {
        self.levels
            .iter()
            .flat_map(|level| &level.issues)
            .filter(|issue| pred(&issue.action))
            .count()
    }
}

/// Render the issue body for `item`.
///
/// Description first, then a `## Metadata` list when metadata is present,
/// then a footer naming the plan item id.
pub fn format_issue_body(item: &PlanItem) -> String {
    let mut sections = Vec::new();

    let description = item.description.trim();
    if !description.is_empty() {
        sections.push(description.to_owned());
    }

    if !item.metadata.is_empty() {
        let lines: Vec<String> = item
            .metadata
            .iter()
            .map(|(key, value)| format!("- **{key}**: {}", metadata_value(value)))
            .collect();
        sections.push(format!("## Metadata\n\n{}", lines.join("\n")));
    }

    sections.push(format!(
        "---\n*Created by plansync*\n*Plan ID: {}*",
        item.id
    ));
    sections.join("\n\n")
}

fn metadata_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(values) => values.iter().map(metadata_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Drives one synchronization run against an injected tracker.
pub struct SyncEngine<'a> {
    tracker: &'a dyn IssueTracker,
    rate_limit: Box<dyn RateLimitPolicy>,
    batch_size: usize,
}

impl<'a> SyncEngine<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, rate_limit: impl RateLimitPolicy + 'static) -> Self {
        Self {
            tracker,
            rate_limit: Box::new(rate_limit),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the full pipeline against the plan document in `store`.
    ///
    /// Validation and scheduling failures abort before the backup is taken.
    /// Per-item and per-parent failures are collected into the result. The
    /// plan is written back even when some items failed.
    pub async fn run(&self, store: &PlanStore) -> Result<CreationResult, SyncError> {
        let mut plan = store.load().map_err(SyncError::Load)?;
        log_preassigned(&plan);

        let (levels, mapping) = self.prepare(&plan).await?;

        store.backup().map_err(SyncError::Backup)?;

        let repository_id = self
            .tracker
            .repository_id()
            .await
            .map_err(SyncError::Repository)?;

        let mut result = self.create_all(&mut plan, &levels, &mapping, &repository_id).await;

        link_relationships(self.tracker, &plan, &mut result.errors).await;

        if let Err(e) = store.save(&plan) {
            warn!(error = %e, "failed to write plan back");
            result.errors.push(format!("Failed to save plan: {e}"));
        }

        info!(
            created = result.created,
            skipped = result.skipped,
            failed = result.failed,
            errors = result.errors.len(),
            "sync complete"
        );
        Ok(result)
    }

    /// Validate and schedule, then report what a run would create.
    ///
    /// Titles of pending items are looked up on the tracker so existing
    /// issues can be flagged. The plan file is not touched.
    pub async fn dry_run(&self, store: &PlanStore) -> Result<DryRunReport, SyncError> {
        let plan = store.load().map_err(SyncError::Load)?;
        let (levels, _) = self.prepare(&plan).await?;

        let mut report = DryRunReport::default();
        for level in &levels {
            let mut issues = Vec::with_capacity(level.items.len());
            for &idx in &level.items {
                let item = &plan.items[idx];
                let action = match item.issue_number {
                    Some(number) => PlannedAction::Skip(number),
                    None => match self.tracker.find_existing_issue(&item.title).await {
                        Ok(Some(number)) => PlannedAction::Exists(number),
                        Ok(None) => PlannedAction::Create,
                        Err(e) => {
                            warn!(item = %item.id, error = %e, "duplicate lookup failed");
                            PlannedAction::Create
                        }
                    },
                };
                issues.push(PlannedIssue {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    item_type: item.item_type.clone(),
                    action,
                });
            }
            report.levels.push(PlannedLevel {
                depth: level.depth,
                issues,
            });
        }
        Ok(report)
    }

    /// Structural checks, level schedule, type discovery, type check.
    async fn prepare(&self, plan: &ImplementationPlan) -> Result<(Vec<Level>, TypeMapping), SyncError> {
        validate_structure(plan)?;
        let levels = schedule_levels(plan)?;

        let mapping = TypeMapping::from_plan(plan).with_discovered(self.discover_types().await);
        validate_issue_types(plan, &mapping)?;

        Ok((levels, mapping))
    }

    /// Best-effort live type table. `None` falls back to the plan's table.
    async fn discover_types(&self) -> Option<IssueTypeMap> {
        match self.tracker.discover_issue_types().await {
            Ok(templates) => {
                let map = templates_to_type_map(&templates);
                if map.is_empty() {
                    debug!("tracker reported no issue types");
                    None
                } else {
                    info!(types = map.len(), "discovered issue types");
                    Some(map)
                }
            }
            Err(e) => {
                warn!(error = %e, "issue type discovery failed, using plan issue_types");
                None
            }
        }
    }

    async fn create_all(
        &self,
        plan: &mut ImplementationPlan,
        levels: &[Level],
        mapping: &TypeMapping,
        repository_id: &str,
    ) -> CreationResult {
        let mut result = CreationResult::default();

        for level in levels {
            let mut pending = Vec::new();
            for &idx in &level.items {
                let item = &plan.items[idx];
                match item.issue_number {
                    Some(number) => {
                        debug!(item = %item.id, number, "already created, skipping");
                        result.skipped += 1;
                    }
                    None => pending.push(idx),
                }
            }

            if pending.is_empty() {
                continue;
            }
            info!(depth = level.depth, pending = pending.len(), "creating level");

            for chunk in pending.chunks(self.batch_size) {
                let inputs: Vec<CreateIssueInput> = chunk
                    .iter()
                    .map(|&idx| issue_input(&plan.items[idx], mapping, repository_id))
                    .collect();

                if let [idx] = chunk {
                    self.create_one(plan, *idx, &inputs[0], &mut result).await;
                } else {
                    self.create_batch(plan, chunk, &inputs, &mut result).await;
                }
            }
        }

        result
    }

    async fn create_batch(
        &self,
        plan: &mut ImplementationPlan,
        chunk: &[usize],
        inputs: &[CreateIssueInput],
        result: &mut CreationResult,
    ) {
        debug!(size = inputs.len(), "creating batch");
        match self.tracker.create_issues_batch(inputs).await {
            Ok(batch) => {
                for (pos, &idx) in chunk.iter().enumerate() {
                    let item = &mut plan.items[idx];
                    match batch.issue_for(pos) {
                        Some(issue) => {
                            item.record_issue(issue);
                            result.created += 1;
                            info!(number = issue.number, title = %item.title, "created issue");
                        }
                        None => {
                            item.clear_issue();
                            result.failed += 1;
                            warn!(item = %item.id, "batch returned no issue");
                            result.errors.push(format!("Failed to create issue: {}", item.title));
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, size = inputs.len(), "batch create failed, falling back to single creates");
                for (&idx, input) in chunk.iter().zip(inputs) {
                    self.create_one(plan, idx, input, result).await;
                }
            }
        }
    }

    async fn create_one(
        &self,
        plan: &mut ImplementationPlan,
        idx: usize,
        input: &CreateIssueInput,
        result: &mut CreationResult,
    ) {
        let outcome = self.tracker.create_issue(input).await;
        let item = &mut plan.items[idx];
        match outcome {
            Ok(issue) => {
                item.record_issue(&issue);
                result.created += 1;
                info!(number = issue.number, title = %item.title, "created issue");
                self.rate_limit.pause().await;
            }
            Err(e) => {
                item.clear_issue();
                result.failed += 1;
                warn!(item = %item.id, error = %e, "failed to create issue");
                result
                    .errors
                    .push(format!("Failed to create issue \"{}\": {e}", item.title));
            }
        }
    }
}

fn issue_input(item: &PlanItem, mapping: &TypeMapping, repository_id: &str) -> CreateIssueInput {
    CreateIssueInput {
        title: item.title.clone(),
        body: format_issue_body(item),
        issue_type: mapping.resolve(&item.item_type).unwrap_or_default().to_owned(),
        repository_id: repository_id.to_owned(),
    }
}

fn log_preassigned(plan: &ImplementationPlan) {
    let assigned = plan.issued_count();
    if assigned > 0 {
        info!(
            assigned,
            total = plan.items.len(),
            "plan already has issue numbers, those items will be skipped"
        );
        for item in plan.items.iter().filter(|item| item.has_issue()) {
            debug!(item = %item.id, number = item.issue_number, "preassigned");
        }
    }
}
