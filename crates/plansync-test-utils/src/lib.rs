//! Shared test utilities for plansync integration tests.
//!
//! - [`MockTracker`]: an in-memory [`IssueTracker`] that records every call
//!   and can be scripted to fail in the ways a live tracker does.
//! - [`PlanBuilder`]: terse construction of plans and plan files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use plansync_core::plan::{ImplementationPlan, ItemType, PLAN_FORMAT_VERSION, PlanItem, PlanStore, ProjectInfo};
use plansync_core::tracker::{BatchCreateResult, CreateIssueInput, CreatedIssue, IssueTypeTemplate};
use plansync_core::{IssueTracker, Repository};

/// Repository id reported by [`MockTracker`].
pub const MOCK_REPOSITORY_ID: &str = "R_mock";

/// One recorded tracker call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    RepositoryId,
    CreateIssue { title: String },
    CreateBatch { titles: Vec<String> },
    Relationships { parent_id: String, child_ids: Vec<String> },
    FindExisting { title: String },
    DiscoverTypes,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<TrackerCall>,
    created: Vec<CreateIssueInput>,
    next_number: u64,
}

/// Scriptable in-memory tracker.
///
/// Issues are numbered from 1 (see [`MockTracker::starting_at`]) with node
/// id `I_<number>`. Every call is recorded, including ones that fail.
#[derive(Debug)]
pub struct MockTracker {
    state: Mutex<MockState>,
    fail_repository_id: bool,
    fail_batches: bool,
    omit_from_batch: HashSet<String>,
    fail_creates: HashSet<String>,
    fail_relationships: HashSet<String>,
    templates: Option<Vec<IssueTypeTemplate>>,
    existing: HashMap<String, u64>,
    block_plan: Option<PathBuf>,
}

impl Default for MockTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTracker {
    /// A tracker where every call succeeds and discovery fails.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                created: Vec::new(),
                next_number: 1,
            }),
            fail_repository_id: false,
            fail_batches: false,
            omit_from_batch: HashSet::new(),
            fail_creates: HashSet::new(),
            fail_relationships: HashSet::new(),
            templates: None,
            existing: HashMap::new(),
            block_plan: None,
        }
    }

    pub fn starting_at(self, number: u64) -> Self {
        self.lock().next_number = number;
        self
    }

    /// Every batch call returns an error.
    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    /// Batch calls leave out the alias for this title.
    pub fn omitting_from_batch(mut self, title: &str) -> Self {
        self.omit_from_batch.insert(title.to_owned());
        self
    }

    /// Single create calls for this title return an error.
    pub fn failing_create(mut self, title: &str) -> Self {
        self.fail_creates.insert(title.to_owned());
        self
    }

    /// Relationship calls for this parent node id return an error.
    pub fn failing_relationships(mut self, parent_id: &str) -> Self {
        self.fail_relationships.insert(parent_id.to_owned());
        self
    }

    pub fn failing_repository_id(mut self) -> Self {
        self.fail_repository_id = true;
        self
    }

    /// Discovery succeeds with these templates.
    pub fn with_templates(mut self, templates: &[(&str, &str)]) -> Self {
        self.templates = Some(
            templates
                .iter()
                .map(|(id, name)| IssueTypeTemplate {
                    id: (*id).to_owned(),
                    name: (*name).to_owned(),
                })
                .collect(),
        );
        self
    }

    /// `find_existing_issue(title)` reports `number`.
    pub fn with_existing(mut self, title: &str, number: u64) -> Self {
        self.existing.insert(title.to_owned(), number);
        self
    }

    /// When the repository id is requested (after the backup), replace the
    /// file at `path` with a directory so the final plan write fails.
    pub fn blocking_plan_write(mut self, path: &Path) -> Self {
        self.block_plan = Some(path.to_path_buf());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock tracker state poisoned")
    }

    fn record(&self, call: TrackerCall) {
        self.lock().calls.push(call);
    }

    fn mint(&self, input: &CreateIssueInput) -> CreatedIssue {
        let mut state = self.lock();
        let number = state.next_number;
        state.next_number += 1;
        state.created.push(input.clone());
        CreatedIssue {
            number,
            id: format!("I_{number}"),
            title: Some(input.title.clone()),
            url: Some(format!("https://github.test/issues/{number}")),
        }
    }

    // -- inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.lock().calls.clone()
    }

    /// Titles passed to single create calls, in call order.
    pub fn single_creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TrackerCall::CreateIssue { title } => Some(title),
                _ => None,
            })
            .collect()
    }

    /// Titles of each batch call, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TrackerCall::CreateBatch { titles } => Some(titles),
                _ => None,
            })
            .collect()
    }

    /// `(parent_id, child_ids)` of each relationship call, in call order.
    pub fn relationships(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TrackerCall::Relationships { parent_id, child_ids } => Some((parent_id, child_ids)),
                _ => None,
            })
            .collect()
    }

    /// Inputs of every issue actually created, in creation order.
    pub fn created(&self) -> Vec<CreateIssueInput> {
        self.lock().created.clone()
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.created().into_iter().map(|input| input.title).collect()
    }

    /// Number of calls that create issues or links.
    pub fn mutating_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    TrackerCall::CreateIssue { .. }
                        | TrackerCall::CreateBatch { .. }
                        | TrackerCall::Relationships { .. }
                )
            })
            .count()
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn repository_id(&self) -> Result<String> {
        self.record(TrackerCall::RepositoryId);
        if let Some(path) = &self.block_plan {
            std::fs::remove_file(path).expect("failed to remove plan file");
            std::fs::create_dir(path).expect("failed to create blocking directory");
        }
        if self.fail_repository_id {
            bail!("repository not found");
        }
        Ok(MOCK_REPOSITORY_ID.to_owned())
    }

    async fn create_issue(&self, input: &CreateIssueInput) -> Result<CreatedIssue> {
        self.record(TrackerCall::CreateIssue {
            title: input.title.clone(),
        });
        if self.fail_creates.contains(&input.title) {
            bail!("create rejected for {:?}", input.title);
        }
        Ok(self.mint(input))
    }

    async fn create_issues_batch(&self, inputs: &[CreateIssueInput]) -> Result<BatchCreateResult> {
        self.record(TrackerCall::CreateBatch {
            titles: inputs.iter().map(|input| input.title.clone()).collect(),
        });
        if self.fail_batches {
            return Err(anyhow!("batch transport failure"));
        }
        let mut result = BatchCreateResult::default();
        for (i, input) in inputs.iter().enumerate() {
            if !self.omit_from_batch.contains(&input.title) {
                result.insert(i, self.mint(input));
            }
        }
        Ok(result)
    }

    async fn create_sub_issue_relationships(&self, parent_id: &str, child_ids: &[String]) -> Result<()> {
        self.record(TrackerCall::Relationships {
            parent_id: parent_id.to_owned(),
            child_ids: child_ids.to_vec(),
        });
        if self.fail_relationships.contains(parent_id) {
            bail!("sub-issue link rejected for {parent_id}");
        }
        Ok(())
    }

    async fn find_existing_issue(&self, title: &str) -> Result<Option<u64>> {
        self.record(TrackerCall::FindExisting {
            title: title.to_owned(),
        });
        Ok(self.existing.get(title).copied())
    }

    async fn discover_issue_types(&self) -> Result<Vec<IssueTypeTemplate>> {
        self.record(TrackerCall::DiscoverTypes);
        self.templates
            .clone()
            .ok_or_else(|| anyhow!("issue types unavailable"))
    }
}

// ---------------------------------------------------------------------------
// PlanBuilder
// ---------------------------------------------------------------------------

/// A type table covering every item type, `IT_<type>`.
pub fn default_issue_types() -> BTreeMap<String, String> {
    ItemType::ALL
        .iter()
        .map(|ty| (ty.as_str().to_owned(), format!("IT_{ty}")))
        .collect()
}

/// Fluent plan construction for tests.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan: ImplementationPlan,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanBuilder {
    /// Empty plan for `acme/widgets` with [`default_issue_types`].
    pub fn new() -> Self {
        Self {
            plan: ImplementationPlan {
                version: PLAN_FORMAT_VERSION.to_owned(),
                generated: None,
                project: ProjectInfo {
                    name: "Test Project".to_owned(),
                    description: "Fixture plan".to_owned(),
                    repository: Repository::new("acme", "widgets"),
                },
                issue_types: default_issue_types(),
                items: Vec::new(),
            },
        }
    }

    pub fn issue_types(mut self, issue_types: BTreeMap<String, String>) -> Self {
        self.plan.issue_types = issue_types;
        self
    }

    /// Add an item titled `Title <id>`.
    pub fn item(self, id: &str, item_type: &str, parent: Option<&str>) -> Self {
        let title = format!("Title {id}");
        self.titled(id, item_type, &title, parent)
    }

    pub fn titled(mut self, id: &str, item_type: &str, title: &str, parent: Option<&str>) -> Self {
        let mut item = PlanItem::new(id, item_type, title);
        item.parent_id = parent.map(str::to_owned);
        self.plan.items.push(item);
        self
    }

    /// Add `count` sibling tasks `task-0`.. under `parent`.
    pub fn tasks(mut self, count: usize, parent: Option<&str>) -> Self {
        for i in 0..count {
            self = self.item(&format!("task-{i}"), "task", parent);
        }
        self
    }

    /// Mark an existing item as already created.
    pub fn issued(mut self, id: &str, number: u64, github_id: &str) -> Self {
        if let Some(item) = self.plan.items.iter_mut().find(|item| item.id == id) {
            item.issue_number = Some(number);
            item.github_id = Some(github_id.to_owned());
        }
        self
    }

    pub fn build(mut self) -> ImplementationPlan {
        self.plan.rebuild_children();
        self.plan
    }

    /// Write the plan to `path` and return a store for it.
    pub fn write(self, path: &Path) -> PlanStore {
        let store = PlanStore::new(path);
        store.save(&self.build()).expect("failed to write fixture plan");
        store
    }
}
