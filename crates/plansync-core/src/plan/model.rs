//! Plan document types.
//!
//! These types map directly to the structured plan document (YAML on disk)
//! and are shared by every pipeline stage. Item types are stored as plain
//! strings so that an unrecognised type survives loading and is reported by
//! the validator instead of failing deserialization.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tracker::types::CreatedIssue;

/// Format version written into newly converted plans.
pub const PLAN_FORMAT_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// ItemType
// ---------------------------------------------------------------------------

/// Canonical vocabulary of work item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Phase,
    Project,
    Epic,
    Feature,
    Story,
    Task,
    Bug,
    Doc,
}

impl ItemType {
    /// Every type, in keyword-scan priority order.
    pub const ALL: [ItemType; 8] = [
        Self::Phase,
        Self::Project,
        Self::Epic,
        Self::Feature,
        Self::Story,
        Self::Task,
        Self::Bug,
        Self::Doc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Project => "project",
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Doc => "doc",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ItemTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phase" => Ok(Self::Phase),
            "project" => Ok(Self::Project),
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "story" => Ok(Self::Story),
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            "doc" => Ok(Self::Doc),
            _ => Err(ItemTypeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ItemType`] string.
#[derive(Debug, Clone)]
pub struct ItemTypeParseError(pub String);

impl fmt::Display for ItemTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item type: {:?}", self.0)
    }
}

impl std::error::Error for ItemTypeParseError {}

// ---------------------------------------------------------------------------
// Plan document
// ---------------------------------------------------------------------------

/// Repository coordinates on the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The `project` block of a plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub repository: Repository,
}

/// Top-level structure of a plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    /// Document format version.
    pub version: String,
    /// ISO date the outline was converted. Absent in hand-written plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    pub project: ProjectInfo,
    /// Static map from semantic type (e.g. "task") to tracker type id.
    #[serde(default)]
    pub issue_types: BTreeMap<String, String>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

impl ImplementationPlan {
    /// Look up an item by id.
    pub fn item(&self, id: &str) -> Option<&PlanItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of items that already carry an issue number.
    pub fn issued_count(&self) -> usize {
        self.items.iter().filter(|item| item.has_issue()).count()
    }

    /// Recompute every item's `children_ids` from `parent_id` back-references.
    ///
    /// `children_ids` is derived data; this is the only place it is written.
    pub fn rebuild_children(&mut self) {
        let index: std::collections::HashMap<String, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();

        for item in &mut self.items {
            item.children_ids.clear();
        }

        let edges: Vec<(usize, String)> = self
            .items
            .iter()
            .filter_map(|item| {
                let parent = item.parent_id.as_ref()?;
                index.get(parent).map(|&p| (p, item.id.clone()))
            })
            .collect();

        for (parent_idx, child_id) in edges {
            self.items[parent_idx].children_ids.push(child_id);
        }
    }
}

/// A single typed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    /// Stable identifier, unique within the plan.
    pub id: String,
    /// Semantic type name (see [`ItemType`]). Empty when missing.
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Derived from `parent_id` back-references; never authoritative.
    #[serde(default)]
    pub children_ids: Vec<String>,
    /// Open key-value bag (agent assignment, complexity flag, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
}

impl PlanItem {
    pub fn new(id: impl Into<String>, item_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            title: title.into(),
            description: String::new(),
            parent_id: None,
            children_ids: Vec::new(),
            metadata: BTreeMap::new(),
            issue_number: None,
            github_id: None,
        }
    }

    pub fn has_issue(&self) -> bool {
        self.issue_number.is_some()
    }

    /// Record a successfully created issue. Number and node id are always
    /// written together.
    pub fn record_issue(&mut self, issue: &CreatedIssue) {
        self.issue_number = Some(issue.number);
        self.github_id = Some(issue.id.clone());
    }

    /// Reset the issue identifiers after a failed creation attempt so the
    /// item stays eligible for retry.
    pub fn clear_issue(&mut self) {
        self.issue_number = None;
        self.github_id = None;
    }
}

// ---------------------------------------------------------------------------
// CreationResult
// ---------------------------------------------------------------------------

/// Outcome counters of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationResult {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl CreationResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
