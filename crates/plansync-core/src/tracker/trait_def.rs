//! The `IssueTracker` trait: the capability the synchronizer depends on.

use anyhow::Result;
use async_trait::async_trait;

use super::types::{BatchCreateResult, CreateIssueInput, CreatedIssue, IssueTypeTemplate};

/// Client for one repository on an issue tracker.
///
/// A tracker is bound to a single repository at construction; every method
/// operates on that repository.
///
/// # Object Safety
///
/// This trait is object-safe, so the synchronizer can hold a
/// `&dyn IssueTracker` and tests can inject a double.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Tracker node id of the bound repository.
    async fn repository_id(&self) -> Result<String>;

    /// Create one issue.
    async fn create_issue(&self, input: &CreateIssueInput) -> Result<CreatedIssue>;

    /// Create several issues in one network call.
    ///
    /// Input `i` is reported under alias [`super::batch_alias`]`(i)`. An
    /// alias missing from the result means that input was not created.
    /// Returning `Err` means the call as a whole failed and nothing can be
    /// assumed about any input.
    async fn create_issues_batch(&self, inputs: &[CreateIssueInput]) -> Result<BatchCreateResult>;

    /// Attach every child in `child_ids` as a sub-issue of `parent_id`.
    async fn create_sub_issue_relationships(&self, parent_id: &str, child_ids: &[String]) -> Result<()>;

    /// Number of an open or closed issue whose title matches exactly.
    async fn find_existing_issue(&self, title: &str) -> Result<Option<u64>>;

    /// Issue types defined for the repository.
    async fn discover_issue_types(&self) -> Result<Vec<IssueTypeTemplate>>;
}

// Compile-time assertion: IssueTracker must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn IssueTracker) {}
};
