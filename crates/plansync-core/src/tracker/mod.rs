//! Issue tracker seam.
//!
//! The synchronizer talks to the tracker only through the [`IssueTracker`]
//! trait. [`GhTracker`] is the live client; tests inject a double.
//!
//! ```text
//! SyncEngine
//!     |
//!     v
//! &dyn IssueTracker
//!     |   repository_id()
//!     |   create_issue(input)          --> CreatedIssue
//!     |   create_issues_batch(inputs)  --> BatchCreateResult (alias -> issue)
//!     |   create_sub_issue_relationships(parent, children)
//!     |   find_existing_issue(title)
//!     |   discover_issue_types(repo)   --> [IssueTypeTemplate]
//! ```

pub mod discovery;
pub mod gh;
pub mod trait_def;
pub mod types;

pub use discovery::{normalize_type_name, templates_to_type_map};
pub use gh::{GhError, GhTracker};
pub use trait_def::IssueTracker;
pub use types::{
    BatchCreateResult, CreateIssueInput, CreatedIssue, IssueTypeMap, IssueTypeTemplate, batch_alias,
};
