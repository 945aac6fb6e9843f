//! Issue synchronization: batched creation, relationship linking, and the
//! pacing policy between sequential calls.

pub mod rate_limit;
pub mod relationships;
pub mod synchronizer;

pub use rate_limit::{DEFAULT_DELAY, FixedDelay, NoDelay, RateLimitPolicy};
pub use relationships::{RelationshipGroup, link_relationships, relationship_groups};
pub use synchronizer::{
    DEFAULT_BATCH_SIZE, DryRunReport, PlannedAction, PlannedIssue, PlannedLevel, SyncEngine, SyncError,
    format_issue_body,
};
