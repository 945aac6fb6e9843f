//! Hierarchical plan compiler and batched issue synchronization.
//!
//! ```text
//! outline text --OutlineParser--> ImplementationPlan
//!                                      |
//!                 validate -> schedule levels -> backup
//!                                      |
//!             SyncEngine --IssueTracker--> create (batched, per level)
//!                                      |
//!                         link parents -> write plan back
//! ```

pub mod plan;
pub mod repo;
pub mod sync;
pub mod tracker;

pub use plan::{CreationResult, ImplementationPlan, ItemType, PlanItem, Repository};
pub use sync::{FixedDelay, NoDelay, RateLimitPolicy, SyncEngine, SyncError};
pub use tracker::{IssueTracker, IssueTypeMap};
