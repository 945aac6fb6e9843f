//! Plan management: data model, outline parsing, validation, level
//! scheduling, and on-disk storage.

pub mod levels;
pub mod model;
pub mod outline;
pub mod store;
pub mod validate;

pub use levels::{Level, ScheduleError, schedule_levels};
pub use model::{
    CreationResult, ImplementationPlan, ItemType, PLAN_FORMAT_VERSION, PlanItem, ProjectInfo,
    Repository,
};
pub use outline::{DepthTypeTable, IdAllocator, OutlineParser};
pub use store::{PlanStore, PlanStoreError, backup_path_for};
pub use validate::{TypeMapping, ValidationError, validate_issue_types, validate_structure};
