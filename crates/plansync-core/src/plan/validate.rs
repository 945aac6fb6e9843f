//! Plan validation.
//!
//! Validation is pure and runs before any mutation:
//! - Item ids are unique.
//! - Every `parent_id` resolves to an item in the same plan.
//! - Every item has a non-empty `title` and `type`.
//! - Every item's type maps to a tracker type id.
//!
//! The structural checks need nothing but the plan and run before the first
//! tracker call. The type check needs the discovered type table, so the
//! synchronizer runs it after discovery and before the backup.

use std::collections::HashSet;

use thiserror::Error;

use super::model::ImplementationPlan;
use crate::tracker::IssueTypeMap;

/// Errors raised by plan validation. All of them abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate item id: {0:?}")]
    DuplicateId(String),

    #[error("item {item:?} references non-existent parent {parent:?}")]
    UnresolvedParent { item: String, parent: String },

    #[error("item {item:?} is missing required field: {field}")]
    MissingField { item: String, field: &'static str },

    #[error("no issue type mapping found for type {item_type:?} (item {item:?})")]
    UnknownIssueType { item: String, item_type: String },
}

/// Resolves semantic item types to tracker type ids.
///
/// Discovered mappings take precedence over the plan's static table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMapping {
    discovered: Option<IssueTypeMap>,
    static_types: IssueTypeMap,
}

impl TypeMapping {
    pub fn new(static_types: IssueTypeMap) -> Self {
        Self {
            discovered: None,
            static_types,
        }
    }

    pub fn from_plan(plan: &ImplementationPlan) -> Self {
        Self::new(plan.issue_types.clone())
    }

    pub fn with_discovered(mut self, discovered: Option<IssueTypeMap>) -> Self {
        self.discovered = discovered;
        self
    }

    pub fn discovered(&self) -> Option<&IssueTypeMap> {
        self.discovered.as_ref()
    }

    pub fn resolve(&self, item_type: &str) -> Option<&str> {
        self.discovered
            .as_ref()
            .and_then(|types| types.get(item_type))
            .or_else(|| self.static_types.get(item_type))
            .map(String::as_str)
    }
}

/// Referential integrity and required fields.
pub fn validate_structure(plan: &ImplementationPlan) -> Result<(), ValidationError> {
    let mut ids = HashSet::new();
    for item in &plan.items {
        if !ids.insert(item.id.as_str()) {
            return Err(ValidationError::DuplicateId(item.id.clone()));
        }
    }

    for item in &plan.items {
        if let Some(parent) = &item.parent_id {
            if !ids.contains(parent.as_str()) {
                return Err(ValidationError::UnresolvedParent {
                    item: item.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        if item.title.trim().is_empty() {
            return Err(ValidationError::MissingField {
                item: item.id.clone(),
                field: "title",
            });
        }

        if item.item_type.trim().is_empty() {
            return Err(ValidationError::MissingField {
                item: item.id.clone(),
                field: "type",
            });
        }
    }

    Ok(())
}

/// Every item type must resolve through `mapping`.
pub fn validate_issue_types(
    plan: &ImplementationPlan,
    mapping: &TypeMapping,
) -> Result<(), ValidationError> {
    for item in &plan.items {
        if mapping.resolve(&item.item_type).is_none() {
            return Err(ValidationError::UnknownIssueType {
                item: item.id.clone(),
                item_type: item.item_type.clone(),
            });
        }
    }
    Ok(())
}
