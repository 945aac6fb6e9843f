//! Value types exchanged with an issue tracker.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Semantic item type (e.g. `"task"`) to tracker issue type id.
pub type IssueTypeMap = BTreeMap<String, String>;

/// Request to create one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueInput {
    pub title: String,
    pub body: String,
    /// Tracker issue type id, already resolved from the semantic type.
    pub issue_type: String,
    pub repository_id: String,
}

/// An issue the tracker reports as created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub number: u64,
    /// Tracker node id, used for relationship calls.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Alias used for the input at `index` in an aliased batch call.
pub fn batch_alias(index: usize) -> String {
    format!("issue{index}")
}

/// Per-alias outcome of a batch call. An alias with no entry failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCreateResult {
    pub issues: HashMap<String, CreatedIssue>,
}

impl BatchCreateResult {
    pub fn insert(&mut self, index: usize, issue: CreatedIssue) {
        self.issues.insert(batch_alias(index), issue);
    }

    pub fn issue_for(&self, index: usize) -> Option<&CreatedIssue> {
        self.issues.get(&batch_alias(index))
    }

    /// Number of aliases that produced an issue.
    pub fn created_count(&self) -> usize {
        self.issues.len()
    }
}

/// An issue type defined on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTypeTemplate {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_is_keyed_by_alias() {
        let mut result = BatchCreateResult::default();
        result.insert(
            2,
            CreatedIssue {
                number: 9,
                id: "I_9".to_owned(),
                title: None,
                url: None,
            },
        );
        assert_eq!(batch_alias(2), "issue2");
        assert_eq!(result.issue_for(2).map(|i| i.number), Some(9));
        assert!(result.issue_for(0).is_none());
        assert_eq!(result.created_count(), 1);
    }

    #[test]
    fn create_input_serializes_camel_case() {
        let input = CreateIssueInput {
            title: "T".to_owned(),
            body: "B".to_owned(),
            issue_type: "IT_1".to_owned(),
            repository_id: "R_1".to_owned(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["issueType"], "IT_1");
        assert_eq!(json["repositoryId"], "R_1");
    }
}
