//! Parent/child linking after creation.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::plan::model::ImplementationPlan;
use crate::tracker::IssueTracker;

/// Children grouped under one parent, by tracker node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipGroup {
    pub parent_id: String,
    pub child_ids: Vec<String>,
}

/// Group every linkable child under its parent's tracker id.
///
/// An edge is linkable when both the child and its parent carry a
/// `github_id`. Groups come out in the order their parent first appears as
/// a parent in the plan; children keep plan order.
pub fn relationship_groups(plan: &ImplementationPlan) -> Vec<RelationshipGroup> {
    let by_id: HashMap<&str, &str> = plan
        .items
        .iter()
        .filter_map(|item| item.github_id.as_deref().map(|gid| (item.id.as_str(), gid)))
        .collect();

    let mut groups: Vec<RelationshipGroup> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for item in &plan.items {
        let Some(parent) = item.parent_id.as_deref() else {
            continue;
        };
        let (Some(child_gid), Some(&parent_gid)) = (item.github_id.as_deref(), by_id.get(parent)) else {
            debug!(item = %item.id, parent_id = parent, "edge not linkable yet");
            continue;
        };

        let slot = *position.entry(parent_gid).or_insert_with(|| {
            groups.push(RelationshipGroup {
                parent_id: parent_gid.to_owned(),
                child_ids: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].child_ids.push(child_gid.to_owned());
    }

    groups
}

/// Issue one relationship call per parent.
///
/// Each call is independent: a failure is appended to `errors` and the
/// remaining parents are still linked. Returns the number of parents linked.
pub async fn link_relationships(
    tracker: &dyn IssueTracker,
    plan: &ImplementationPlan,
    errors: &mut Vec<String>,
) -> usize {
    let groups = relationship_groups(plan);
    if groups.is_empty() {
        return 0;
    }

    info!(parents = groups.len(), "linking sub-issues");
    let mut linked = 0;
    for group in &groups {
        match tracker
            .create_sub_issue_relationships(&group.parent_id, &group.child_ids)
            .await
        {
            Ok(()) => {
                debug!(parent_id = %group.parent_id, children = group.child_ids.len(), "linked");
                linked += 1;
            }
            Err(e) => {
                warn!(parent_id = %group.parent_id, error = %e, "failed to link sub-issues");
                errors.push(format!(
                    "Failed to create relationships for parent {}: {e}",
                    group.parent_id
                ));
            }
        }
    }
    linked
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::plan::model::{PLAN_FORMAT_VERSION, PlanItem, ProjectInfo, Repository};

    fn item(id: &str, parent: Option<&str>, gid: Option<&str>) -> PlanItem {
        let mut item = PlanItem::new(id, "task", id);
        item.parent_id = parent.map(str::to_owned);
        item.github_id = gid.map(str::to_owned);
        item.issue_number = gid.map(|_| 1);
        item
    }

    fn plan(items: Vec<PlanItem>) -> ImplementationPlan {
        ImplementationPlan {
            version: PLAN_FORMAT_VERSION.to_owned(),
            generated: None,
            project: ProjectInfo {
                name: "P".to_owned(),
                description: String::new(),
                repository: Repository::new("o", "r"),
            },
            issue_types: BTreeMap::new(),
            items,
        }
    }

    #[test]
    fn groups_children_per_parent_in_plan_order() {
        let p = plan(vec![
            item("a", None, Some("I_a")),
            item("b", Some("a"), Some("I_b")),
            item("x", None, Some("I_x")),
            item("y", Some("x"), Some("I_y")),
            item("c", Some("a"), Some("I_c")),
        ]);
        let groups = relationship_groups(&p);
        assert_eq!(
            groups,
            vec![
                RelationshipGroup {
                    parent_id: "I_a".to_owned(),
                    child_ids: vec!["I_b".to_owned(), "I_c".to_owned()],
                },
                RelationshipGroup {
                    parent_id: "I_x".to_owned(),
                    child_ids: vec!["I_y".to_owned()],
                },
            ]
        );
    }

    #[test]
    fn unissued_items_are_not_linked() {
        let p = plan(vec![
            item("a", None, Some("I_a")),
            item("b", Some("a"), None),
            item("c", None, None),
            item("d", Some("c"), Some("I_d")),
        ]);
        assert!(relationship_groups(&p).is_empty());
    }
}
