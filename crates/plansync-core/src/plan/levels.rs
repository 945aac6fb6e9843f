//! Level scheduling.
//!
//! An item's depth is the number of parent hops to a root. Items are grouped
//! by depth so that every parent is created before its children.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use super::model::ImplementationPlan;

/// The parent chain loops back on itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("cyclic parent references: {}", path.join(" -> "))]
    CyclicPlan {
        /// Item ids along the cycle, starting and ending with the same id.
        path: Vec<String>,
    },
}

/// All items at one depth, as indices into `plan.items` in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub depth: usize,
    pub items: Vec<usize>,
}

/// Group plan items into root-first levels.
///
/// A `parent_id` that does not resolve is treated as absent; validation
/// reports it before scheduling runs in the sync path.
pub fn schedule_levels(plan: &ImplementationPlan) -> Result<Vec<Level>, ScheduleError> {
    let index: HashMap<&str, usize> = plan
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();

    let parent_of = |i: usize| -> Option<usize> {
        plan.items[i]
            .parent_id
            .as_deref()
            .and_then(|parent| index.get(parent).copied())
    };

    let mut depths: Vec<Option<usize>> = vec![None; plan.items.len()];

    for start in 0..plan.items.len() {
        if depths[start].is_some() {
            continue;
        }

        // Walk up until a root or an already-known depth.
        let mut chain: Vec<usize> = Vec::new();
        let mut on_chain = HashSet::new();
        let mut current = Some(start);
        let mut base = 0;

        while let Some(i) = current {
            if let Some(known) = depths[i] {
                base = known + 1;
                break;
            }
            if !on_chain.insert(i) {
                let from = chain.iter().position(|&c| c == i).unwrap_or(0);
                let mut path: Vec<String> =
                    chain[from..].iter().map(|&c| plan.items[c].id.clone()).collect();
                path.push(plan.items[i].id.clone());
                return Err(ScheduleError::CyclicPlan { path });
            }
            chain.push(i);
            current = parent_of(i);
        }

        for (offset, &i) in chain.iter().rev().enumerate() {
            depths[i] = Some(base + offset);
        }
    }

    let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, depth) in depths.into_iter().enumerate() {
        grouped.entry(depth.unwrap_or(0)).or_default().push(i);
    }

    Ok(grouped
        .into_iter()
        .map(|(depth, items)| Level { depth, items })
        .collect())
}
