//! Issue type discovery.
//!
//! Tracker issue type names are free-form ("User Story", "Task - Development").
//! They are normalized into the canonical item type vocabulary so a live
//! type table can stand in for the plan's static one.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{IssueTypeMap, IssueTypeTemplate};

/// Known template names, in substring-match priority order.
const KNOWN_NAMES: &[(&str, &str)] = &[
    ("phase", "phase"),
    ("project", "project"),
    ("epic", "epic"),
    ("feature", "feature"),
    ("user story", "story"),
    ("story", "story"),
    ("task", "task"),
    ("task - development", "task"),
    ("bug", "bug"),
    ("documentation", "doc"),
    ("doc", "doc"),
];

static WORD_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-_]+").expect("valid word split regex"));

/// Map a tracker type name to a semantic item type.
///
/// Tries an exact match on the lowercased name, then a substring match, then
/// falls back to the first word. Returns `None` for a blank name.
pub fn normalize_type_name(name: &str) -> Option<String> {
    let name = name.trim().to_lowercase();

    if let Some((_, ty)) = KNOWN_NAMES.iter().find(|(known, _)| *known == name) {
        return Some((*ty).to_owned());
    }

    if let Some((_, ty)) = KNOWN_NAMES.iter().find(|(known, _)| name.contains(known)) {
        return Some((*ty).to_owned());
    }

    WORD_SPLIT_RE
        .split(&name)
        .next()
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
}

/// Build a semantic type table from discovered templates.
///
/// When two templates normalize to the same type, the later one wins.
pub fn templates_to_type_map(templates: &[IssueTypeTemplate]) -> IssueTypeMap {
    let mut map = IssueTypeMap::new();
    for template in templates {
        if let Some(ty) = normalize_type_name(&template.name) {
            map.insert(ty, template.id.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: &str, name: &str) -> IssueTypeTemplate {
        IssueTypeTemplate {
            id: id.to_owned(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn exact_names_map_directly() {
        assert_eq!(normalize_type_name("Epic").as_deref(), Some("epic"));
        assert_eq!(normalize_type_name("  User Story ").as_deref(), Some("story"));
        assert_eq!(normalize_type_name("Documentation").as_deref(), Some("doc"));
        assert_eq!(normalize_type_name("Task - Development").as_deref(), Some("task"));
    }

    #[test]
    fn substring_match_is_second() {
        assert_eq!(normalize_type_name("Bug Report").as_deref(), Some("bug"));
        assert_eq!(normalize_type_name("Feature Request").as_deref(), Some("feature"));
        assert_eq!(normalize_type_name("Sub-task").as_deref(), Some("task"));
    }

    #[test]
    fn first_word_is_the_fallback() {
        assert_eq!(normalize_type_name("Spike_Research").as_deref(), Some("spike"));
        assert_eq!(normalize_type_name("Chore - infra").as_deref(), Some("chore"));
        assert_eq!(normalize_type_name("   "), None);
    }

    #[test]
    fn later_template_wins_on_collision() {
        let map = templates_to_type_map(&[
            template("IT_1", "Task"),
            template("IT_2", "Task - Development"),
            template("IT_3", "Bug"),
        ]);
        assert_eq!(map.get("task").map(String::as_str), Some("IT_2"));
        assert_eq!(map.get("bug").map(String::as_str), Some("IT_3"));
        assert_eq!(map.len(), 2);
    }
}
