//! Outline parser: converts a markdown work-breakdown outline into an
//! [`ImplementationPlan`].
//!
//! Recognised lines:
//! - `##`, `###`, `####` headers are container nodes at depth 0, 1, 2.
//! - `N. **Type**: Title` list lines are leaf items, followed by `-` bullet
//!   lines (description) and `_..._` lines (guidance notes).
//!
//! Everything else is ignored. Headers whose type cannot be resolved are
//! dropped rather than reported.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::model::{ImplementationPlan, ItemType, PLAN_FORMAT_VERSION, PlanItem, ProjectInfo, Repository};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{2,4})\s+(.+)$").expect("valid header regex"));

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.\s+\*\*(\w+)\*\*:\s+(.+)$").expect("valid list item regex")
});

static ISSUE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#(\d+)\]\s*").expect("valid issue ref regex"));

static COMPLEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(complex\)").expect("valid complex regex"));

static TITLE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:Phase|Project|Epic|Feature|Story|Task|Bug|Doc)\b)?\s*[\d.]*\s*[-:]?\s*(.+)$")
        .expect("valid title prefix regex")
});

static AGENT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([^)]+)\)\s*").expect("valid agent regex"));

static AGENT_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*").expect("valid separator regex"));

static CONTINUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-_]").expect("valid continuation regex"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

static PROJECT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid project header regex"));

static IMPLEMENTATION_PLAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)implementation plan").expect("valid regex"));

/// Whole-word, case-insensitive keyword patterns in scan priority order.
static TYPE_KEYWORDS: LazyLock<Vec<(ItemType, Regex)>> = LazyLock::new(|| {
    ItemType::ALL
        .iter()
        .map(|ty| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", ty.as_str())).expect("valid keyword regex");
            (*ty, re)
        })
        .collect()
});

/// Maximum length of the title portion of a generated id.
const SLUG_MAX_LEN: usize = 30;

// ---------------------------------------------------------------------------
// DepthTypeTable
// ---------------------------------------------------------------------------

/// Maps header depth (0 for `##`) to the type assumed when a header carries
/// no explicit type keyword.
///
/// The default maps depth 1 to `epic`; a depth-1 header only becomes a
/// `project` when the word "project" appears in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthTypeTable {
    by_depth: BTreeMap<usize, ItemType>,
}

impl DepthTypeTable {
    /// A table with no entries: every header must name its type.
    pub fn empty() -> Self {
        Self {
            by_depth: BTreeMap::new(),
        }
    }

    pub fn from_map(by_depth: BTreeMap<usize, ItemType>) -> Self {
        Self { by_depth }
    }

    /// Set (or replace) the default type for `depth`.
    pub fn with(mut self, depth: usize, item_type: ItemType) -> Self {
        self.by_depth.insert(depth, item_type);
        self
    }

    pub fn type_for(&self, depth: usize) -> Option<ItemType> {
        self.by_depth.get(&depth).copied()
    }
}

impl Default for DepthTypeTable {
    fn default() -> Self {
        Self::empty()
            .with(0, ItemType::Phase)
            .with(1, ItemType::Epic)
            .with(2, ItemType::Feature)
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Generates `type-title-slug` ids, unique within one allocator.
///
/// One allocator lives for exactly one parse call.
#[derive(Debug, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for an item. Collisions get `-1`, `-2`, ... appended.
    pub fn allocate(&mut self, item_type: &str, title: &str) -> String {
        let base = format!("{item_type}-{}", slugify(title));

        let mut id = base.clone();
        let mut counter = 1;
        while self.used.contains(&id) {
            id = format!("{base}-{counter}");
            counter += 1;
        }

        self.used.insert(id.clone());
        id
    }
}

fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = SLUG_RE.replace_all(&lowered, "-");
    // Only ASCII remains after the replacement, so byte truncation is safe.
    let trimmed = slug.trim_matches('-');
    trimmed[..trimmed.len().min(SLUG_MAX_LEN)].to_owned()
}

// ---------------------------------------------------------------------------
// OutlineParser
// ---------------------------------------------------------------------------

/// Parses outline text into a plan.
///
/// The parser itself holds only configuration; all state (ancestor stack,
/// id allocation) is scoped to a single [`OutlineParser::parse`] call.
#[derive(Debug, Clone, Default)]
pub struct OutlineParser {
    depth_types: DepthTypeTable,
    issue_types: BTreeMap<String, String>,
}

/// State of one parse invocation.
struct ParseState<'a> {
    ids: &'a mut IdAllocator,
    /// Open ancestor ids indexed by header depth.
    stack: Vec<Option<String>>,
    items: Vec<PlanItem>,
}

impl ParseState<'_> {
    /// Make `id` the open ancestor at `depth`, closing everything deeper.
    fn open(&mut self, depth: usize, id: String) {
        self.stack.truncate(depth);
        self.stack.resize(depth, None);
        self.stack.push(Some(id));
    }

    fn header_parent(&self, depth: usize) -> Option<String> {
        let slot = depth.checked_sub(1)?;
        self.stack.get(slot).cloned().flatten()
    }

    fn innermost(&self) -> Option<String> {
        self.stack.iter().rev().find_map(|slot| slot.clone())
    }
}

impl OutlineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth_types(mut self, depth_types: DepthTypeTable) -> Self {
        self.depth_types = depth_types;
        self
    }

    /// Issue type table copied into every produced plan.
    pub fn with_issue_types(mut self, issue_types: BTreeMap<String, String>) -> Self {
        self.issue_types = issue_types;
        self
    }

    /// Parse an outline with a fresh [`IdAllocator`].
    pub fn parse(&self, markdown: &str, repository: Repository) -> ImplementationPlan {
        let mut ids = IdAllocator::new();
        self.parse_with(markdown, repository, &mut ids)
    }

    /// Parse an outline, drawing ids from `ids`.
    pub fn parse_with(
        &self,
        markdown: &str,
        repository: Repository,
        ids: &mut IdAllocator,
    ) -> ImplementationPlan {
        let lines: Vec<&str> = markdown.lines().collect();
        let mut state = ParseState {
            ids,
            stack: Vec::new(),
            items: Vec::new(),
        };

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];

            if let Some(caps) = HEADER_RE.captures(line) {
                let depth = caps[1].len() - 2;
                self.push_header(&mut state, depth, &caps[2]);
                i += 1;
                continue;
            }

            if let Some(caps) = LIST_ITEM_RE.captures(line) {
                let (notes, consumed) = collect_description(&lines[i + 1..]);
                push_list_item(&mut state, &caps[2], &caps[3], &notes);
                i += 1 + consumed;
                continue;
            }

            i += 1;
        }

        let mut plan = ImplementationPlan {
            version: PLAN_FORMAT_VERSION.to_owned(),
            generated: Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
            project: ProjectInfo {
                name: extract_project_name(markdown),
                description: extract_project_description(&lines),
                repository,
            },
            issue_types: self.issue_types.clone(),
            items: state.items,
        };
        plan.rebuild_children();
        plan
    }

    fn push_header(&self, state: &mut ParseState<'_>, depth: usize, text: &str) {
        let Some(item_type) = self.resolve_header_type(depth, text) else {
            debug!(depth, header = text, "dropping header with no resolvable type");
            return;
        };

        let mut metadata = BTreeMap::new();
        let issue_number = extract_issue_number(text);
        let without_ref = ISSUE_REF_RE.replacen(text, 1, "");
        let mut clean = without_ref.trim().to_owned();
        if COMPLEX_RE.is_match(&clean) {
            metadata.insert("complex".to_owned(), Value::Bool(true));
            let stripped = COMPLEX_RE.replacen(&clean, 1, "").trim().to_owned();
            clean = stripped;
        }
        let title = strip_title_prefix(&clean);

        let id = state.ids.allocate(item_type.as_str(), &title);
        let mut item = PlanItem::new(id.clone(), item_type.as_str(), title);
        item.parent_id = state.header_parent(depth);
        item.issue_number = issue_number;
        item.metadata = metadata;

        state.items.push(item);
        state.open(depth, id);
    }

    /// Explicit keyword in the original header text first, then the depth
    /// default.
    fn resolve_header_type(&self, depth: usize, text: &str) -> Option<ItemType> {
        TYPE_KEYWORDS
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(ty, _)| *ty)
            .or_else(|| self.depth_types.type_for(depth))
    }
}

fn push_list_item(state: &mut ParseState<'_>, type_word: &str, text: &str, notes: &[String]) {
    let item_type = type_word.to_lowercase();
    let issue_number = extract_issue_number(text);
    let mut title = ISSUE_REF_RE.replacen(text, 1, "").trim().to_owned();

    let mut metadata = BTreeMap::new();
    let agent_prefix = AGENT_PREFIX_RE.captures(&title).map(|caps| {
        let agents: Vec<String> = AGENT_SEPARATOR_RE
            .split(&caps[1])
            .map(str::to_owned)
            .collect();
        (caps[0].len(), agents)
    });
    if let Some((prefix_len, agents)) = agent_prefix {
        if agents.len() == 1 {
            metadata.insert("agent".to_owned(), Value::String(agents[0].clone()));
        } else {
            let values = agents.into_iter().map(Value::String).collect();
            metadata.insert("agents".to_owned(), Value::Array(values));
        }
        title = title[prefix_len..].to_owned();
    }

    let id = state.ids.allocate(&item_type, &title);
    let mut item = PlanItem::new(id, item_type, title);
    item.description = notes.join("\n");
    item.parent_id = state.innermost();
    item.issue_number = issue_number;
    item.metadata = metadata;
    state.items.push(item);
}

/// Collect bullet and guidance lines following a list item.
///
/// Returns the formatted description lines and the number of input lines
/// consumed (including blank lines).
fn collect_description(lines: &[&str]) -> (Vec<String>, usize) {
    let mut notes = Vec::new();
    let mut consumed = 0;

    for line in lines {
        if !(CONTINUATION_RE.is_match(line) || line.trim().is_empty()) {
            break;
        }
        consumed += 1;

        let trimmed = line.trim();
        if trimmed.starts_with('-') {
            notes.push(trimmed.to_owned());
        } else if trimmed.len() >= 2 && trimmed.starts_with('_') && trimmed.ends_with('_') {
            notes.push(trimmed[1..trimmed.len() - 1].to_owned());
        }
    }

    (notes, consumed)
}

fn extract_issue_number(text: &str) -> Option<u64> {
    ISSUE_REF_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Drop a leading `Phase 1:` / `Epic 1.1 -` style prefix.
fn strip_title_prefix(text: &str) -> String {
    TITLE_PREFIX_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_owned())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| text.trim().to_owned())
}

fn extract_project_name(markdown: &str) -> String {
    PROJECT_HEADER_RE
        .captures(markdown)
        .map(|caps| IMPLEMENTATION_PLAN_RE.replace(&caps[1], "").trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Project".to_owned())
}

fn extract_project_description(lines: &[&str]) -> String {
    const GOAL_PREFIX: &str = "Project Goal:";

    for (i, line) in lines.iter().enumerate() {
        if !PROJECT_HEADER_RE.is_match(line) {
            continue;
        }
        for candidate in lines.iter().skip(i + 1).take(4) {
            let candidate = candidate.trim();
            if let Some(goal) = candidate.strip_prefix(GOAL_PREFIX) {
                return goal.trim().to_owned();
            }
            if !candidate.is_empty() && !candidate.starts_with('#') {
                return candidate.to_owned();
            }
        }
    }

    "Implementation plan for the project".to_owned()
}
