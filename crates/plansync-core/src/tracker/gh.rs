//! Live tracker client backed by the GitHub CLI.
//!
//! Every call shells out to `gh api graphql` (or `gh search issues`), so
//! authentication is whatever `gh auth` already has. Query text is built by
//! pure functions below and string values are escaped as JSON string
//! literals, which GraphQL accepts verbatim.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::trait_def::IssueTracker;
use super::types::{BatchCreateResult, CreateIssueInput, CreatedIssue, IssueTypeTemplate, batch_alias};
use crate::plan::model::Repository;

/// Preview features needed for issue types and sub-issues.
const GRAPHQL_FEATURES: &str = "GraphQL-Features: issue_types,sub_issues";

/// Upper bound on search results inspected for an exact title match.
const SEARCH_LIMIT: &str = "20";

/// Errors from invoking `gh` or interpreting its output.
#[derive(Debug, Error)]
pub enum GhError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gh {command} failed (exit {code}): {stderr}")]
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("malformed gh response: {0}")]
    Malformed(String),

    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
}

/// [`IssueTracker`] implementation using the `gh` binary.
#[derive(Debug)]
pub struct GhTracker {
    binary: String,
    repository: Repository,
    repository_id: OnceCell<String>,
}

impl GhTracker {
    /// Create a client for `repository` that finds `gh` on `$PATH`.
    pub fn new(repository: Repository) -> Self {
        Self::with_binary("gh", repository)
    }

    pub fn with_binary(binary: impl Into<String>, repository: Repository) -> Self {
        Self {
            binary: binary.into(),
            repository,
            repository_id: OnceCell::new(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Run `gh` with `args` and return stdout.
    ///
    /// With `allow_failure`, a non-zero exit still returns stdout when it is
    /// non-empty, since `gh api graphql` exits non-zero on partial errors
    /// while still printing the response body.
    async fn run(&self, args: &[&str], allow_failure: bool) -> Result<String, GhError> {
        debug!(binary = %self.binary, command = args.first().copied().unwrap_or_default(), "running gh");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| GhError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() || (allow_failure && !stdout.trim().is_empty()) {
            return Ok(stdout);
        }

        Err(GhError::Exit {
            command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }

    /// Execute a GraphQL document and return the full response object.
    async fn graphql(&self, query: &str) -> Result<Value, GhError> {
        let query_arg = format!("query={query}");
        let stdout = self
            .run(&["api", "graphql", "-H", GRAPHQL_FEATURES, "-f", query_arg.as_str()], true)
            .await?;
        serde_json::from_str(&stdout).map_err(|e| GhError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IssueTracker for GhTracker {
    async fn repository_id(&self) -> Result<String> {
        let id = self
            .repository_id
            .get_or_try_init(|| async {
                let response = self.graphql(&repository_id_query(&self.repository)).await?;
                parse_repository_id(&response)
            })
            .await?;
        Ok(id.clone())
    }

    async fn create_issue(&self, input: &CreateIssueInput) -> Result<CreatedIssue> {
        let response = self.graphql(&create_issue_mutation(input)).await?;
        Ok(parse_created_issue(&response)?)
    }

    async fn create_issues_batch(&self, inputs: &[CreateIssueInput]) -> Result<BatchCreateResult> {
        let response = self.graphql(&batch_create_mutation(inputs)).await?;
        let result = parse_batch_response(&response, inputs.len())?;
        let errors = graphql_errors(&response);
        if !errors.is_empty() {
            warn!(
                created = result.created_count(),
                requested = inputs.len(),
                errors = %errors.join("; "),
                "batch create returned partial errors"
            );
        }
        Ok(result)
    }

    async fn create_sub_issue_relationships(&self, parent_id: &str, child_ids: &[String]) -> Result<()> {
        if child_ids.is_empty() {
            return Ok(());
        }
        let response = self.graphql(&sub_issue_mutation(parent_id, child_ids)).await?;
        let errors = graphql_errors(&response);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GhError::GraphQl(errors).into())
        }
    }

    async fn find_existing_issue(&self, title: &str) -> Result<Option<u64>> {
        let repo = self.repository.to_string();
        let stdout = self
            .run(
                &[
                    "search", "issues", title, "--repo", repo.as_str(), "--match", "title", "--json",
                    "number,title", "--limit", SEARCH_LIMIT,
                ],
                false,
            )
            .await?;
        Ok(parse_search_results(&stdout, title)?)
    }

    async fn discover_issue_types(&self) -> Result<Vec<IssueTypeTemplate>> {
        let response = self.graphql(&issue_types_query(&self.repository)).await?;
        Ok(parse_issue_types(&response)?)
    }
}

// ---------------------------------------------------------------------------
// Query builders
// ---------------------------------------------------------------------------

/// Escape `value` as a GraphQL string literal, quotes included.
fn literal(value: &str) -> String {
    // JSON string escaping is a subset of GraphQL string escaping.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_owned())
}

fn create_issue_fields(input: &CreateIssueInput) -> String {
    format!(
        "repositoryId: {}, title: {}, body: {}, issueTypeId: {}",
        literal(&input.repository_id),
        literal(&input.title),
        literal(&input.body),
        literal(&input.issue_type),
    )
}

pub fn repository_id_query(repository: &Repository) -> String {
    format!(
        "query {{ repository(owner: {}, name: {}) {{ id }} }}",
        literal(&repository.owner),
        literal(&repository.name),
    )
}

pub fn issue_types_query(repository: &Repository) -> String {
    format!(
        "query {{ repository(owner: {}, name: {}) {{ issueTypes(first: 50) {{ nodes {{ id name }} }} }} }}",
        literal(&repository.owner),
        literal(&repository.name),
    )
}

pub fn create_issue_mutation(input: &CreateIssueInput) -> String {
    format!(
        "mutation {{ createIssue(input: {{ {} }}) {{ issue {{ number id title url }} }} }}",
        create_issue_fields(input)
    )
}

/// One aliased `createIssue` per input, `issue0` through `issue{n-1}`.
pub fn batch_create_mutation(inputs: &[CreateIssueInput]) -> String {
    let body: Vec<String> = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            format!(
                "{}: createIssue(input: {{ {} }}) {{ issue {{ number id }} }}",
                batch_alias(i),
                create_issue_fields(input)
            )
        })
        .collect();
    format!("mutation {{\n  {}\n}}", body.join("\n  "))
}

/// One aliased `addSubIssue` per child.
pub fn sub_issue_mutation(parent_id: &str, child_ids: &[String]) -> String {
    let parent = literal(parent_id);
    let body: Vec<String> = child_ids
        .iter()
        .enumerate()
        .map(|(i, child)| {
            format!(
                "link{i}: addSubIssue(input: {{ issueId: {parent}, subIssueId: {} }}) {{ issue {{ id }} }}",
                literal(child)
            )
        })
        .collect();
    format!("mutation {{\n  {}\n}}", body.join("\n  "))
}

// ---------------------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------------------

/// Messages from the response's top-level `errors` array.
pub fn graphql_errors(response: &Value) -> Vec<String> {
    response
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The `data` object, or the reported errors when it is absent.
fn data(response: &Value) -> Result<&Value, GhError> {
    match response.get("data") {
        Some(data) if data.is_object() => Ok(data),
        _ => {
            let errors = graphql_errors(response);
            if errors.is_empty() {
                Err(GhError::Malformed("response has no data".to_owned()))
            } else {
                Err(GhError::GraphQl(errors))
            }
        }
    }
}

fn issue_from(value: &Value) -> Option<CreatedIssue> {
    serde_json::from_value(value.clone()).ok()
}

pub fn parse_repository_id(response: &Value) -> Result<String, GhError> {
    data(response)?
        .pointer("/repository/id")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| match graphql_errors(response) {
            errors if !errors.is_empty() => GhError::GraphQl(errors),
            _ => GhError::Malformed("repository id missing".to_owned()),
        })
}

pub fn parse_created_issue(response: &Value) -> Result<CreatedIssue, GhError> {
    data(response)?
        .pointer("/createIssue/issue")
        .and_then(issue_from)
        .ok_or_else(|| match graphql_errors(response) {
            errors if !errors.is_empty() => GhError::GraphQl(errors),
            _ => GhError::Malformed("createIssue returned no issue".to_owned()),
        })
}

/// Collect every alias that produced an issue. Missing aliases are left out.
pub fn parse_batch_response(response: &Value, count: usize) -> Result<BatchCreateResult, GhError> {
    let data = data(response)?;
    let mut result = BatchCreateResult::default();
    for i in 0..count {
        if let Some(issue) = data.get(batch_alias(i)).and_then(|v| v.get("issue")).and_then(issue_from) {
            result.insert(i, issue);
        }
    }
    Ok(result)
}

pub fn parse_issue_types(response: &Value) -> Result<Vec<IssueTypeTemplate>, GhError> {
    let nodes = data(response)?
        .pointer("/repository/issueTypes/nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| GhError::Malformed("issueTypes missing".to_owned()))?;
    Ok(nodes
        .iter()
        .filter_map(|node| serde_json::from_value(node.clone()).ok())
        .collect())
}

/// Number of the first search hit whose title equals `title` exactly.
pub fn parse_search_results(stdout: &str, title: &str) -> Result<Option<u64>, GhError> {
    let hits: Vec<Value> = serde_json::from_str(stdout).map_err(|e| GhError::Malformed(e.to_string()))?;
    Ok(hits.iter().find_map(|hit| {
        let matches = hit.get("title").and_then(Value::as_str) == Some(title);
        if matches { hit.get("number").and_then(Value::as_u64) } else { None }
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn input(title: &str) -> CreateIssueInput {
        CreateIssueInput {
            title: title.to_owned(),
            body: "line one\nline \"two\"".to_owned(),
            issue_type: "IT_task".to_owned(),
            repository_id: "R_1".to_owned(),
        }
    }

    #[test]
    fn literals_escape_quotes_and_newlines() {
        assert_eq!(literal("a \"b\"\nc\\"), r#""a \"b\"\nc\\""#);
    }

    #[test]
    fn batch_mutation_aliases_each_input() {
        let query = batch_create_mutation(&[input("First"), input("Second")]);
        assert!(query.starts_with("mutation {"));
        assert!(query.contains("issue0: createIssue(input: { repositoryId: \"R_1\", title: \"First\""));
        assert!(query.contains("issue1: createIssue(input: { repositoryId: \"R_1\", title: \"Second\""));
        assert!(query.contains(r#"body: "line one\nline \"two\"""#));
        assert!(query.contains("issueTypeId: \"IT_task\""));
        assert!(!query.contains("issue2:"));
    }

    #[test]
    fn sub_issue_mutation_has_one_alias_per_child() {
        let query = sub_issue_mutation("I_parent", &["I_a".to_owned(), "I_b".to_owned()]);
        assert!(query.contains("link0: addSubIssue(input: { issueId: \"I_parent\", subIssueId: \"I_a\" })"));
        assert!(query.contains("link1: addSubIssue(input: { issueId: \"I_parent\", subIssueId: \"I_b\" })"));
    }

    #[test]
    fn repository_queries_name_the_repository() {
        let repo = Repository::new("acme", "widgets");
        assert!(repository_id_query(&repo).contains("repository(owner: \"acme\", name: \"widgets\")"));
        assert!(issue_types_query(&repo).contains("issueTypes(first: 50)"));
    }

    #[test]
    fn parses_single_created_issue() {
        let response = json!({
            "data": { "createIssue": { "issue": {
                "number": 42, "id": "I_42", "title": "T", "url": "https://example.test/42"
            } } }
        });
        let issue = parse_created_issue(&response).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.id, "I_42");
        assert_eq!(issue.url.as_deref(), Some("https://example.test/42"));
    }

    #[test]
    fn single_create_errors_surface_messages() {
        let response = json!({ "data": null, "errors": [{ "message": "type not found" }] });
        let err = parse_created_issue(&response).unwrap_err();
        assert!(matches!(err, GhError::GraphQl(ref m) if m == &["type not found"]));
    }

    #[test]
    fn batch_response_skips_missing_aliases() {
        let response = json!({
            "data": {
                "issue0": { "issue": { "number": 1, "id": "I_1" } },
                "issue1": null,
                "issue2": { "issue": { "number": 3, "id": "I_3" } }
            },
            "errors": [{ "message": "title too long", "path": ["issue1"] }]
        });
        let result = parse_batch_response(&response, 3).unwrap();
        assert_eq!(result.created_count(), 2);
        assert_eq!(result.issue_for(0).map(|i| i.number), Some(1));
        assert!(result.issue_for(1).is_none());
        assert_eq!(result.issue_for(2).map(|i| i.id.as_str()), Some("I_3"));
        assert_eq!(graphql_errors(&response), vec!["title too long"]);
    }

    #[test]
    fn batch_response_without_data_is_an_error() {
        let response = json!({ "errors": [{ "message": "bad credentials" }] });
        assert!(matches!(parse_batch_response(&response, 2), Err(GhError::GraphQl(_))));
        assert!(matches!(parse_batch_response(&json!({}), 2), Err(GhError::Malformed(_))));
    }

    #[test]
    fn parses_issue_types_and_repository_id() {
        let types = json!({ "data": { "repository": { "issueTypes": { "nodes": [
            { "id": "IT_1", "name": "Task" },
            { "id": "IT_2", "name": "Bug" }
        ] } } } });
        let templates = parse_issue_types(&types).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].name, "Bug");

        let repo = json!({ "data": { "repository": { "id": "R_kgDO" } } });
        assert_eq!(parse_repository_id(&repo).unwrap(), "R_kgDO");
    }

    #[test]
    fn search_requires_exact_title() {
        let stdout = r#"[{"number": 5, "title": "Setup CI pipeline"}, {"number": 6, "title": "Setup CI"}]"#;
        assert_eq!(parse_search_results(stdout, "Setup CI").unwrap(), Some(6));
        assert_eq!(parse_search_results(stdout, "setup ci").unwrap(), None);
        assert_eq!(parse_search_results("[]", "x").unwrap(), None);
        assert!(parse_search_results("not json", "x").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let tracker = GhTracker::with_binary(
            "/nonexistent/plansync-gh-binary",
            Repository::new("acme", "widgets"),
        );
        let err = tracker.repository_id().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<GhError>(), Some(GhError::Spawn { .. })));
    }
}
