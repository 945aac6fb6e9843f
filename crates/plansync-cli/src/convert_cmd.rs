//! CLI handler for `plansync convert`.
//!
//! Reads a markdown outline, parses it into a plan document, and writes the
//! document as YAML next to the input (or to an explicit output path).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use plansync_core::ImplementationPlan;
use plansync_core::plan::{OutlineParser, PlanStore};
use plansync_core::repo::resolve_repository;
use plansync_core::tracker::IssueTypeMap;

use crate::config::PlansyncConfig;
use crate::type_cache;

pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub types: Option<PathBuf>,
    pub dir: PathBuf,
}

impl ConvertOptions {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("yaml"))
    }
}

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub fn run_convert(config: &PlansyncConfig, options: &ConvertOptions) -> Result<()> {
    let (plan, output) = convert(config, options)?;
    print_summary(&plan, &output);
    Ok(())
}

/// Parse the outline and write the plan document. Returns the plan and the
/// path it was written to.
pub fn convert(config: &PlansyncConfig, options: &ConvertOptions) -> Result<(ImplementationPlan, PathBuf)> {
    let output = options.output_path();
    if output == options.input {
        bail!(
            "output path {} would overwrite the input outline",
            output.display()
        );
    }

    let markdown = std::fs::read_to_string(&options.input)
        .with_context(|| format!("failed to read outline: {}", options.input.display()))?;

    let issue_types = resolve_issue_types(config, options)?;
    let repository = resolve_repository(options.owner.as_deref(), options.repo.as_deref(), &options.dir);

    let plan = OutlineParser::new()
        .with_depth_types(config.depth_types.clone())
        .with_issue_types(issue_types)
        .parse(&markdown, repository);

    PlanStore::new(&output)
        .save(&plan)
        .with_context(|| format!("failed to write plan: {}", output.display()))?;

    Ok((plan, output))
}

/// Config table, then the discovery cache, then an explicit `--types` file.
fn resolve_issue_types(config: &PlansyncConfig, options: &ConvertOptions) -> Result<IssueTypeMap> {
    let cached = type_cache::load(&options.dir)?;
    let explicit = match &options.types {
        Some(path) => Some(read_types_file(path)?),
        None => None,
    };
    Ok(type_cache::merge(
        &config.issue_types,
        &[cached.as_ref(), explicit.as_ref()],
    ))
}

fn read_types_file(path: &Path) -> Result<IssueTypeMap> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read issue types file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse issue types file: {}", path.display()))
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn type_counts(plan: &ImplementationPlan) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for item in &plan.items {
        *counts.entry(item.item_type.as_str()).or_insert(0) += 1;
    }
    counts
}

fn print_summary(plan: &ImplementationPlan, output: &Path) {
    println!("Plan written to {}", output.display());
    println!("  Project:    {}", plan.project.name);
    println!("  Repository: {}", plan.project.repository);
    println!("  Items:      {}", plan.items.len());
    for (item_type, count) in type_counts(plan) {
        println!("    {item_type:<10} {count}");
    }

    let unmapped: Vec<&str> = type_counts(plan)
        .into_keys()
        .filter(|ty| !plan.issue_types.contains_key(*ty))
        .collect();
    if !unmapped.is_empty() {
        println!();
        println!(
            "No issue type id for: {}. Run `plansync discover-types` or add [issue_types] to the config.",
            unmapped.join(", ")
        );
    }

    let preassigned = plan.issued_count();
    if preassigned > 0 {
        println!("  {preassigned} item(s) already reference existing issues and will be skipped on sync.");
    }
}

#[cfg(test)]
mod tests {
    use plansync_core::plan::DepthTypeTable;

    use super::*;

    const OUTLINE: &str = "\
# Demo Implementation Plan

## Phase 1: Foundation

### Epic 1.1: Setup

1. **Task**: Configure environment
2. **Bug**: [#12] Fix flaky build
";

    fn config() -> PlansyncConfig {
        PlansyncConfig {
            gh_binary: "gh".to_string(),
            rate_limit_ms: 0,
            depth_types: DepthTypeTable::default(),
            issue_types: BTreeMap::from([
                ("phase".to_string(), "IT_phase".to_string()),
                ("task".to_string(), "IT_config_task".to_string()),
            ]),
        }
    }

    fn options(dir: &Path) -> ConvertOptions {
        let input = dir.join("plan.md");
        std::fs::write(&input, OUTLINE).unwrap();
        ConvertOptions {
            input,
            output: None,
            owner: Some("acme".to_string()),
            repo: Some("widgets".to_string()),
            types: None,
            dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn writes_yaml_next_to_input() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (plan, output) = convert(&config(), &options(tmp.path())).unwrap();

        assert_eq!(output, tmp.path().join("plan.yaml"));
        assert_eq!(plan.project.name, "Demo");
        assert_eq!(plan.project.repository.to_string(), "acme/widgets");
        assert_eq!(plan.items.len(), 4);

        let reloaded = PlanStore::new(&output).load().unwrap();
        assert_eq!(reloaded, plan);
        assert_eq!(reloaded.issued_count(), 1);
    }

    #[test]
    fn cache_and_types_file_layer_over_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        type_cache::save(
            tmp.path(),
            &BTreeMap::from([("task".to_string(), "IT_cached_task".to_string())]),
        )
        .unwrap();
        let types_file = tmp.path().join("types.json");
        std::fs::write(&types_file, r#"{"bug": "IT_file_bug"}"#).unwrap();

        let mut opts = options(tmp.path());
        opts.types = Some(types_file);
        let (plan, _) = convert(&config(), &opts).unwrap();

        assert_eq!(plan.issue_types.get("phase").map(String::as_str), Some("IT_phase"));
        assert_eq!(plan.issue_types.get("task").map(String::as_str), Some("IT_cached_task"));
        assert_eq!(plan.issue_types.get("bug").map(String::as_str), Some("IT_file_bug"));
    }

    #[test]
    fn refuses_to_overwrite_input() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.output = Some(opts.input.clone());
        let err = convert(&config(), &opts).unwrap_err();
        assert!(err.to_string().contains("would overwrite"));
    }

    #[test]
    fn missing_input_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.input = tmp.path().join("absent.md");
        let err = convert(&config(), &opts).unwrap_err();
        assert!(err.to_string().contains("failed to read outline"));
    }

    #[test]
    fn counts_items_per_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (plan, _) = convert(&config(), &options(tmp.path())).unwrap();
        let counts = type_counts(&plan);
        assert_eq!(counts.get("phase"), Some(&1));
        assert_eq!(counts.get("epic"), Some(&1));
        assert_eq!(counts.get("task"), Some(&1));
        assert_eq!(counts.get("bug"), Some(&1));
    }
}
