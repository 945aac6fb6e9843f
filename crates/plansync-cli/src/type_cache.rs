//! Project-local cache of discovered issue types.
//!
//! `discover-types` writes `<dir>/.plansync/issue-types.json`; `convert` and
//! `create-issue` read it back so live type ids do not have to be looked up
//! on every run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use plansync_core::tracker::IssueTypeMap;

const CACHE_DIR: &str = ".plansync";
const CACHE_FILE: &str = "issue-types.json";

pub fn cache_path(dir: &Path) -> PathBuf {
    dir.join(CACHE_DIR).join(CACHE_FILE)
}

/// Read the cache under `dir`. A missing cache is `None`.
pub fn load(dir: &Path) -> Result<Option<IssueTypeMap>> {
    let path = cache_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read issue type cache at {}", path.display()))?;
    let map = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse issue type cache at {}", path.display()))?;
    Ok(Some(map))
}

/// Write the cache under `dir` and return its path.
pub fn save(dir: &Path, types: &IssueTypeMap) -> Result<PathBuf> {
    let path = cache_path(dir);
    let parent = dir.join(CACHE_DIR);
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let contents = serde_json::to_string_pretty(types).context("failed to serialize issue types")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write issue type cache at {}", path.display()))?;
    Ok(path)
}

/// Layer `overrides` on top of `base`; later layers win per key.
pub fn merge(base: &IssueTypeMap, overrides: &[Option<&IssueTypeMap>]) -> IssueTypeMap {
    let mut merged = base.clone();
    for layer in overrides.iter().flatten() {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> IssueTypeMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn missing_cache_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let types = map(&[("task", "IT_1"), ("bug", "IT_2")]);

        let path = save(tmp.path(), &types).unwrap();
        assert!(path.ends_with(".plansync/issue-types.json"));
        assert_eq!(load(tmp.path()).unwrap(), Some(types));
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".plansync")).unwrap();
        std::fs::write(cache_path(tmp.path()), "{not json").unwrap();
        assert!(load(tmp.path()).is_err());
    }

    #[test]
    fn later_layers_win() {
        let base = map(&[("task", "IT_base"), ("bug", "IT_bug")]);
        let cache = map(&[("task", "IT_cache")]);
        let file = map(&[("doc", "IT_doc")]);

        let merged = merge(&base, &[Some(&cache), None, Some(&file)]);
        assert_eq!(merged, map(&[("bug", "IT_bug"), ("doc", "IT_doc"), ("task", "IT_cache")]));
    }
}
