//! Configuration file management for plansync.
//!
//! Provides a TOML-based config file at `~/.config/plansync/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use plansync_core::ItemType;
use plansync_core::plan::DepthTypeTable;
use plansync_core::sync::DEFAULT_DELAY;
use plansync_core::tracker::IssueTypeMap;

const DEFAULT_GH_BINARY: &str = "gh";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub outline: OutlineSection,
    /// Static item type to tracker issue type id overrides.
    #[serde(default)]
    pub issue_types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSection {
    #[serde(default = "default_gh_binary")]
    pub gh_binary: String,
    /// Pause after each single create call.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            gh_binary: default_gh_binary(),
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Header depth (as a string key, `"0"` for `##`) to item type name.
    #[serde(default = "default_depth_types")]
    pub depth_types: BTreeMap<String, String>,
}

impl Default for OutlineSection {
    fn default() -> Self {
        Self {
            depth_types: default_depth_types(),
        }
    }
}

fn default_gh_binary() -> String {
    DEFAULT_GH_BINARY.to_string()
}

fn default_rate_limit_ms() -> u64 {
    DEFAULT_DELAY.as_millis() as u64
}

fn default_depth_types() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("0".to_string(), ItemType::Phase.to_string()),
        ("1".to_string(), ItemType::Epic.to_string()),
        ("2".to_string(), ItemType::Feature.to_string()),
    ])
}

impl OutlineSection {
    /// Parse the string-keyed table into a [`DepthTypeTable`].
    pub fn depth_table(&self) -> Result<DepthTypeTable> {
        let mut table = DepthTypeTable::empty();
        for (depth, name) in &self.depth_types {
            let depth: usize = depth
                .parse()
                .with_context(|| format!("invalid header depth in outline.depth_types: {depth:?}"))?;
            let item_type: ItemType = name
                .parse()
                .with_context(|| format!("invalid item type for depth {depth} in outline.depth_types"))?;
            table = table.with(depth, item_type);
        }
        Ok(table)
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plansync config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plansync` or `~/.config/plansync`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plansync");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plansync")
}

/// Return the path to the plansync config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct PlansyncConfig {
    pub gh_binary: String,
    pub rate_limit_ms: u64,
    pub depth_types: DepthTypeTable,
    pub issue_types: IssueTypeMap,
}

impl PlansyncConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - gh binary: `cli_gh_binary` > `PLANSYNC_GH_BINARY` env > `tracker.gh_binary` > `gh`
    /// - rate limit: `cli_rate_limit_ms` > `PLANSYNC_RATE_LIMIT_MS` env > `tracker.rate_limit_ms` > 1000
    ///
    /// A missing config file means defaults; a malformed one is an error.
    pub fn resolve(cli_gh_binary: Option<&str>, cli_rate_limit_ms: Option<u64>) -> Result<Self> {
        let file_config = if config_path().exists() {
            load_config()?
        } else {
            ConfigFile::default()
        };

        let gh_binary = if let Some(binary) = cli_gh_binary {
            binary.to_string()
        } else if let Ok(binary) = std::env::var("PLANSYNC_GH_BINARY") {
            binary
        } else {
            file_config.tracker.gh_binary.clone()
        };

        let rate_limit_ms = if let Some(ms) = cli_rate_limit_ms {
            ms
        } else if let Ok(ms) = std::env::var("PLANSYNC_RATE_LIMIT_MS") {
            ms.parse()
                .with_context(|| format!("PLANSYNC_RATE_LIMIT_MS is not a number: {ms:?}"))?
        } else {
            file_config.tracker.rate_limit_ms
        };

        Ok(Self {
            gh_binary,
            rate_limit_ms,
            depth_types: file_config.outline.depth_table()?,
            issue_types: file_config.issue_types,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point `XDG_CONFIG_HOME` at a temp dir for the duration of `f`.
    fn with_config_home<T>(f: impl FnOnce(&std::path::Path) -> T) -> T {
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let out = f(tmp.path());

        match orig {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        out
    }

    #[test]
    fn default_config_serializes_every_section() {
        let text = toml::to_string_pretty(&ConfigFile::default()).unwrap();
        assert!(text.contains("[tracker]"));
        assert!(text.contains("gh_binary = \"gh\""));
        assert!(text.contains("rate_limit_ms = 1000"));
        assert!(text.contains("[outline.depth_types]"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: ConfigFile = toml::from_str("[tracker]\nrate_limit_ms = 250\n").unwrap();
        assert_eq!(config.tracker.rate_limit_ms, 250);
        assert_eq!(config.tracker.gh_binary, "gh");
        assert_eq!(config.outline, OutlineSection::default());
        assert!(config.issue_types.is_empty());
    }

    #[test]
    fn depth_table_parses_keys_and_types() {
        let section = OutlineSection {
            depth_types: BTreeMap::from([
                ("0".to_string(), "phase".to_string()),
                ("1".to_string(), "Project".to_string()),
            ]),
        };
        let table = section.depth_table().unwrap();
        assert_eq!(table.type_for(0), Some(ItemType::Phase));
        assert_eq!(table.type_for(1), Some(ItemType::Project));
        assert_eq!(table.type_for(2), None);
    }

    #[test]
    fn depth_table_rejects_bad_entries() {
        let bad_depth = OutlineSection {
            depth_types: BTreeMap::from([("one".to_string(), "epic".to_string())]),
        };
        assert!(bad_depth.depth_table().is_err());

        let bad_type = OutlineSection {
            depth_types: BTreeMap::from([("0".to_string(), "saga".to_string())]),
        };
        assert!(bad_type.depth_table().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_writes_owner_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        with_config_home(|home| {
            save_config(&ConfigFile::default()).unwrap();
            let path = home.join("plansync").join("config.toml");
            let meta = std::fs::metadata(&path).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
            assert_eq!(load_config().unwrap(), ConfigFile::default());
        });
    }

    #[test]
    fn resolve_with_cli_flags_overrides_all() {
        let _lock = lock_env();
        unsafe { std::env::set_var("PLANSYNC_GH_BINARY", "/env/gh") };
        unsafe { std::env::set_var("PLANSYNC_RATE_LIMIT_MS", "5") };

        let config = with_config_home(|_| PlansyncConfig::resolve(Some("/cli/gh"), Some(0)).unwrap());
        assert_eq!(config.gh_binary, "/cli/gh");
        assert_eq!(config.rate_limit_ms, 0);

        unsafe { std::env::remove_var("PLANSYNC_GH_BINARY") };
        unsafe { std::env::remove_var("PLANSYNC_RATE_LIMIT_MS") };
    }

    #[test]
    fn resolve_with_env_vars_overrides_config_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var("PLANSYNC_GH_BINARY", "/env/gh") };
        unsafe { std::env::set_var("PLANSYNC_RATE_LIMIT_MS", "5") };

        let config = with_config_home(|home| {
            let dir = home.join("plansync");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("config.toml"),
                "[tracker]\ngh_binary = \"/file/gh\"\nrate_limit_ms = 77\n",
            )
            .unwrap();
            PlansyncConfig::resolve(None, None).unwrap()
        });
        assert_eq!(config.gh_binary, "/env/gh");
        assert_eq!(config.rate_limit_ms, 5);

        unsafe { std::env::remove_var("PLANSYNC_GH_BINARY") };
        unsafe { std::env::remove_var("PLANSYNC_RATE_LIMIT_MS") };
    }

    #[test]
    fn resolve_reads_config_file() {
        let _lock = lock_env();
        unsafe { std::env::remove_var("PLANSYNC_GH_BINARY") };
        unsafe { std::env::remove_var("PLANSYNC_RATE_LIMIT_MS") };

        let config = with_config_home(|home| {
            let dir = home.join("plansync");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("config.toml"),
                "[tracker]\ngh_binary = \"/file/gh\"\nrate_limit_ms = 77\n\n\
                 [outline.depth_types]\n0 = \"project\"\n\n[issue_types]\ntask = \"IT_file_task\"\n",
            )
            .unwrap();
            PlansyncConfig::resolve(None, None).unwrap()
        });
        assert_eq!(config.gh_binary, "/file/gh");
        assert_eq!(config.rate_limit_ms, 77);
        assert_eq!(config.depth_types.type_for(0), Some(ItemType::Project));
        assert_eq!(config.depth_types.type_for(1), None);
        assert_eq!(config.issue_types.get("task").map(String::as_str), Some("IT_file_task"));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        unsafe { std::env::remove_var("PLANSYNC_GH_BINARY") };
        unsafe { std::env::remove_var("PLANSYNC_RATE_LIMIT_MS") };

        let config = with_config_home(|_| PlansyncConfig::resolve(None, None).unwrap());
        assert_eq!(config.gh_binary, "gh");
        assert_eq!(config.rate_limit_ms, 1000);
        assert_eq!(config.depth_types, DepthTypeTable::default());
    }

    #[test]
    fn resolve_rejects_non_numeric_rate_limit() {
        let _lock = lock_env();
        unsafe { std::env::set_var("PLANSYNC_RATE_LIMIT_MS", "fast") };

        let result = with_config_home(|_| PlansyncConfig::resolve(None, None));

        unsafe { std::env::remove_var("PLANSYNC_RATE_LIMIT_MS") };
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("PLANSYNC_RATE_LIMIT_MS"), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("plansync/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
