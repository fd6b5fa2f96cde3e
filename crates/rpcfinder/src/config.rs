//! Configuration for rpcfinder.
//!
//! Loads settings from `.rpcfinder.toml` in the project root, with
//! `RPCFINDER_*` environment variables layered on top.
//! Uses figment for layered configuration with provenance tracking.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the per-project config file.
pub const CONFIG_FILE_NAME: &str = ".rpcfinder.toml";

/// Directories that never hold project-owned contract implementations.
///
/// Build output and IDE metadata are skipped both when walking the tree and
/// when deciding whether a class belongs to the project.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".idea", "out", "build", "target", ".git", "node_modules"];

/// rpcfinder configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Additional directories to exclude (merged with defaults).
    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Annotation that marks an interface as an RPC contract.
    /// Matched on simple name unless both sides are qualified.
    #[serde(default = "default_contract_tag")]
    pub contract_tag: String,

    /// Source file extensions to watch and parse, without the dot.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    /// Change batches at least this large trigger a full rescan.
    #[serde(default = "default_full_rescan_threshold")]
    pub full_rescan_threshold: usize,

    /// Maximum number of recently selected methods to remember.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Debounce window for file-system events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Whether to respect .gitignore files when walking sources (default: true).
    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,

    /// How often the indexing thread re-checks a provider that is not ready,
    /// in milliseconds.
    #[serde(default = "default_provider_poll_ms")]
    pub provider_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            contract_tag: default_contract_tag(),
            source_extensions: default_source_extensions(),
            full_rescan_threshold: default_full_rescan_threshold(),
            history_limit: default_history_limit(),
            debounce_ms: default_debounce_ms(),
            respect_gitignore: default_respect_gitignore(),
            provider_poll_ms: default_provider_poll_ms(),
        }
    }
}

fn default_contract_tag() -> String {
    "BaijiContract".to_string()
}

fn default_source_extensions() -> Vec<String> {
    vec!["java".to_string()]
}

fn default_full_rescan_threshold() -> usize {
    10
}

fn default_history_limit() -> usize {
    100
}

fn default_debounce_ms() -> u64 {
    crate::watch::DEFAULT_DEBOUNCE_DURATION.as_millis() as u64
}

fn default_respect_gitignore() -> bool {
    true
}

fn default_provider_poll_ms() -> u64 {
    250
}

impl Config {
    /// Load configuration from `.rpcfinder.toml` in the given root directory.
    ///
    /// Returns default config if the file doesn't exist. Parse errors are
    /// logged with file, line, and key information and also fall back to
    /// defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE_NAME);

        // Build layered config: defaults <- toml file <- environment
        let figment = Figment::from(Serialized::defaults(Config::default()));

        let figment = if config_path.exists() {
            figment.merge(Toml::file(&config_path))
        } else {
            figment
        };

        let figment = figment.merge(Env::prefixed("RPCFINDER_"));

        match figment.extract::<Config>() {
            Ok(config) => {
                if config_path.exists() {
                    tracing::info!("Loaded config from {:?}", config_path);
                }
                config.sanitized()
            }
            Err(e) => {
                tracing::warn!("Config error: {}", e);
                Self::default()
            }
        }
    }

    /// All directories to exclude (defaults + user-configured).
    pub fn excluded_dirs(&self) -> Vec<&str> {
        let mut dirs: Vec<&str> = DEFAULT_EXCLUDE_DIRS.to_vec();
        for dir in &self.exclude_dirs {
            if !dirs.contains(&dir.as_str()) {
                dirs.push(dir.as_str());
            }
        }
        dirs
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn provider_poll(&self) -> Duration {
        Duration::from_millis(self.provider_poll_ms)
    }

    /// Strip leading dots from extensions and reject zero thresholds and intervals.
    fn sanitized(mut self) -> Self {
        for ext in &mut self.source_extensions {
            if let Some(stripped) = ext.strip_prefix('.') {
                *ext = stripped.to_string();
            }
        }
        if self.full_rescan_threshold == 0 {
            tracing::warn!("full_rescan_threshold must be positive, using default");
            self.full_rescan_threshold = default_full_rescan_threshold();
        }
        if self.provider_poll_ms == 0 {
            tracing::warn!("provider_poll_ms must be positive, using default");
            self.provider_poll_ms = default_provider_poll_ms();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.exclude_dirs.is_empty());
        assert_eq!(config.contract_tag, "BaijiContract");
        assert_eq!(config.full_rescan_threshold, 10);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.debounce(), Duration::from_millis(200));
        assert_eq!(config.provider_poll(), Duration::from_millis(250));

        let excluded = config.excluded_dirs();
        assert!(excluded.contains(&".idea"));
        assert!(excluded.contains(&"out"));
        assert!(excluded.contains(&"build"));
    }

    #[test]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config() {
        let temp = TempDir::new().unwrap();
        let config_content = r#"
exclude_dirs = ["generated", "vendor"]
contract_tag = "com.ctriposs.baiji.rpc.common.BaijiContract"
full_rescan_threshold = 25
"#;
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), config_content).unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.exclude_dirs, vec!["generated", "vendor"]);
        assert_eq!(config.contract_tag, "com.ctriposs.baiji.rpc.common.BaijiContract");
        assert_eq!(config.full_rescan_threshold, 25);

        let excluded = config.excluded_dirs();
        assert!(excluded.contains(&"generated"));
        assert!(excluded.contains(&".idea")); // default still present
    }

    #[test]
    fn test_invalid_config_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let config_content = r#"
history_limit = "lots"
"#;
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), config_content).unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.history_limit, 100);
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "respect_gitignore = false\n").unwrap();

        let config = Config::load(temp.path());
        assert!(!config.respect_gitignore);
        assert_eq!(config.contract_tag, "BaijiContract");
        assert_eq!(config.source_extensions, vec!["java"]);
    }

    #[test]
    fn test_extensions_are_normalized() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "source_extensions = [\".java\", \"kt\"]\nfull_rescan_threshold = 0\nprovider_poll_ms = 0\n",
        )
        .unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.source_extensions, vec!["java", "kt"]);
        assert_eq!(config.full_rescan_threshold, 10);
        assert_eq!(config.provider_poll_ms, 250);
    }
}
