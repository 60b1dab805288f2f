//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.hoist/hoist.yaml, or an explicit file)
//! 3. Environment variables (HOIST_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// File name of the user configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "hoist.yaml";

/// File name of the default attempt history inside the config directory
pub const HISTORY_FILE_NAME: &str = "history.jsonl";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.hoist)
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = env::var("HOME")
            .ok()
            .map(std::path::PathBuf::from)
            .or_else(dirs::home_dir)
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;

        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {:?}", p)))?;

        Ok(home.join(".hoist"))
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let path = self.config_dir.join(CONFIG_FILE_NAME);
        let overlay = if path.exists() {
            Some(self.load_yaml_file::<RuntimeConfig>(&path)?)
        } else {
            None
        };
        self.assemble(overlay)
    }

    /// Load runtime configuration using an explicit file in place of the user config
    pub fn load_runtime_config_from(&self, path: &Utf8Path) -> Result<RuntimeConfig> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }
        let overlay = self.load_yaml_file::<RuntimeConfig>(path)?;
        self.assemble(Some(overlay))
    }

    fn assemble(&self, overlay: Option<RuntimeConfig>) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        if let Some(overlay) = overlay {
            config = Self::merge_runtime_config(config, overlay);
        }

        config = self.apply_env_overrides(config)?;

        if config.history.path.is_none() {
            config.history.path = Some(self.config_dir.join(HISTORY_FILE_NAME).into_std_path_buf());
        }

        tracing::debug!(config_dir = %self.config_dir, repo = %config.feed.repo, "loaded runtime config");
        Ok(config)
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            network: overlay.network,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
            feed: overlay.feed,
            update: overlay.update,
            install: overlay.install,
            history: overlay.history,
        }
    }

    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Some(val) = env_value("HOIST_REQUEST_TIMEOUT_SECS") {
            config.network.request_timeout_secs = parse_env("HOIST_REQUEST_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = env_value("HOIST_DOWNLOAD_TIMEOUT_SECS") {
            config.network.download_timeout_secs = parse_env("HOIST_DOWNLOAD_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = env_value("HOIST_API_URL") {
            config.feed.api_url = val;
        }

        if let Some(val) = env_value("HOIST_REPO") {
            config.feed.repo = val;
        }

        if let Some(val) = env_value("HOIST_POLICY") {
            config.update.policy = val.parse()?;
        }

        if let Some(val) = env_value("HOIST_ASSET_HINT") {
            config.update.asset_hint = Some(val);
        }

        if let Some(val) = env_value("HOIST_ALLOW_UNVERIFIED") {
            config.update.allow_unverified = parse_bool("HOIST_ALLOW_UNVERIFIED", &val)?;
        }

        if let Some(val) = env_value("HOIST_KEEP_BACKUP") {
            config.update.keep_backup = parse_bool("HOIST_KEEP_BACKUP", &val)?;
        }

        if let Some(val) = env_value("HOIST_CURRENT_VERSION") {
            config.update.current_version = Some(val.parse()?);
        }

        if let Some(val) = env_value("HOIST_INSTALL_ROOT") {
            config.install.root = Some(val.into());
        }

        if let Some(val) = env_value("HOIST_HISTORY_PATH") {
            config.history.path = Some(val.into());
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{} must be a valid number", name)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_config(format!("{} must be true or false", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::UpdatePolicy;
    use crate::types::CommitStrategyPreference;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_temp_loader() -> (HierarchicalConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        let loader = HierarchicalConfigLoader::with_dir(config_dir);
        (loader, temp_dir)
    }

    #[test]
    #[serial]
    fn test_load_runtime_config_defaults() {
        let (loader, _temp) = create_temp_loader();
        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.request_timeout_secs, 30);
        assert_eq!(config.feed.api_url, "https://api.github.com");
        assert_eq!(config.update.policy, UpdatePolicy::Stable);
        assert_eq!(config.retry_policies.default.max_attempts, 1);
        assert_eq!(
            config.retry_policies.for_operation("download").max_attempts,
            2
        );
        assert_eq!(
            config.history.path,
            Some(loader.config_dir().join(HISTORY_FILE_NAME).into_std_path_buf())
        );
    }

    #[test]
    #[serial]
    fn test_load_runtime_config_from_file() {
        let (loader, _temp) = create_temp_loader();

        let config_content = r#"
network:
  request-timeout-secs: 10
feed:
  repo: acme/widget
update:
  policy: patch-only
  keep-backup: false
install:
  root: /opt/widget
  strategy: atomic-swap
"#;
        fs::write(loader.config_dir().join(CONFIG_FILE_NAME), config_content).unwrap();

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.request_timeout_secs, 10);
        assert_eq!(config.feed.repo, "acme/widget");
        assert_eq!(config.update.policy, UpdatePolicy::PatchOnly);
        assert!(!config.update.keep_backup);
        assert_eq!(config.install.strategy, CommitStrategyPreference::AtomicSwap);
        // Operation policies from the embedded defaults survive the merge
        assert!(config.retry_policies.operations.contains_key("download"));
    }

    #[test]
    #[serial]
    fn test_explicit_file_must_exist() {
        let (loader, temp) = create_temp_loader();
        let missing = Utf8PathBuf::from_path_buf(temp.path().join("nope.yaml")).unwrap();
        assert!(matches!(
            loader.load_runtime_config_from(&missing),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("HOIST_REPO", "env/repo");
        env::set_var("HOIST_POLICY", "allow-prerelease");
        env::set_var("HOIST_ALLOW_UNVERIFIED", "yes");
        env::set_var("HOIST_REQUEST_TIMEOUT_SECS", "5");
        env::set_var("HOIST_CURRENT_VERSION", "2.1.0");

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.feed.repo, "env/repo");
        assert_eq!(config.update.policy, UpdatePolicy::AllowPrerelease);
        assert!(config.update.allow_unverified);
        assert_eq!(config.network.request_timeout_secs, 5);
        assert_eq!(config.update.current_version.unwrap().to_string(), "2.1.0");

        env::remove_var("HOIST_REPO");
        env::remove_var("HOIST_POLICY");
        env::remove_var("HOIST_ALLOW_UNVERIFIED");
        env::remove_var("HOIST_REQUEST_TIMEOUT_SECS");
        env::remove_var("HOIST_CURRENT_VERSION");
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_an_error() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("HOIST_KEEP_BACKUP", "sometimes");
        let result = loader.load_runtime_config();
        env::remove_var("HOIST_KEEP_BACKUP");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_merge_runtime_config() {
        let base = RuntimeConfig::default();
        let mut overlay = RuntimeConfig::default();
        overlay.network.request_timeout_secs = 99;
        overlay.feed.repo = "merged/repo".to_string();
        overlay.retry_policies.operations.clear();

        let merged = HierarchicalConfigLoader::merge_runtime_config(base, overlay);
        assert_eq!(merged.network.request_timeout_secs, 99);
        assert_eq!(merged.feed.repo, "merged/repo");
        assert!(merged.retry_policies.operations.contains_key("download"));
    }
}
