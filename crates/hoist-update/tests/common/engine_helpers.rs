//! Engine and installation setup helpers

use hoist_core::types::{RetryPolicy, RetryStrategy};
use hoist_core::SemanticVersion;
use hoist_update::{
    EngineConfig, HistoryStore, Installer, MemoryHistoryStore, Platform, RepoId, TrustSet,
    UpdateEngine,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::builders::{public_key_base64, signing_key};
use super::constants::*;
use super::mock_transport::MockTransport;

pub fn v(s: &str) -> SemanticVersion {
    SemanticVersion::parse(s).unwrap()
}

/// Retries without delay so failure tests stay fast
pub fn instant_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        strategy: RetryStrategy::None,
        ..RetryPolicy::default()
    }
}

pub fn linux_x86_64() -> Platform {
    Platform {
        os: "linux".to_string(),
        arch: "x86_64".to_string(),
    }
}

/// Config for an installation at `root`, currently at 1.0.0
pub fn engine_config(root: &Path) -> EngineConfig {
    let mut config = EngineConfig::new(RepoId::new(TEST_OWNER, TEST_REPO), root);
    config.current_version = Some(v(VERSION_1_0_0));
    config.download_retry = instant_retry(2);
    config.list_retry = instant_retry(2);
    config.download_timeout = Duration::from_secs(10);
    config.request_timeout = Duration::from_secs(10);
    config.platform = linux_x86_64();
    config
}

pub fn trust_set() -> TrustSet {
    TrustSet::new().with_key(TRUSTED_KEY_NAME, signing_key(TRUSTED_SEED).verifying_key())
}

pub struct Harness {
    pub engine: UpdateEngine,
    pub transport: Arc<MockTransport>,
    pub history: Arc<MemoryHistoryStore>,
}

pub fn harness(config: EngineConfig, transport: MockTransport) -> Harness {
    let transport = Arc::new(transport);
    let history = Arc::new(MemoryHistoryStore::new());
    let engine = UpdateEngine::new(config, transport.clone(), history.clone());
    Harness {
        engine,
        transport,
        history,
    }
}

impl Harness {
    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.engine = self.engine.with_installer(installer);
        self
    }

    pub fn attempts(&self) -> Vec<hoist_update::UpdateAttempt> {
        self.history.query(100).unwrap()
    }
}

/// Lay down a 1.0.0 installation as a plain directory
pub fn install_old_version(root: &Path) {
    let current = root.join("current");
    fs::create_dir_all(current.join("bin")).unwrap();
    fs::write(current.join("bin/widget"), OLD_BINARY).unwrap();
    fs::write(current.join("widget.yaml"), OLD_CONFIG).unwrap();
}

/// Number of per-attempt directories left under `.staging`
pub fn leftover_staging(root: &Path) -> usize {
    match fs::read_dir(root.join(".staging")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
