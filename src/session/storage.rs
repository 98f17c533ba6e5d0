// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Durable client-side storage for the session record
//!
//! Models the browser's single-key persistent store. Save failures are
//! logged and swallowed - losing a preference write must never break a
//! navigation - and unreadable records behave as missing.

use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::warn;

use crate::session::config::ProxySessionConfig;

/// Key the session record is stored under
pub const CONFIG_STORAGE_KEY: &str = "vela_proxy_config";

/// Single-key durable store
pub trait ConfigStore: Send + Sync {
    /// Read the raw stored record, if any
    fn load_raw(&self) -> Option<String>;

    /// Persist the raw record
    fn save_raw(&self, raw: &str);

    /// Load the session config, field-wise validated
    fn load(&self) -> ProxySessionConfig {
        match self.load_raw() {
            Some(raw) => ProxySessionConfig::from_json_lossy(&raw),
            None => ProxySessionConfig::default(),
        }
    }

    /// Save the session config
    fn save(&self, config: &ProxySessionConfig) {
        self.save_raw(&config.to_json());
    }
}

/// File-backed store
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store over a JSON file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under a conventional per-user location inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let mut path = dir.into();
        path.push(format!("{}.json", CONFIG_STORAGE_KEY));
        Self { path }
    }
}

impl ConfigStore for FileStore {
    fn load_raw(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    fn save_raw(&self, raw: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create config directory {:?}: {}", parent, e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, raw) {
            warn!("Could not persist session config to {:?}: {}", self.path, e);
        }
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    record: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a raw record
    pub fn with_record(raw: impl Into<String>) -> Self {
        Self {
            record: RwLock::new(Some(raw.into())),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load_raw(&self) -> Option<String> {
        self.record.read().clone()
    }

    fn save_raw(&self, raw: &str) {
        *self.record.write() = Some(raw.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::{EngineKind, TunnelMode};
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());

        let mut config = ProxySessionConfig::new();
        config.engine = EngineKind::Scramjet;
        config.tunnel = TunnelMode::Bare;
        store.save(&config);

        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_missing_record_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert_eq!(store.load(), ProxySessionConfig::default());
    }

    #[test]
    fn test_partially_invalid_record_recovers() {
        let store =
            MemoryStore::with_record(r#"{"engine": "scramjet", "transport": "teleport"}"#);
        let config = store.load();
        assert_eq!(config.engine, EngineKind::Scramjet);
        assert_eq!(config.transport, Default::default());
    }
}
