//! Live server settings and the `update-config` use case.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use crate::domain::{ConfigError, ConfigPatch, ConfigUpdateError, ServerSettings};

/// Persistence for [`ServerSettings`].
///
/// The TOML implementation lives in `infrastructure::config_store`; tests and
/// embedders that should not touch the disk use [`MemorySettingsStore`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<ServerSettings, ConfigError>;
    fn save(&self, settings: &ServerSettings) -> Result<(), ConfigError>;
}

/// Keeps settings in memory only.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<ServerSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last settings passed to `save`, if any.
    pub fn last_saved(&self) -> Option<ServerSettings> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<ServerSettings, ConfigError> {
        Ok(self.last_saved().unwrap_or_default())
    }

    fn save(&self, settings: &ServerSettings) -> Result<(), ConfigError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}

/// Current settings shared by every connection.
///
/// `input_throttle_ms` is mirrored into an atomic that each connection's
/// dispatcher reads per event, so a change takes effect without reconnecting.
/// `host` and `frontend_port` are persisted but only take effect on restart.
pub struct LiveSettings {
    current: RwLock<ServerSettings>,
    throttle_ms: Arc<AtomicU64>,
    store: Arc<dyn SettingsStore>,
}

impl LiveSettings {
    pub fn new(settings: ServerSettings, store: Arc<dyn SettingsStore>) -> Self {
        let throttle_ms = Arc::new(AtomicU64::new(settings.input_throttle_ms));
        Self {
            current: RwLock::new(settings),
            throttle_ms,
            store,
        }
    }

    pub fn snapshot(&self) -> ServerSettings {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Shared handle to the live throttle window.
    pub fn throttle_ms(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.throttle_ms)
    }

    /// Validates a client payload, merges it, persists, and applies the
    /// throttle immediately.
    ///
    /// A persistence failure is logged but does not fail the update: the new
    /// values stay in effect for this run.
    pub fn update(&self, payload: &serde_json::Value) -> Result<ServerSettings, ConfigUpdateError> {
        let patch = ConfigPatch::from_json(payload)?;
        let updated = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.apply(&patch);
            current.clone()
        };
        self.throttle_ms
            .store(updated.input_throttle_ms, Ordering::Relaxed);

        if let Err(e) = self.store.save(&updated) {
            warn!("settings updated but not persisted: {e}");
        } else {
            info!("settings updated and persisted");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingStore;

    impl SettingsStore for FailingStore {
        fn load(&self) -> Result<ServerSettings, ConfigError> {
            Err(ConfigError::NoPlatformConfigDir)
        }
        fn save(&self, _: &ServerSettings) -> Result<(), ConfigError> {
            Err(ConfigError::NoPlatformConfigDir)
        }
    }

    #[test]
    fn test_update_persists_and_applies_throttle_live() {
        // Arrange
        let store = Arc::new(MemorySettingsStore::new());
        let live = LiveSettings::new(ServerSettings::default(), store.clone());
        let throttle = live.throttle_ms();

        // Act
        let updated = live.update(&json!({"inputThrottleMs": 30, "address": "10.1.1.1"})).unwrap();

        // Assert
        assert_eq!(updated.input_throttle_ms, 30);
        assert_eq!(throttle.load(Ordering::Relaxed), 30);
        assert_eq!(store.last_saved(), Some(updated.clone()));
        assert_eq!(live.snapshot().address.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_invalid_update_leaves_settings_untouched() {
        // Arrange
        let store = Arc::new(MemorySettingsStore::new());
        let live = LiveSettings::new(ServerSettings::default(), store.clone());

        // Act
        let result = live.update(&json!({"frontendPort": 0}));

        // Assert
        assert_eq!(result, Err(ConfigUpdateError::InvalidPort));
        assert_eq!(live.snapshot(), ServerSettings::default());
        assert_eq!(store.last_saved(), None);
    }

    #[test]
    fn test_update_survives_store_failure() {
        let live = LiveSettings::new(ServerSettings::default(), Arc::new(FailingStore));
        let updated = live.update(&json!({"host": "127.0.0.1"})).unwrap();
        assert_eq!(updated.host, "127.0.0.1");
    }

    #[test]
    fn test_memory_store_loads_defaults_until_saved() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.load().unwrap(), ServerSettings::default());
    }
}
