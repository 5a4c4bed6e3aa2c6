// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// Storage port for raw config blobs, keyed by logical name.
pub trait ConfigStore {
    /// Loads the blob stored under `key`. Returns [`ConfigError::NotFound`]
    /// when nothing is stored.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persists `data` under `key`, replacing any previous blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failures of config loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key.
    #[error("not found")]
    NotFound,
    /// Reading or writing the backing storage failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob is not valid JSON for the requested type.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Anything else (unusable key, unresolvable config directory, ...).
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to `S`.
#[derive(Debug, Clone)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the service and returns the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Loads and deserializes the value under `key`. A missing key or an
    /// empty blob yields `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Like [`ConfigService::load`], falling back to `T::default()` when
    /// nothing is stored.
    pub fn load_or_default<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        let value = self.load(key)?;
        if value.is_none() {
            debug!(key, "no stored config; using defaults");
        }
        Ok(value.unwrap_or_default())
    }

    /// Serializes `value` as pretty JSON and stores it under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapStore(RefCell<BTreeMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Settings {
        rate: u32,
        label: String,
    }

    #[test]
    fn missing_and_empty_keys_load_as_none() {
        let store = MapStore::default();
        store.save_raw("empty", b"").unwrap();
        let svc = ConfigService::new(store);
        assert_eq!(svc.load::<Settings>("absent").unwrap(), None);
        assert_eq!(svc.load::<Settings>("empty").unwrap(), None);
        assert_eq!(svc.load_or_default::<Settings>("absent").unwrap(), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let svc = ConfigService::new(MapStore::default());
        let value = Settings {
            rate: 30,
            label: "lab".into(),
        };
        svc.save("s", &value).unwrap();
        assert_eq!(svc.load::<Settings>("s").unwrap(), Some(value));
        let raw = svc.store().load_raw("s").unwrap();
        assert!(raw.contains(&b'\n'), "stored JSON is pretty-printed");
    }

    #[test]
    fn malformed_blob_is_a_serde_error() {
        let store = MapStore::default();
        store.save_raw("s", b"{not json").unwrap();
        let svc = ConfigService::new(store);
        assert!(matches!(svc.load::<Settings>("s"), Err(ConfigError::Serde(_))));
    }
}
