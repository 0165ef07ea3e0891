//! Key-value persistence for lifecycle state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};

/// Small string key-value store. Reads and writes are treated as fast and
/// synchronous.
pub trait KvStore: Send {
    fn kv_get(&self, key: &str) -> Result<Option<String>>;
    fn kv_set(&mut self, key: &str, value: &str) -> Result<()>;
    fn kv_remove(&mut self, key: &str) -> Result<()>;
}

/// HashMap-backed store for tests and ephemeral runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    values: HashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn kv_set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn kv_remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Read a persisted bool. Anything but `true`/`false` is a persistence error.
pub fn read_bool(kv: &dyn KvStore, key: &str) -> Result<Option<bool>> {
    match kv.kv_get(key)? {
        None => Ok(None),
        Some(raw) => raw.parse::<bool>().map(Some).map_err(|e| CoreError::Persistence {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Read a persisted RFC 3339 timestamp.
pub fn read_time(kv: &dyn KvStore, key: &str) -> Result<Option<DateTime<Utc>>> {
    match kv.kv_get(key)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| CoreError::Persistence {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

pub fn write_bool(kv: &mut dyn KvStore, key: &str, value: bool) -> Result<()> {
    kv.kv_set(key, if value { "true" } else { "false" })
}

pub fn write_time(kv: &mut dyn KvStore, key: &str, value: DateTime<Utc>) -> Result<()> {
    kv.kv_set(key, &value.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip() {
        let mut kv = MemoryKvStore::new();
        let now = Utc::now();
        write_bool(&mut kv, "flag", true).unwrap();
        write_time(&mut kv, "at", now).unwrap();
        assert_eq!(read_bool(&kv, "flag").unwrap(), Some(true));
        assert_eq!(read_time(&kv, "at").unwrap(), Some(now));
        assert_eq!(read_bool(&kv, "missing").unwrap(), None);
    }

    #[test]
    fn corrupt_values_are_errors() {
        let mut kv = MemoryKvStore::new();
        kv.kv_set("flag", "yes please").unwrap();
        kv.kv_set("at", "last tuesday").unwrap();
        assert!(read_bool(&kv, "flag").is_err());
        assert!(read_time(&kv, "at").is_err());
    }
}
