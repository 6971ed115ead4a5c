//! In-process backend for tests and throwaway portals.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::KeyValueBackend;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_and_remove() {
        let backend = MemoryBackend::new();
        backend.write("k", "v1").unwrap();
        backend.write("k", "v2").unwrap();
        assert_eq!(backend.read("k").unwrap(), Some("v2".to_string()));
        assert_eq!(backend.len(), 1);

        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert!(backend.read("k").unwrap().is_none());
        assert!(backend.is_empty());
    }
}
