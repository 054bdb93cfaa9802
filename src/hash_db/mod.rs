use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One row of the hash database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEntry {
    #[serde(rename = "Hash")]
    pub hash1: u32,
    #[serde(rename = "HashPath", default)]
    pub hash2: u32,
    #[serde(rename = "Path")]
    pub path: String,
}

/// Maps numeric file hashes to paths. Loaded once, then shared read-only between threads.
#[derive(Debug, Default)]
pub struct HashDb {
    entries: RwLock<Vec<HashEntry>>,
}

impl HashDb {
    pub fn new(entries: Vec<HashEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let entries: Vec<HashEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let db = Self::default();
        db.initialize(path)?;
        Ok(db)
    }

    /// Replace the table with the contents of the JSON file at `path`.
    pub fn initialize(&self, path: &Path) -> anyhow::Result<()> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read hash database {}", path.display()))?;
        let entries: Vec<HashEntry> = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse hash database {}", path.display()))?;
        log::debug!("hash database {}: {} entries", path.display(), entries.len());
        *self.write() = entries;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<HashEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<HashEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Path of the first entry matching `hash1`. `hash2` of `None` or `Some(0)` matches any
    /// second hash.
    pub fn lookup(&self, hash1: u32, hash2: Option<u32>) -> Option<String> {
        let entries = self.read();
        let entry = match hash2 {
            None | Some(0) => entries.iter().find(|e| e.hash1 == hash1),
            Some(hash2) => entries
                .iter()
                .find(|e| e.hash1 == hash1 && e.hash2 == hash2),
        };
        entry.map(|e| e.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    const JSON: &str = r#"[
        { "Hash": 100, "HashPath": 1, "Path": "data/scene/a.mt5" },
        { "Hash": 100, "HashPath": 2, "Path": "data/scene/b.mt5" },
        { "Hash": 200, "HashPath": 0, "Path": "data/scene/c.mt5" }
    ]"#;

    #[test]
    fn lookup_with_and_without_wildcard() {
        let db = HashDb::from_json(JSON).unwrap();
        assert_eq!(db.len(), 3);
        assert_eq!(db.lookup(100, Some(2)).as_deref(), Some("data/scene/b.mt5"));
        assert_eq!(db.lookup(100, None).as_deref(), Some("data/scene/a.mt5"));
        assert_eq!(db.lookup(100, Some(0)).as_deref(), Some("data/scene/a.mt5"));
        assert_eq!(db.lookup(100, Some(3)), None);
        assert_eq!(db.lookup(300, None), None);
    }

    #[test]
    fn loads_from_file_and_reinitializes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JSON.as_bytes()).unwrap();
        let db = HashDb::load(file.path()).unwrap();
        assert_eq!(db.len(), 3);

        let mut other = tempfile::NamedTempFile::new().unwrap();
        other
            .write_all(br#"[{ "Hash": 7, "Path": "x" }]"#)
            .unwrap();
        db.initialize(other.path()).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.lookup(7, None).as_deref(), Some("x"));
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(HashDb::from_json("{ not json").is_err());
        let db = HashDb::default();
        assert!(db.initialize(Path::new("/nonexistent/hash_db.json")).is_err());
        assert!(db.is_empty());
    }

    #[test]
    fn concurrent_lookups() {
        let db = Arc::new(HashDb::from_json(JSON).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.lookup(200, None))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("data/scene/c.mt5"));
        }
    }
}
