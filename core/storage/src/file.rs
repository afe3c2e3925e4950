//! Filesystem-backed key-value store.

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::store::KeyValueStore;
use offsync_common::{Error, Result};

/// Extension of files holding a value.
const VALUE_EXT: &str = "kv";
/// Extension of in-progress writes.
const TEMP_EXT: &str = "tmp";

/// Filesystem key-value store.
///
/// Each key is stored in its own file under the root directory. File names
/// are the percent-encoded key, so any string is a valid key. Writes go to a
/// temporary file first and are renamed into place, so a crash mid-write
/// leaves the previous value intact.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a new file store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &str) -> PathBuf {
        let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC).to_string();
        self.root.join(format!("{}.{}", encoded, VALUE_EXT))
    }

    fn decode_key(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != VALUE_EXT {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        percent_decode_str(stem)
            .decode_utf8()
            .ok()
            .map(|k| k.into_owned())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.value_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let path = self.value_path(key);
        let temp = path.with_extension(TEMP_EXT);

        let mut file = fs::File::create(&temp).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp, &path).await {
            warn!("Failed to move {} into place: {}", temp.display(), e);
            let _ = fs::remove_file(&temp).await;
            return Err(Error::Io(e));
        }

        debug!("Wrote {} bytes for key {}", value.len(), key);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.value_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = Self::decode_key(&entry.path()) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        for key in self.keys().await? {
            self.remove_item(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_set_get() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();

        store.set_item("queue", "[1,2,3]".to_string()).await.unwrap();

        assert_eq!(store.get_item("queue").await.unwrap().as_deref(), Some("[1,2,3]"));
    }

    #[tokio::test]
    async fn test_file_missing_key() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();

        assert!(store.get_item("missing").await.unwrap().is_none());
        store.remove_item("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_survives_reopen() {
        let temp = TempDir::new().unwrap();

        {
            let store = FileStore::new(temp.path()).unwrap();
            store.set_item("offline_data", "{}".to_string()).await.unwrap();
        }

        let store = FileStore::new(temp.path()).unwrap();
        assert_eq!(store.get_item("offline_data").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_file_overwrite_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();

        store.set_item("queue", "[1]".to_string()).await.unwrap();
        store.set_item("queue", "[1,2]".to_string()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["queue.kv".to_string()]);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("queue.kv")).unwrap(),
            "[1,2]"
        );
    }

    #[tokio::test]
    async fn test_file_keys_with_separators() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();

        store.set_item("../escape", "x".to_string()).await.unwrap();
        store.set_item("user/42", "y".to_string()).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["../escape".to_string(), "user/42".to_string()]);

        // Nothing was written outside the root
        assert!(!temp.path().parent().unwrap().join("escape.kv").exists());
    }

    #[tokio::test]
    async fn test_file_clear() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();

        store.set_item("a", "1".to_string()).await.unwrap();
        store.set_item("b", "2".to_string()).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.keys().await.unwrap().is_empty());
    }

    #[test]
    fn test_creates_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("store");

        let store = FileStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }
}
