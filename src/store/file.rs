use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use super::SnapshotStore;

/// Stores each key as `<dir>/<key>.json`. Writes go through a temporary file
/// and a rename so a crash mid-write leaves the previous snapshot intact.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("invalid snapshot key '{key}'");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, key: &str, payload: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .with_context(|| format!("failed to write snapshot to {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace snapshot {}", path.display()))
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("failed to read snapshot from {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove snapshot {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_instances() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state")).unwrap();
        store.save("sessionTimer", "{\"status\":\"running\"}").unwrap();

        let reopened = JsonFileStore::new(dir.path().join("state")).unwrap();
        assert_eq!(
            reopened.load("sessionTimer").unwrap().as_deref(),
            Some("{\"status\":\"running\"}")
        );
        assert!(!dir.path().join("state/sessionTimer.json.tmp").exists());
    }

    #[test]
    fn missing_key_loads_none_and_removes_cleanly() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.load("pomodoro").unwrap().is_none());
        store.remove("pomodoro").unwrap();
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.save("../escape", "{}").is_err());
        assert!(store.load("").is_err());
    }
}
