//! File-backed implementation of the two durable keys.
//!
//! One JSON document at `<config_dir>/lingflow/state.json` holds the
//! access token and the active job record. Any process of the same user
//! sees the same file, which is what makes the credential visible across
//! windows and the job survive a restart. 0600 on Unix.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lingflow_core::domain::Job;
use lingflow_core::error::{ClientError, Result};
use lingflow_core::port::{ActiveJobStore, CredentialStore};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_job: Option<Job>,
}

/// Durable state store backed by a single JSON file.
pub struct FileStateStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process; cross
    // process the whole-file rewrite keeps the document consistent.
    guard: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Default per-user location.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lingflow")
            .map(|dirs| dirs.config_dir().join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StateDocument> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| ClientError::Storage(format!("Corrupt state file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateDocument::default()),
            Err(e) => Err(ClientError::Storage(format!(
                "Failed to read state file: {}",
                e
            ))),
        }
    }

    fn save(&self, doc: &StateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Storage(format!("Failed to create state directory: {}", e))
            })?;
        }
        let contents = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, contents)
            .map_err(|e| ClientError::Storage(format!("Failed to write state file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions).map_err(|e| {
                ClientError::Storage(format!("Failed to set state file permissions: {}", e))
            })?;
        }

        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StateDocument),
    {
        let _lock = self.guard.lock().unwrap();
        let mut doc = self.load()?;
        mutate(&mut doc);
        self.save(&doc)
    }

    fn read(&self) -> Result<StateDocument> {
        let _lock = self.guard.lock().unwrap();
        self.load()
    }
}

#[async_trait]
impl CredentialStore for FileStateStore {
    async fn set(&self, token: &str) -> Result<()> {
        debug!("Storing access token");
        self.update(|doc| doc.access_token = Some(token.to_string()))
    }

    async fn get(&self) -> Result<Option<String>> {
        Ok(self.read()?.access_token)
    }

    async fn clear(&self) -> Result<()> {
        debug!("Clearing access token");
        self.update(|doc| doc.access_token = None)
    }
}

#[async_trait]
impl ActiveJobStore for FileStateStore {
    async fn set(&self, job: &Job) -> Result<()> {
        debug!(job_id = %job.id, "Persisting active job");
        let job = job.clone();
        self.update(|doc| doc.active_job = Some(job))
    }

    async fn get(&self) -> Result<Option<Job>> {
        Ok(self.read()?.active_job)
    }

    async fn clear(&self) -> Result<()> {
        debug!("Clearing active job");
        self.update(|doc| doc.active_job = None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingflow_core::domain::TransportMode;

    fn store_in(dir: &tempfile::TempDir) -> FileStateStore {
        FileStateStore::new(dir.path().join("state.json"))
    }

    fn job(id: &str) -> Job {
        Job::new(id, TransportMode::Upload, 1_000)
    }

    #[tokio::test]
    async fn test_token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(&dir);
            CredentialStore::set(&store, "tok-123").await.unwrap();
        }
        // A fresh store over the same file sees the token (reload analog)
        let store = store_in(&dir);
        assert_eq!(
            CredentialStore::get(&store).await.unwrap().as_deref(),
            Some("tok-123")
        );
    }

    #[tokio::test]
    async fn test_both_keys_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        CredentialStore::set(&store, "tok").await.unwrap();
        ActiveJobStore::set(&store, &job("job-1")).await.unwrap();

        CredentialStore::clear(&store).await.unwrap();
        assert!(CredentialStore::get(&store).await.unwrap().is_none());
        assert_eq!(
            ActiveJobStore::get(&store).await.unwrap().map(|j| j.id),
            Some("job-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_job_record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(&dir);
            ActiveJobStore::set(&store, &job("job-2")).await.unwrap();
        }
        // A fresh store over the same file restores the whole record
        let store = store_in(&dir);
        let restored = ActiveJobStore::get(&store).await.unwrap().unwrap();
        assert_eq!(restored.id, "job-2");
        assert_eq!(restored.mode, TransportMode::Upload);
        assert_eq!(restored.opened_at, 1_000);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(CredentialStore::get(&store).await.unwrap().is_none());
        assert!(ActiveJobStore::get(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        ActiveJobStore::set(&store, &job("job-1")).await.unwrap();
        ActiveJobStore::clear(&store).await.unwrap();
        assert!(ActiveJobStore::get(&store).await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        CredentialStore::set(&store, "secret").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
