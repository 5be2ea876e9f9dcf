//! A credential store backed by a JSON document on the local filesystem

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use super::{CredentialRecord, CredentialStore, PersistedCredentials};
use crate::StoreError;

/// Distinguishes temporary files written by concurrent saves in one process
static TMP_SEQ: AtomicU32 = AtomicU32::new(0);

/// A credential store that keeps the pair in a JSON file
///
/// Saves write a sibling temporary file and rename it over the document, so a crash mid-write
/// never leaves a truncated document behind.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Constructs a store for the document at `path`
    ///
    /// Nothing is read or created until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The location of the credential document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("credentials"));
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
    }

    async fn read_document(&self) -> Result<Option<CredentialRecord>, StoreError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "credential file not found");
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        let document: PersistedCredentials = serde_json::from_slice(&data).map_err(|error| {
            tracing::error!(path = %self.path.display(), %error, "credential file is not valid JSON");
            StoreError::Corrupt(error)
        })?;

        Ok(document.into_record())
    }

    async fn write_document(&self, record: &CredentialRecord) -> Result<(), io::Error> {
        let data = serde_json::to_vec_pretty(record)?;
        let tmp_path = self.temp_path();

        let mut file_opts = fs::OpenOptions::new();
        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let written = async {
            let mut file = file_opts.open(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }

        written
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&mut self) -> Result<Option<CredentialRecord>, StoreError> {
        let record = self.read_document().await?;
        if record.is_some() {
            tracing::info!(path = %self.path.display(), "loaded credentials from file");
        }
        Ok(record)
    }

    async fn save(&mut self, record: &CredentialRecord) -> Result<(), StoreError> {
        self.write_document(record).await.map_err(|error| {
            tracing::error!(path = %self.path.display(), %error, "failed to save credentials");
            StoreError::Io(error)
        })?;
        tracing::info!(path = %self.path.display(), "saved credentials to file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::new(dir.path().join("tokens.json"));

        for (access, refresh) in [
            ("a", "r"),
            ("eyJ.eyJ.sig", "v1.MjAyNC0wMS0wMQ"),
            ("токен-ü", "🐈"),
        ] {
            let record = CredentialRecord::new(access, refresh);
            store.save(&record).await.unwrap();
            assert_eq!(store.load().await.unwrap(), Some(record));
        }
    }

    #[tokio::test]
    async fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::new(dir.path().join("tokens.json"));

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_json_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, b"{\"access_token\": ").await.unwrap();

        let mut store = FileCredentialStore::new(&path);
        let err = store.load().await.unwrap_err();

        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn document_uses_wire_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let mut store = FileCredentialStore::new(&path);

        store
            .save(&CredentialRecord::new("access", "refresh"))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"access_token": "access", "refresh_token": "refresh"})
        );
    }

    #[tokio::test]
    async fn save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::new(dir.path().join("tokens.json"));

        store.save(&CredentialRecord::new("a", "r")).await.unwrap();
        store.save(&CredentialRecord::new("b", "s")).await.unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![String::from("tokens.json")]);
    }

    #[tokio::test]
    async fn failed_save_cleans_up_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        // A non-empty directory squatting on the document's path makes the rename fail
        fs::create_dir(&path).await.unwrap();
        fs::write(path.join("occupant"), b"x").await.unwrap();

        let mut store = FileCredentialStore::new(&path);
        let err = store
            .save(&CredentialRecord::new("a", "r"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![String::from("tokens.json")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn document_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let mut store = FileCredentialStore::new(&path);
        store.save(&CredentialRecord::new("a", "r")).await.unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
