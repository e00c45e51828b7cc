use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use api_types::Document;
use engine::{
    AuthError, CollectionPath, DocumentPath, DocumentStore, Identity, IdentityProvider,
    StoreResult, SyncError,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const DEFAULT_DATA_PATH: &str = "config/budget_data.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileContents {
    documents: BTreeMap<String, Document>,
}

/// Document store persisted as one JSON file.
///
/// Every call reads the file, applies the change and writes it back through
/// a temporary file, so a crash never leaves a truncated store. Clones share
/// the same lock.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreachable(&self, err: std::io::Error) -> SyncError {
        SyncError::Unreachable(format!("{}: {err}", self.path.display()))
    }

    async fn load(&self) -> StoreResult<FileContents> {
        let content = match tokio::fs::read_to_string(self.path.as_ref()).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FileContents::default()),
            Err(err) => return Err(self.unreachable(err)),
        };
        serde_json::from_str(&content).map_err(|err| SyncError::Malformed {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })
    }

    async fn save(&self, contents: &FileContents) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| self.unreachable(err))?;
        }
        let payload = serde_json::to_string_pretty(contents).map_err(|err| SyncError::Malformed {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|err| self.unreachable(err))?;
        tokio::fs::rename(&tmp, self.path.as_ref())
            .await
            .map_err(|err| self.unreachable(err))
    }

    /// Runs `change` on the file contents and writes them back.
    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut FileContents) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _guard = self.lock.lock().await;
        let mut contents = self.load().await?;
        let value = change(&mut contents)?;
        self.save(&contents).await?;
        Ok(value)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

impl DocumentStore for FileStore {
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.documents.remove(path.as_str()))
    }

    async fn set_document(&self, path: &DocumentPath, document: Document) -> StoreResult<()> {
        self.modify(|contents| {
            contents.documents.insert(path.to_string(), document);
            Ok(())
        })
        .await
    }

    async fn update_document(&self, path: &DocumentPath, fields: Document) -> StoreResult<()> {
        self.modify(|contents| {
            let existing = contents
                .documents
                .get_mut(path.as_str())
                .ok_or_else(|| SyncError::Rejected(format!("no document at {path}")))?;
            existing.extend(fields);
            Ok(())
        })
        .await
    }

    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        self.modify(|contents| {
            contents.documents.remove(path.as_str());
            Ok(())
        })
        .await
    }

    async fn batch_write(&self, writes: Vec<(DocumentPath, Document)>) -> StoreResult<()> {
        self.modify(|contents| {
            for (path, document) in writes {
                contents.documents.insert(path.to_string(), document);
            }
            Ok(())
        })
        .await
    }

    async fn list_documents(&self, collection: &CollectionPath) -> StoreResult<Vec<(String, Document)>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .documents
            .into_iter()
            .filter_map(|(key, document)| {
                let path = DocumentPath::from(key.as_str());
                collection
                    .contains(&path)
                    .then(|| (path.split().1.to_string(), document))
            })
            .collect())
    }
}

/// Offline identity for the file backend.
///
/// The user id is the normalized email and an account exists when its
/// profile document exists. Passwords are not verified: the data file is
/// only as private as the machine it lives on.
#[derive(Clone, Debug)]
pub struct LocalIdentity {
    store: FileStore,
}

impl LocalIdentity {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    fn identity(email: &str) -> Identity {
        let email = email.trim().to_ascii_lowercase();
        Identity {
            user_id: email.clone(),
            email,
        }
    }

    async fn exists(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.store
            .get_document(&DocumentPath::profile(&identity.user_id))
            .await
            .map(|document| document.is_some())
            .map_err(|err| AuthError::Provider(err.to_string()))
    }
}

impl IdentityProvider for LocalIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password.chars().count() < 6 {
            return Err(AuthError::WeakPassword);
        }
        let identity = Self::identity(email);
        if identity.user_id.contains('/') {
            return Err(AuthError::Provider("email must not contain '/'".to_string()));
        }
        if self.exists(&identity).await? {
            return Err(AuthError::EmailInUse);
        }
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity, AuthError> {
        let identity = Self::identity(email);
        if !self.exists(&identity).await? {
            return Err(AuthError::UserNotFound);
        }
        tracing::debug!("local sign-in for {}", identity.email);
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
