//! In-process store and identity provider.
//!
//! Used by the tests and by the `demo` command of the CLI. The store can be
//! switched offline, made to fail specific operations or slowed down, to
//! exercise the failure paths of the ledger and the budget.
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use api_types::Document;
use uuid::Uuid;

use crate::{
    AuthError, SyncError,
    identity::{Identity, IdentityProvider},
    store::{CollectionPath, DocumentPath, DocumentStore, StoreResult},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store operations, used to inject failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Update,
    Delete,
    Batch,
    List,
}

#[derive(Debug, Default)]
struct StoreInner {
    documents: Mutex<BTreeMap<String, Document>>,
    offline: AtomicBool,
    failing: Mutex<HashSet<Operation>>,
    latency: Mutex<Option<Duration>>,
}

/// Thread-safe in-memory [`DocumentStore`]. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When offline every call fails with [`SyncError::Unreachable`].
    pub fn set_online(&self, online: bool) {
        self.inner.offline.store(!online, Ordering::SeqCst);
    }

    /// Makes `operation` fail with [`SyncError::Rejected`] until cleared.
    pub fn fail_on(&self, operation: Operation) {
        lock(&self.inner.failing).insert(operation);
    }

    pub fn clear_failures(&self) {
        lock(&self.inner.failing).clear();
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.inner.latency) = latency;
    }

    /// Copy of a stored document, bypassing failure injection.
    pub fn peek(&self, path: &DocumentPath) -> Option<Document> {
        lock(&self.inner.documents).get(path.as_str()).cloned()
    }

    /// Stores a document directly, bypassing failure injection.
    pub fn insert(&self, path: &DocumentPath, document: Document) {
        lock(&self.inner.documents).insert(path.to_string(), document);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &CollectionPath) -> usize {
        lock(&self.inner.documents)
            .keys()
            .filter(|key| collection.contains(&DocumentPath::from(key.as_str())))
            .count()
    }

    async fn enter(&self, operation: Operation) -> StoreResult<()> {
        let latency = *lock(&self.inner.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Unreachable("memory store is offline".to_string()));
        }
        if lock(&self.inner.failing).contains(&operation) {
            return Err(SyncError::Rejected(format!("{operation:?} refused")));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        self.enter(Operation::Get).await?;
        Ok(lock(&self.inner.documents).get(path.as_str()).cloned())
    }

    async fn set_document(&self, path: &DocumentPath, document: Document) -> StoreResult<()> {
        self.enter(Operation::Set).await?;
        lock(&self.inner.documents).insert(path.to_string(), document);
        Ok(())
    }

    async fn update_document(&self, path: &DocumentPath, fields: Document) -> StoreResult<()> {
        self.enter(Operation::Update).await?;
        let mut documents = lock(&self.inner.documents);
        let existing = documents
            .get_mut(path.as_str())
            .ok_or_else(|| SyncError::Rejected(format!("no document at {path}")))?;
        existing.extend(fields);
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        self.enter(Operation::Delete).await?;
        lock(&self.inner.documents).remove(path.as_str());
        Ok(())
    }

    async fn batch_write(&self, writes: Vec<(DocumentPath, Document)>) -> StoreResult<()> {
        self.enter(Operation::Batch).await?;
        let mut documents = lock(&self.inner.documents);
        for (path, document) in writes {
            documents.insert(path.to_string(), document);
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &CollectionPath) -> StoreResult<Vec<(String, Document)>> {
        self.enter(Operation::List).await?;
        let documents = lock(&self.inner.documents);
        Ok(documents
            .iter()
            .filter_map(|(key, document)| {
                let path = DocumentPath::from(key.as_str());
                collection
                    .contains(&path)
                    .then(|| (path.split().1.to_string(), document.clone()))
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
}

/// In-memory email/password accounts. Clones share the same accounts.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentity {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    current: Arc<Mutex<Option<Identity>>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of the last successful sign-in, if not signed out.
    pub fn current(&self) -> Option<Identity> {
        lock(&self.current).clone()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password.chars().count() < 6 {
            return Err(AuthError::WeakPassword);
        }
        let email = normalize_email(email);
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }
        let user_id = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.clone(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        Ok(Identity { user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let account = lock(&self.accounts)
            .get(&email)
            .cloned()
            .ok_or(AuthError::UserNotFound)?;
        if account.password != password {
            return Err(AuthError::WrongPassword);
        }
        let identity = Identity {
            user_id: account.user_id,
            email,
        };
        *lock(&self.current) = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *lock(&self.current) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[tokio::test]
    async fn list_returns_direct_children_only() {
        let store = MemoryStore::new();
        store.insert(&DocumentPath::profile("u1"), doc(json!({"name": "Ada"})));
        store.insert(&DocumentPath::from("users/u1/expenses/a"), doc(json!({"n": 1})));
        store.insert(&DocumentPath::from("users/u1/expenses/b"), doc(json!({"n": 2})));
        store.insert(&DocumentPath::from("users/u2/expenses/c"), doc(json!({"n": 3})));

        let listed = store
            .list_documents(&CollectionPath::expenses("u1"))
            .await
            .unwrap();
        let keys: Vec<_> = listed.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new();
        let path = DocumentPath::profile("u1");
        store.insert(&path, doc(json!({"name": "Ada", "budget_minor": 1})));
        store
            .update_document(&path, doc(json!({"budget_minor": 2})))
            .await
            .unwrap();
        assert_eq!(store.peek(&path), Some(doc(json!({"name": "Ada", "budget_minor": 2}))));

        let missing = store
            .update_document(&DocumentPath::profile("nobody"), Document::new())
            .await;
        assert!(matches!(missing, Err(SyncError::Rejected(_))));
    }

    #[tokio::test]
    async fn offline_and_injected_failures() {
        let store = MemoryStore::new();
        let path = DocumentPath::profile("u1");

        store.set_online(false);
        assert!(matches!(
            store.get_document(&path).await,
            Err(SyncError::Unreachable(_))
        ));
        store.set_online(true);

        store.fail_on(Operation::Delete);
        assert!(matches!(
            store.delete_document(&path).await,
            Err(SyncError::Rejected(_))
        ));
        assert!(store.get_document(&path).await.is_ok());
        store.clear_failures();
        assert!(store.delete_document(&path).await.is_ok());
    }

    #[tokio::test]
    async fn identity_accounts() {
        let identity = MemoryIdentity::new();
        assert_eq!(
            identity.sign_up("a@b.co", "123").await,
            Err(AuthError::WeakPassword)
        );
        let created = identity.sign_up("A@b.co", "secret").await.unwrap();
        assert_eq!(
            identity.sign_up("a@b.co", "secret").await,
            Err(AuthError::EmailInUse)
        );
        assert_eq!(
            identity.sign_in("a@b.co", "nope").await,
            Err(AuthError::WrongPassword)
        );
        assert_eq!(
            identity.sign_in("x@b.co", "secret").await,
            Err(AuthError::UserNotFound)
        );
        let signed_in = identity.sign_in("a@b.co", "secret").await.unwrap();
        assert_eq!(signed_in, created);
        assert_eq!(identity.current(), Some(created));
        identity.sign_out().await.unwrap();
        assert_eq!(identity.current(), None);
    }
}
