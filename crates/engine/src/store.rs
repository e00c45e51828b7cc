//! Access to the per-user document store.
//!
//! The engine never talks to a concrete backend: it goes through the
//! [`DocumentStore`] trait, wrapped in a [`Remote`] that bounds every call
//! with a timeout.
//!
//! Layout:
//! - `users/{uid}`: the user profile;
//! - `users/{uid}/expenses/{expense_id}`: one document per expense.
use std::{future::Future, time::Duration};

use api_types::Document;
use serde::{Serialize, de::DeserializeOwned};

use crate::{ExpenseId, SyncError};

pub type StoreResult<T> = Result<T, SyncError>;

/// Path of a single document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    #[must_use]
    pub fn profile(user_id: &str) -> Self {
        Self(format!("users/{user_id}"))
    }

    #[must_use]
    pub fn expense(user_id: &str, expense_id: &ExpenseId) -> Self {
        Self(format!("users/{user_id}/expenses/{expense_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Collection and key of this document.
    #[must_use]
    pub fn split(&self) -> (&str, &str) {
        self.0.rsplit_once('/').unwrap_or(("", &self.0))
    }
}

impl core::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentPath {
    fn from(value: &str) -> Self {
        Self(value.trim_matches('/').to_string())
    }
}

/// Path of a collection of documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    #[must_use]
    pub fn expenses(user_id: &str) -> Self {
        Self(format!("users/{user_id}/expenses"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if `path` is a direct child of this collection.
    #[must_use]
    pub fn contains(&self, path: &DocumentPath) -> bool {
        path.split().0 == self.0
    }
}

impl core::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A JSON document store keyed by path.
///
/// Implementations report every failure as a [`SyncError`]; they do not
/// retry.
pub trait DocumentStore: Send + Sync {
    fn get_document(
        &self,
        path: &DocumentPath,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Creates or replaces the document.
    fn set_document(
        &self,
        path: &DocumentPath,
        document: Document,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Merges `fields` into an existing document.
    fn update_document(
        &self,
        path: &DocumentPath,
        fields: Document,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_document(&self, path: &DocumentPath) -> impl Future<Output = StoreResult<()>> + Send;

    /// Sets all the documents at once: either every write lands or none.
    fn batch_write(
        &self,
        writes: Vec<(DocumentPath, Document)>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Lists the direct children of a collection as `(key, document)`.
    fn list_documents(
        &self,
        collection: &CollectionPath,
    ) -> impl Future<Output = StoreResult<Vec<(String, Document)>>> + Send;
}

/// A [`DocumentStore`] with a deadline on every call.
#[derive(Debug)]
pub struct Remote<S> {
    store: S,
    timeout: Duration,
}

impl<S: DocumentStore> Remote<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn timed<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.timeout)),
        }
    }

    pub async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        tracing::debug!("get {path}");
        self.timed(self.store.get_document(path)).await
    }

    pub async fn set(&self, path: &DocumentPath, document: Document) -> StoreResult<()> {
        tracing::debug!("set {path}");
        self.timed(self.store.set_document(path, document)).await
    }

    pub async fn update(&self, path: &DocumentPath, fields: Document) -> StoreResult<()> {
        tracing::debug!("update {path}");
        self.timed(self.store.update_document(path, fields)).await
    }

    pub async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        tracing::debug!("delete {path}");
        self.timed(self.store.delete_document(path)).await
    }

    pub async fn batch(&self, writes: Vec<(DocumentPath, Document)>) -> StoreResult<()> {
        tracing::debug!("batch write of {} documents", writes.len());
        self.timed(self.store.batch_write(writes)).await
    }

    pub async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<(String, Document)>> {
        tracing::debug!("list {collection}");
        self.timed(self.store.list_documents(collection)).await
    }
}

/// Serializes a value into a JSON object document.
pub fn to_document<T: Serialize>(path: &str, value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(SyncError::Malformed {
            path: path.to_string(),
            reason: "not a JSON object".to_string(),
        }),
        Err(err) => Err(SyncError::Malformed {
            path: path.to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Deserializes a document, labelling failures with its path.
pub fn from_document<T: DeserializeOwned>(path: &str, document: Document) -> StoreResult<T> {
    serde_json::from_value(serde_json::Value::Object(document)).map_err(|err| {
        SyncError::Malformed {
            path: path.to_string(),
            reason: err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_user_layout() {
        let id = ExpenseId::from("e1");
        let path = DocumentPath::expense("u1", &id);
        assert_eq!(path.as_str(), "users/u1/expenses/e1");
        assert_eq!(path.split(), ("users/u1/expenses", "e1"));
        assert!(CollectionPath::expenses("u1").contains(&path));
        assert!(!CollectionPath::expenses("u2").contains(&path));
        assert!(!CollectionPath::expenses("u1").contains(&DocumentPath::profile("u1")));
    }

    #[test]
    fn non_object_documents_are_malformed() {
        let err = to_document("users/u1", &42).unwrap_err();
        assert!(matches!(err, SyncError::Malformed { .. }));
    }
}
