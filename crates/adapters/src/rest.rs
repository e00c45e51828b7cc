use std::{sync::Arc, time::Duration};

use api_types::{
    Document, ErrorResponse,
    auth::{AuthResponse, Credentials},
    store::{BatchWrite, DocumentList, WriteOp},
};
use engine::{
    AuthError, CollectionPath, DocumentPath, DocumentStore, Identity, IdentityProvider,
    StoreResult, SyncError,
};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::AdapterError;

/// Token issued by the identity API and presented to the document API.
///
/// [`RestIdentity`] writes it, [`RestStore`] reads it; clones share it.
#[derive(Clone, Debug, Default)]
pub struct BearerToken(Arc<RwLock<Option<String>>>);

impl BearerToken {
    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, token: Option<String>) {
        *self.0.write().await = token;
    }
}

fn parse_base_url(raw: &str) -> Result<Url, AdapterError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|err| AdapterError::InvalidUrl(format!("{raw}: {err}")))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn error_body(res: Response) -> Option<ErrorResponse> {
    res.json::<ErrorResponse>().await.ok()
}

/// Maps a failed document API response onto a [`SyncError`].
pub fn store_error(status: StatusCode, body: Option<ErrorResponse>) -> SyncError {
    let message = body
        .map(|err| err.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    match status.as_u16() {
        408 | 429 | 502..=504 => SyncError::Unreachable(message),
        400..=499 => SyncError::Rejected(message),
        _ => SyncError::Unreachable(message),
    }
}

/// Maps a failed identity API response onto an [`AuthError`].
pub fn auth_error(status: StatusCode, body: Option<ErrorResponse>) -> AuthError {
    let code = body.as_ref().and_then(|err| err.code.as_deref());
    match code {
        Some("email-already-in-use") => return AuthError::EmailInUse,
        Some("weak-password") => return AuthError::WeakPassword,
        Some("user-not-found") => return AuthError::UserNotFound,
        Some("wrong-password" | "invalid-credential") => return AuthError::WrongPassword,
        _ => {}
    }
    let message = body.map(|err| err.error);
    match (status.as_u16(), message) {
        (404, _) => AuthError::UserNotFound,
        (401, _) => AuthError::WrongPassword,
        (409, _) => AuthError::EmailInUse,
        (_, Some(message)) => AuthError::Provider(message),
        (_, None) => AuthError::Provider(status.to_string()),
    }
}

/// Document store behind the HTTP document API.
///
/// - `GET|PUT|PATCH|DELETE v1/documents/{path}` for single documents;
/// - `GET v1/documents/{collection}` lists a collection;
/// - `POST v1/batch` for atomic multi-document writes.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: Url,
    http: reqwest::Client,
    timeout: Duration,
    token: BearerToken,
}

impl RestStore {
    pub fn new(base_url: &str, timeout: Duration, token: BearerToken) -> Result<Self, AdapterError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http: http_client(timeout)?,
            timeout,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| SyncError::Rejected(format!("invalid path {path}: {err}")))
    }

    fn transport(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Unreachable(err.to_string())
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let request = match self.token.get().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(|err| self.transport(err))
    }

    /// Fails unless the response is a success; 404 becomes `Ok(None)`.
    async fn check(&self, res: Response) -> StoreResult<Option<Response>> {
        let status = res.status();
        if status.is_success() {
            return Ok(Some(res));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Err(store_error(status, error_body(res).await))
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, res: Response) -> StoreResult<T> {
        res.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                SyncError::Malformed {
                    path: path.to_string(),
                    reason: err.to_string(),
                }
            } else {
                self.transport(err)
            }
        })
    }

    async fn expect_found(&self, path: &DocumentPath, res: Response) -> StoreResult<()> {
        match self.check(res).await? {
            Some(_) => Ok(()),
            None => Err(SyncError::Rejected(format!("no document at {path}"))),
        }
    }
}

impl DocumentStore for RestStore {
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let endpoint = self.endpoint(&format!("v1/documents/{path}"))?;
        let res = self.send(self.http.get(endpoint)).await?;
        match self.check(res).await? {
            Some(res) => self.decode(path.as_str(), res).await.map(Some),
            None => Ok(None),
        }
    }

    async fn set_document(&self, path: &DocumentPath, document: Document) -> StoreResult<()> {
        let endpoint = self.endpoint(&format!("v1/documents/{path}"))?;
        let res = self.send(self.http.put(endpoint).json(&document)).await?;
        self.expect_found(path, res).await
    }

    async fn update_document(&self, path: &DocumentPath, fields: Document) -> StoreResult<()> {
        let endpoint = self.endpoint(&format!("v1/documents/{path}"))?;
        let res = self.send(self.http.patch(endpoint).json(&fields)).await?;
        self.expect_found(path, res).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        let endpoint = self.endpoint(&format!("v1/documents/{path}"))?;
        let res = self.send(self.http.delete(endpoint)).await?;
        // Deleting a missing document is not an error.
        self.check(res).await.map(|_| ())
    }

    async fn batch_write(&self, writes: Vec<(DocumentPath, Document)>) -> StoreResult<()> {
        let endpoint = self.endpoint("v1/batch")?;
        let payload = BatchWrite {
            writes: writes
                .into_iter()
                .map(|(path, document)| WriteOp {
                    path: path.to_string(),
                    document,
                })
                .collect(),
        };
        let res = self.send(self.http.post(endpoint).json(&payload)).await?;
        match self.check(res).await? {
            Some(_) => Ok(()),
            None => Err(SyncError::Rejected("batch endpoint not found".to_string())),
        }
    }

    async fn list_documents(&self, collection: &CollectionPath) -> StoreResult<Vec<(String, Document)>> {
        let endpoint = self.endpoint(&format!("v1/documents/{collection}"))?;
        let res = self.send(self.http.get(endpoint)).await?;
        let Some(res) = self.check(res).await? else {
            return Ok(Vec::new());
        };
        let list: DocumentList = self.decode(collection.as_str(), res).await?;
        Ok(list
            .documents
            .into_iter()
            .map(|entry| (entry.id, entry.document))
            .collect())
    }
}

/// Identity provider behind the HTTP identity API.
#[derive(Debug, Clone)]
pub struct RestIdentity {
    base_url: Url,
    http: reqwest::Client,
    token: BearerToken,
}

impl RestIdentity {
    pub fn new(base_url: &str, timeout: Duration, token: BearerToken) -> Result<Self, AdapterError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http: http_client(timeout)?,
            token,
        })
    }

    async fn authenticate(&self, action: &str, email: &str, password: &str) -> Result<Identity, AuthError> {
        let endpoint = self
            .base_url
            .join(&format!("v1/accounts/{action}"))
            .map_err(|err| AuthError::Provider(format!("invalid base_url: {err}")))?;

        let payload = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let res = self
            .http
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AuthError::Provider(err.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            return Err(auth_error(status, error_body(res).await));
        }

        let auth = res
            .json::<AuthResponse>()
            .await
            .map_err(|err| AuthError::Provider(err.to_string()))?;
        self.token.set(Some(auth.id_token)).await;
        tracing::debug!("{action} succeeded for {}", auth.email);
        Ok(Identity {
            user_id: auth.user_id,
            email: auth.email,
        })
    }
}

impl IdentityProvider for RestIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.authenticate("sign_up", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.authenticate("sign_in", email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(token) = self.token.get().await else {
            return Ok(());
        };
        self.token.set(None).await;

        let endpoint = self
            .base_url
            .join("v1/accounts/sign_out")
            .map_err(|err| AuthError::Provider(format!("invalid base_url: {err}")))?;
        match self.http.post(endpoint).bearer_auth(token).send().await {
            Ok(res) if res.status().is_success() => Ok(()),
            Ok(res) => {
                // The token is already gone locally.
                tracing::warn!("remote sign-out returned {}", res.status());
                Ok(())
            }
            Err(err) => {
                tracing::warn!("remote sign-out failed: {err}");
                Ok(())
            }
        }
    }
}
