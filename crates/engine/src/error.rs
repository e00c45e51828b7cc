//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Validation`] the caller passed bad input; nothing was mutated.
//! - [`NotFound`] the referenced expense is not in the ledger.
//! - [`Sync`] the document store was unreachable or rejected the call.
//! - [`Auth`] the identity provider rejected the request, or nobody is
//!   signed in.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`Sync`]: EngineError::Sync
//!  [`Auth`]: EngineError::Auth
use std::time::Duration;

use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// `true` for failures of the document store.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Sync(_))
    }
}

/// Failures talking to the document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("malformed document at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Failures reported by the identity provider (or by the session gate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("this email is already registered")]
    EmailInUse,
    #[error("password should be at least 6 characters")]
    WeakPassword,
    #[error("no account found with this email")]
    UserNotFound,
    #[error("incorrect password")]
    WrongPassword,
    #[error("user data not found")]
    ProfileMissing,
    #[error("not signed in")]
    NotSignedIn,
    #[error("identity provider error: {0}")]
    Provider(String),
}
