//! Concrete backends for the engine's store and identity seams.
//!
//! - [`file`]: a JSON file on disk, for single-user offline use;
//! - [`rest`]: HTTP clients for a remote document API and identity API.
//!
//! In-process implementations live in `engine::memory`.
use thiserror::Error;

pub mod file;
pub mod rest;

pub use file::{FileStore, LocalIdentity};
pub use rest::{BearerToken, RestIdentity, RestStore};

/// Errors raised while building an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}
