//! The identity provider seam.
use std::future::Future;

use crate::AuthError;

/// The signed-in user, as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id; also the key of the profile document.
    pub user_id: String,
    pub email: String,
}

/// Email/password identity provider.
///
/// Provider specific failures are mapped onto [`AuthError`].
pub trait IdentityProvider: Send + Sync {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}
