//! Authentication hook: turns a bearer token into a [`User`].
//!
//! The server calls the [`Authenticator`] once per connection, before any
//! room logic runs. [`StoreAuthenticator`] resolves tokens through a
//! [`MembershipStore`]; tests and deployments with an external identity
//! provider plug in their own implementation.

use std::sync::Arc;

use classforge_store::{MembershipStore, StoreError, User};

use crate::SessionError;

/// Validates a client's bearer token and returns their identity.
///
/// # Example
///
/// ```rust
/// use classforge_protocol::{Role, UserId};
/// use classforge_session::{Authenticator, SessionError};
/// use classforge_store::User;
///
/// /// Treats the token as a username and makes everyone a student.
/// /// Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<User, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::Unauthenticated("empty token".into()));
///         }
///         Ok(User {
///             id: UserId(token.len() as u64),
///             username: token.to_string(),
///             email: String::new(),
///             role: Role::Student,
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the token.
    ///
    /// # Returns
    /// - `Ok(User)` if the token is valid
    /// - `Err(SessionError::Unauthenticated)` if it is not
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<User, SessionError>> + Send;
}

/// Resolves bearer tokens with [`MembershipStore::user_by_token`].
pub struct StoreAuthenticator<S> {
    store: Arc<S>,
}

impl<S> StoreAuthenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: MembershipStore> Authenticator for StoreAuthenticator<S> {
    async fn authenticate(&self, token: &str) -> Result<User, SessionError> {
        match self.store.user_by_token(token).await {
            Ok(user) => Ok(user),
            Err(StoreError::InvalidToken | StoreError::UserNotFound(_)) => {
                Err(SessionError::Unauthenticated("invalid token".into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
