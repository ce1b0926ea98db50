//! Identity collaborator: turns bearer credentials into users and user ids into
//! display names. The sharing service never issues or stores credentials itself.

mod remote;
mod static_tokens;

pub use remote::RemoteAuthenticator;
pub use static_tokens::StaticAuthenticator;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Auth service error: {0}")]
    Backend(String),
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer credential. `Ok(None)` means the credential is not valid.
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AuthError>;

    /// Display name of a user, if the user is known.
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, AuthError>;
}
