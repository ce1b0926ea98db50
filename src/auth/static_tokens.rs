use std::collections::HashMap;

use async_trait::async_trait;

use super::{AuthError, Authenticator, User};
use crate::config::StaticToken;

/// Fixed credential table, for development and tests.
pub struct StaticAuthenticator {
    by_token: HashMap<String, User>,
    names: HashMap<String, String>,
}

impl StaticAuthenticator {
    pub fn new(tokens: &[StaticToken]) -> Self {
        let mut by_token = HashMap::with_capacity(tokens.len());
        let mut names = HashMap::with_capacity(tokens.len());
        for entry in tokens {
            by_token.insert(
                entry.token.clone(),
                User {
                    id: entry.user_id.clone(),
                    username: entry.username.clone(),
                },
            );
            names.insert(entry.user_id.clone(), entry.username.clone());
        }
        Self { by_token, names }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AuthError> {
        Ok(self.by_token.get(credential).cloned())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, AuthError> {
        Ok(self.names.get(user_id).cloned())
    }
}
