use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AuthError, Authenticator, User};

/// Client for the external user service.
///
/// `GET {base}/api/auth/me` resolves the caller's bearer token and
/// `GET {base}/api/users/{id}` looks up other users; both answer `{"user": {...}}`.
pub struct RemoteAuthenticator {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: RemoteUser,
}

#[derive(Deserialize)]
struct RemoteUser {
    #[serde(alias = "_id")]
    id: String,
    username: String,
}

impl RemoteAuthenticator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn me_url(&self) -> String {
        format!("{}/api/auth/me", self.base_url)
    }

    fn user_url(&self, user_id: &str) -> String {
        format!(
            "{}/api/users/{}",
            self.base_url,
            urlencoding::encode(user_id)
        )
    }

    async fn fetch_user(
        &self,
        request: reqwest::RequestBuilder,
        missing: &[StatusCode],
    ) -> Result<Option<User>, AuthError> {
        let resp = request
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = resp.status();
        if missing.contains(&status) {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Backend(format!(
                "user service returned {status}: {body}"
            )));
        }

        let envelope: UserEnvelope = resp
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("invalid user payload: {e}")))?;

        Ok(Some(User {
            id: envelope.user.id,
            username: envelope.user.username,
        }))
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AuthError> {
        let request = self.client.get(self.me_url()).bearer_auth(credential);
        self.fetch_user(request, &[StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN])
            .await
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, AuthError> {
        let request = self.client.get(self.user_url(user_id));
        Ok(self
            .fetch_user(request, &[StatusCode::NOT_FOUND])
            .await?
            .map(|user| user.username))
    }
}
