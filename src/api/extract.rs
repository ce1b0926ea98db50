use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::response::ApiError;
use crate::auth::User;
use crate::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Rejects with 401 before the handler body runs.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

        match state.authenticator.resolve(credential).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err(ApiError::unauthorized("Invalid or expired token")),
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve credential");
                Err(ApiError::unavailable("Authentication service unavailable"))
            }
        }
    }
}
