use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::auth::Identity;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Extractor for endpoints that require a valid bearer token.
///
/// Rejects the request with 401 when the header is missing or the token is
/// malformed, expired or revoked.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub token: String,
}

/// The token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequest for Authenticated {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req).map(str::to_owned);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let path = req.path().to_owned();

        Box::pin(async move {
            let state = state
                .ok_or_else(|| AppError::InternalError("Application state not configured".into()))?;

            let token = token.ok_or_else(|| {
                warn!("Missing bearer token on {}", path);
                AuthError::MissingToken
            })?;

            let identity = state.tokens.validate(&token).await.map_err(|e| {
                warn!("Rejected token on {}: {}", path, e);
                e
            })?;

            Ok(Self { identity, token })
        })
    }
}
