use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{bearer_token, password, TokenError};
use crate::db::User;
use crate::error::AuthError;
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 200 with the new token in both the body and the `Authorization` header.
pub(crate) fn session_response(message: &str, token: &str, user: &User) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
        .json(json!({
            "status": {
                "code": 200,
                "message": message,
                "token": token,
                "data": user.profile(),
            }
        }))
}

fn no_active_session() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "status": 401,
        "message": "Couldn't find an active session."
    }))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let credentials = req.into_inner().user;
    let email = normalize_email(&credentials.email);
    info!("Received login request for email: {}", email);

    let user = match state.users.get_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            warn!("Login failed for email: {}: unknown user", email);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !password::verify(credentials.password, user.password_hash.clone()).await? {
        warn!("Login failed for email: {}: wrong password", email);
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(user.id)?;
    info!("Login successful for email: {}", email);
    Ok(session_response("Logged in successfully.", &token, &user))
}

/// Revoke the presented token. Only a currently valid token has a session to end.
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(token) = bearer_token(&req) else {
        warn!("Logout without a bearer token");
        return Ok(no_active_session());
    };

    let identity = match state.tokens.validate(token).await {
        Ok(identity) => identity,
        Err(TokenError::Store(e)) => return Err(e.into()),
        Err(e) => {
            warn!("Logout with unusable token: {}", e);
            return Ok(no_active_session());
        }
    };

    match state.tokens.revoke(token).await {
        Ok(()) => {}
        Err(TokenError::InvalidToken) => return Ok(no_active_session()),
        Err(e) => return Err(e.into()),
    }

    info!("User {} logged out", identity.user_id);
    Ok(HttpResponse::Ok().json(json!({
        "status": 200,
        "message": "Logged out successfully."
    })))
}
