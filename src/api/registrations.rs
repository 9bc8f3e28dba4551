//! Account lifecycle: sign up, profile update and account deletion.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::api::{is_blank, to_sentence};
use crate::auth::handlers::{normalize_email, session_response};
use crate::auth::{password, Authenticated};
use crate::db::User;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::{AppState, Result};

const MIN_PASSWORD_LENGTH: usize = 6;
const EMAIL_TAKEN: &str = "Email has already been taken";

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub user: RegistrationParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccountUpdateRequest {
    pub user: AccountUpdateParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountUpdateParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

fn validate_profile(name: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if is_blank(name) {
        errors.push("Name can't be blank".to_string());
    }
    if is_blank(email) {
        errors.push("Email can't be blank".to_string());
    } else if !is_valid_email(email) {
        errors.push("Email is invalid".to_string());
    }
    errors
}

fn validate_password(password: &str, confirmation: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();
    if password.is_empty() {
        errors.push("Password can't be blank".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password is too short (minimum is {} characters)",
            MIN_PASSWORD_LENGTH
        ));
    }
    if let Some(confirmation) = confirmation {
        if confirmation != password {
            errors.push("Password confirmation doesn't match Password".to_string());
        }
    }
    errors
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn status_error(prefix: &str, errors: &[String]) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(json!({
        "status": { "message": format!("{} {}", prefix, to_sentence(errors)) }
    }))
}

fn registration_failed(errors: &[String]) -> HttpResponse {
    status_error("User couldn't be created successfully.", errors)
}

fn update_failed(errors: &[String]) -> HttpResponse {
    status_error("Account couldn't be updated successfully.", errors)
}

async fn email_taken_by_other(state: &AppState, email: &str, user: Option<&User>) -> Result<bool> {
    let existing = state.users.get_user_by_email(email).await?;
    Ok(match (existing, user) {
        (Some(existing), Some(user)) => existing.id != user.id,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

pub async fn register(
    req: web::Json<RegistrationRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let params = req.into_inner().user;
    let email = normalize_email(&params.email);
    info!("Received registration request for email: {}", email);

    let mut errors = validate_profile(&params.name, &email);
    errors.extend(validate_password(&params.password, params.password_confirmation.as_deref()));
    if errors.is_empty() && email_taken_by_other(&state, &email, None).await? {
        errors.push(EMAIL_TAKEN.to_string());
    }
    if !errors.is_empty() {
        warn!("Registration failed for email: {}: {}", email, errors.join(", "));
        return Ok(registration_failed(&errors));
    }

    let user = User::new(
        params.name.trim().to_string(),
        email,
        password::hash(params.password).await?,
    );
    let user = match state.users.create_user(&user).await {
        Ok(user) => user,
        Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
            return Ok(registration_failed(&[EMAIL_TAKEN.to_string()]));
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", user.email, e);
            return Err(e);
        }
    };

    let token = state.tokens.issue(user.id)?;
    info!("Registration successful for email: {}", user.email);
    Ok(session_response("Signed up successfully.", &token, &user))
}

pub async fn update(
    auth: Authenticated,
    req: web::Json<AccountUpdateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut user = state
        .users
        .get_user_by_id(auth.identity.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let params = req.into_inner().user;
    if let Some(name) = params.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = params.email {
        user.email = normalize_email(&email);
    }

    let mut errors = validate_profile(&user.name, &user.email);
    let new_password = params.password.filter(|p| !p.is_empty());
    if let Some(new_password) = &new_password {
        errors.extend(validate_password(new_password, params.password_confirmation.as_deref()));
    }
    if errors.is_empty() && email_taken_by_other(&state, &user.email, Some(&user)).await? {
        errors.push(EMAIL_TAKEN.to_string());
    }
    if !errors.is_empty() {
        warn!("Account update failed for {}: {}", user.id, errors.join(", "));
        return Ok(update_failed(&errors));
    }

    if let Some(new_password) = new_password {
        user.password_hash = password::hash(new_password).await?;
    }

    let user = match state.users.update_user(&user).await {
        Ok(user) => user,
        Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
            return Ok(update_failed(&[EMAIL_TAKEN.to_string()]));
        }
        Err(e) => return Err(e),
    };

    info!("Account {} updated", user.id);
    Ok(HttpResponse::Ok().json(json!({
        "status": { "code": 200, "message": "Account updated successfully." },
        "data": user.profile(),
    })))
}

/// Delete the caller's account and its posts, then end the current session.
pub async fn destroy(
    auth: Authenticated,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = auth.identity.user_id;

    if !state.users.delete_user(user_id).await? {
        warn!("Account {} could not be deleted: not found", user_id);
        return Ok(HttpResponse::UnprocessableEntity().json(json!({
            "status": { "message": "Account couldn't be deleted. User no longer exists." }
        })));
    }

    if let Err(e) = state.tokens.revoke(&auth.token).await {
        error!("Account {} deleted but its token was not revoked: {}", user_id, e);
    }

    info!("Account {} deleted", user_id);
    Ok(HttpResponse::Ok().json(json!({
        "status": { "code": 200, "message": "Account deleted successfully." }
    })))
}
