use actix_web::web;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::InternalError(format!("Stored password hash is invalid: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// `hash_password` on the blocking thread pool.
pub async fn hash(password: String) -> Result<String, AppError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| AppError::InternalError(format!("Password hashing task failed: {}", e)))?
}

/// `verify_password` on the blocking thread pool.
pub async fn verify(password: String, password_hash: String) -> Result<bool, AppError> {
    web::block(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::InternalError(format!("Password verification task failed: {}", e)))?
}
