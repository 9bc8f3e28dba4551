use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::session_store::{SessionStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub jti: String,  // Token ID, the revocation handle
    pub iat: i64,     // Issued at
    pub exp: i64,     // Expiration time
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// The authenticated subject of a valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: Uuid,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is malformed or its signature does not verify")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Only a currently valid token can be revoked")]
    InvalidToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Mints, validates and revokes HS256 bearer tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        jwt_secret: &str,
        ttl: Duration,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Expiry is checked against `clock`, not the wall clock jsonwebtoken would use.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            ttl,
            store,
            clock,
        }
    }

    pub fn issue(&self, subject: Uuid) -> Result<String, TokenError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        debug!("Issued token {} for {}", claims.jti, claims.sub);
        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.verify(token)?;

        if self.store.is_revoked(&claims.jti).await? {
            debug!("Rejected revoked token {}", claims.jti);
            return Err(TokenError::Revoked);
        }

        Self::identity_of(&claims)
    }

    /// Add the token to the denylist. Revoking a token that is already
    /// revoked succeeds without touching the store.
    pub async fn revoke(&self, token: &str) -> Result<(), TokenError> {
        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(TokenError::InvalidSignature) | Err(TokenError::Expired) => {
                return Err(TokenError::InvalidToken)
            }
            Err(e) => return Err(e),
        };

        if self.store.is_revoked(&claims.jti).await? {
            debug!("Token {} already revoked", claims.jti);
            return Ok(());
        }

        self.store
            .record_revocation(&claims.jti, claims.expires_at())
            .await?;

        info!("Revoked token {} for {}", claims.jti, claims.sub);
        Ok(())
    }

    /// Signature and expiry checks only; no store access.
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                warn!("Token failed verification: {}", e);
                TokenError::InvalidSignature
            })?
            .claims;

        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn identity_of(claims: &Claims) -> Result<Identity, TokenError> {
        Uuid::parse_str(&claims.sub)
            .map(Identity::new)
            .map_err(|_| TokenError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::session_store::MemorySessionStore;

    fn service() -> (TokenService, Arc<MemorySessionStore>, Arc<ManualClock>) {
        let store = Arc::new(MemorySessionStore::new());
        let clock = Arc::new(ManualClock::default());
        let service = TokenService::new("test_secret", Duration::hours(1), store.clone(), clock.clone());
        (service, store, clock)
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let (service, _, _) = service();
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id).unwrap();
        let identity = service.validate(&token).await.unwrap();
        assert_eq!(identity.user_id, user_id);
    }

    #[tokio::test]
    async fn test_each_token_gets_fresh_jti() {
        let (service, _, _) = service();
        let user_id = Uuid::new_v4();

        let a = service.verify(&service.issue(user_id).unwrap()).unwrap();
        let b = service.verify(&service.issue(user_id).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.exp - a.iat, 3600);
    }

    #[test]
    fn test_issue_with_unrepresentable_expiry() {
        let service = TokenService::new(
            "test_secret",
            Duration::hours(10_000_000_000),
            Arc::new(MemorySessionStore::new()),
            Arc::new(ManualClock::default()),
        );

        assert!(matches!(service.issue(Uuid::new_v4()), Err(TokenError::Signing(_))));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (service, _, clock) = service();
        let token = service.issue(Uuid::new_v4()).unwrap();

        clock.advance(Duration::hours(1));
        assert!(service.validate(&token).await.is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(service.validate(&token).await, Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn test_expired_wins_over_revoked() {
        let (service, _, clock) = service();
        let token = service.issue(Uuid::new_v4()).unwrap();

        service.revoke(&token).await.unwrap();
        clock.advance(Duration::hours(2));

        assert!(matches!(service.validate(&token).await, Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid_signature() {
        let (service, store, clock) = service();
        let other = TokenService::new("another_secret", Duration::hours(1), store, clock);

        let token = other.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(service.validate(&token).await, Err(TokenError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_revoke_records_jti_and_expiry() {
        let (service, store, _) = service();
        let token = service.issue(Uuid::new_v4()).unwrap();
        let claims = service.verify(&token).unwrap();

        service.revoke(&token).await.unwrap();

        assert_eq!(store.expiry_of(&claims.jti).await, Some(claims.expires_at()));
    }

    #[tokio::test]
    async fn test_revoke_rejects_unusable_tokens() {
        let (service, _, clock) = service();

        assert!(matches!(service.revoke("garbage").await, Err(TokenError::InvalidToken)));

        let token = service.issue(Uuid::new_v4()).unwrap();
        clock.advance(Duration::hours(3));
        assert!(matches!(service.revoke(&token).await, Err(TokenError::InvalidToken)));
    }
}
