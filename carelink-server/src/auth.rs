//! Password hashing and access tokens
//!
//! Passwords are stored as Argon2id PHC strings. Argon2 is CPU-bound, so
//! hashing and verification run on the blocking pool. Access tokens are
//! HS256 JWTs whose `sub` is the user id as a decimal string.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Authentication error type
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id")]
    Subject,

    #[error("token lifetime of {0} hours is out of range")]
    Ttl(i64),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signing and verification keys derived from the configured secret
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self, AuthError> {
        let ttl = Duration::try_hours(ttl_hours).ok_or(AuthError::Ttl(ttl_hours))?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// Issue a token for `uid`.
    pub fn issue(&self, uid: i32) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::Ttl(self.ttl.num_hours()))?;
        let claims = Claims {
            sub: uid.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, returning the user id.
    pub fn verify(&self, token: &str) -> Result<i32, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        data.claims.sub.parse().map_err(|_| AuthError::Subject)
    }
}

pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&password)).await?
}

/// False for a wrong password or an unparseable stored hash.
pub async fn verify_password(password: &str, stored_hash: &str) -> bool {
    let (password, stored_hash) = (password.to_owned(), stored_hash.to_owned());
    match tokio::task::spawn_blocking(move || verify_blocking(&password, &stored_hash)).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::error!(error = %e, "password verification task failed");
            false
        }
    }
}

fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_blocking(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn token_round_trips_user_id() {
        let keys = AuthKeys::new("test-secret", 1).unwrap();
        let token = keys.issue(42).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), 42);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = AuthKeys::new("one", 1).unwrap().issue(7).unwrap();
        assert!(matches!(
            AuthKeys::new("two", 1).unwrap().verify(&token),
            Err(AuthError::Token(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Validation allows 60s of leeway, so expire well beyond it.
        let keys = AuthKeys::new("test-secret", -1).unwrap();
        let token = keys.issue(1).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn out_of_range_ttl_is_an_error() {
        assert!(matches!(AuthKeys::new("s", i64::MAX), Err(AuthError::Ttl(i64::MAX))));

        // Representable as a duration but past the end of the calendar.
        let keys = AuthKeys::new("s", 24 * 365 * 1_000_000).unwrap();
        assert!(matches!(keys.issue(1), Err(AuthError::Ttl(_))));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).await);
        assert!(!verify_password("battery staple", &hash).await);
    }

    #[tokio::test]
    async fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string").await);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_leaves_the_runtime_free() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        });

        hash_password("correct horse").await.unwrap();
        ticker.abort();

        assert!(ticks.load(Ordering::Relaxed) > 0);
    }
}
