//! Bearer token issuing and verification
//!
//! Tokens are HS256 JWTs signed with the server secret. The subject is the
//! user's UUID.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::UserId;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Signs and verifies bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_hours: u32) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::hours(i64::from(ttl_hours)),
        }
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: UserId) -> EnvelopeResult<String> {
        let now = Utc::now();
        self.issue_at(user_id, now.timestamp(), (now + self.ttl).timestamp())
    }

    fn issue_at(&self, user_id: UserId, iat: i64, exp: i64) -> EnvelopeResult<String> {
        let claims = Claims {
            sub: user_id.as_uuid().to_string(),
            exp,
            iat,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| EnvelopeError::Encryption(format!("Failed to sign token: {}", e)))
    }

    /// Verify a token and return the user it was issued to
    pub fn verify(&self, token: &str) -> EnvelopeResult<UserId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| EnvelopeError::Unauthorized("Invalid or expired token".into()))?;

        UserId::parse(&data.claims.sub)
            .map_err(|_| EnvelopeError::Unauthorized("Invalid or expired token".into()))
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_hours", &self.ttl.num_hours())
            .finish_non_exhaustive()
    }
}
