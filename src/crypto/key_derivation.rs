//! Argon2id key derivation for the token cipher
//!
//! The server secret is stretched into a 256-bit AES key with a salt that is
//! generated once and persisted in the settings file, so restarts with the
//! same secret can still open stored aggregator tokens.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EnvelopeError, EnvelopeResult};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters and salt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Base64 salt; empty until generated
    pub salt: String,
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            salt: String::new(),
            memory_cost: 64 * 1024,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

fn random_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

impl KeyDerivationParams {
    /// Default costs with a fresh random salt
    pub fn new() -> Self {
        Self {
            salt: random_salt(),
            ..Default::default()
        }
    }

    /// Random salt with the smallest costs Argon2 accepts
    ///
    /// Only for tests; derivation with the defaults takes most of a second.
    pub fn insecure_fast() -> Self {
        Self {
            salt: random_salt(),
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.salt.is_empty()
    }
}

/// A derived 256-bit key, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

/// Stretch `secret` into an AES-256 key
pub fn derive_key(secret: &str, params: &KeyDerivationParams) -> EnvelopeResult<DerivedKey> {
    let salt = STANDARD
        .decode(&params.salt)
        .map_err(|e| EnvelopeError::Encryption(format!("Invalid salt: {}", e)))?;
    if salt.len() < SALT_LEN {
        return Err(EnvelopeError::Encryption(
            "Key derivation salt is missing or too short; run 'envelope-server init'".into(),
        ));
    }

    let costs = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| EnvelopeError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;

    let mut key = DerivedKey { key: [0u8; KEY_LEN] };
    Argon2::new(Algorithm::Argon2id, Version::V0x13, costs)
        .hash_password_into(secret.as_bytes(), &salt, &mut key.key)
        .map_err(|e| EnvelopeError::Encryption(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_secret_and_salt() {
        let params = KeyDerivationParams::insecure_fast();
        let first = derive_key("server-secret-value", &params).unwrap();
        let again = derive_key("server-secret-value", &params).unwrap();
        let other = derive_key("another-secret-val", &params).unwrap();

        assert_eq!(first.as_bytes(), again.as_bytes());
        assert_ne!(first.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_salt_changes_key() {
        let a = derive_key("same", &KeyDerivationParams::insecure_fast()).unwrap();
        let b = derive_key("same", &KeyDerivationParams::insecure_fast()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_missing_salt_rejected() {
        let params = KeyDerivationParams::default();
        assert!(!params.is_initialized());
        assert!(derive_key("secret", &params).is_err());
        assert!(KeyDerivationParams::new().is_initialized());
    }
}
