//! Aggregator access tokens at rest
//!
//! Tokens are sealed with AES-256-GCM under a key derived from the server
//! secret. Every seal draws a fresh 96-bit nonce, stored next to the
//! ciphertext in base64.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, EnvelopeResult};

use super::{derive_key, KeyDerivationParams, SecureString};

const NONCE_LEN: usize = 12;
const CURRENT_VERSION: u8 = 1;

/// A sealed token as persisted in `institutions.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: String,
    /// Ciphertext with the GCM tag appended
    pub ciphertext: String,
    #[serde(default = "current_version")]
    pub version: u8,
}

fn current_version() -> u8 {
    CURRENT_VERSION
}

fn sealed_error(what: &str) -> impl Fn(base64::DecodeError) -> EnvelopeError + '_ {
    move |e| EnvelopeError::Encryption(format!("Invalid {} encoding: {}", what, e))
}

/// Seals and opens access tokens; cheap to clone
#[derive(Clone)]
pub struct TokenCipher {
    aead: Arc<Aes256Gcm>,
}

impl TokenCipher {
    /// Derive the key from the server secret and the persisted salt
    pub fn from_secret(secret: &str, params: &KeyDerivationParams) -> EnvelopeResult<Self> {
        let key = derive_key(secret, params)?;
        let aead = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| EnvelopeError::Encryption(format!("Bad cipher key: {}", e)))?;
        Ok(Self { aead: Arc::new(aead) })
    }

    pub fn seal(&self, token: &str) -> EnvelopeResult<EncryptedData> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), token.as_bytes())
            .map_err(|_| EnvelopeError::Encryption("Failed to seal access token".into()))?;

        Ok(EncryptedData {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
            version: CURRENT_VERSION,
        })
    }

    /// Fails when the data was sealed under a different secret or altered
    pub fn open(&self, sealed: &EncryptedData) -> EnvelopeResult<SecureString> {
        if sealed.version != CURRENT_VERSION {
            return Err(EnvelopeError::Encryption(format!(
                "Unsupported token encryption version {}",
                sealed.version
            )));
        }

        let nonce = STANDARD.decode(&sealed.nonce).map_err(sealed_error("nonce"))?;
        if nonce.len() != NONCE_LEN {
            return Err(EnvelopeError::Encryption(format!(
                "Nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }
        let ciphertext = STANDARD
            .decode(&sealed.ciphertext)
            .map_err(sealed_error("ciphertext"))?;

        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| {
                EnvelopeError::Encryption("Cannot open access token: wrong secret or corrupted data".into())
            })?;

        String::from_utf8(plaintext)
            .map(SecureString::new)
            .map_err(|_| EnvelopeError::Encryption("Access token is not UTF-8".into()))
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenCipher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher_for(secret: &str, params: &KeyDerivationParams) -> TokenCipher {
        TokenCipher::from_secret(secret, params).unwrap()
    }

    #[test]
    fn test_seal_and_open() {
        let cipher = cipher_for("server-secret-0001", &KeyDerivationParams::insecure_fast());
        let sealed = cipher.seal("access-sandbox-123").unwrap();
        assert!(!sealed.ciphertext.contains("access-sandbox"));
        assert_eq!(cipher.open(&sealed).unwrap().as_str(), "access-sandbox-123");

        let again = cipher.seal("access-sandbox-123").unwrap();
        assert_ne!(sealed.nonce, again.nonce);
    }

    #[test]
    fn test_other_secret_cannot_open() {
        let params = KeyDerivationParams::insecure_fast();
        let sealed = cipher_for("server-secret-0001", &params).seal("tok").unwrap();
        assert!(cipher_for("server-secret-0002", &params).open(&sealed).is_err());
    }

    #[test]
    fn test_rejects_altered_data() {
        let cipher = cipher_for("server-secret-0001", &KeyDerivationParams::insecure_fast());
        let sealed = cipher.seal("tok").unwrap();

        let mut bytes = STANDARD.decode(&sealed.ciphertext).unwrap();
        bytes[0] ^= 0xFF;
        let tampered = EncryptedData {
            ciphertext: STANDARD.encode(&bytes),
            ..sealed.clone()
        };
        assert!(cipher.open(&tampered).is_err());

        let future = EncryptedData { version: 2, ..sealed.clone() };
        assert!(cipher.open(&future).is_err());

        let short_nonce = EncryptedData {
            nonce: STANDARD.encode([0u8; 4]),
            ..sealed
        };
        assert!(cipher.open(&short_nonce).is_err());
    }
}
