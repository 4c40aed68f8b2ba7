//! Cryptographic functions
//!
//! Argon2id password hashing for user accounts, plus AES-256-GCM with an
//! Argon2id-derived key for aggregator access tokens at rest.

pub mod encryption;
pub mod key_derivation;
pub mod password;
pub mod secure_memory;

pub use encryption::{EncryptedData, TokenCipher};
pub use key_derivation::{derive_key, KeyDerivationParams};
pub use password::{hash_password, verify_password};
pub use secure_memory::SecureString;
