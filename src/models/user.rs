//! User model
//!
//! Users own and share budgets. Passwords are only ever stored as Argon2
//! PHC hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::UserId;

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Login email, stored lowercased
    pub email: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Argon2 password hash (PHC string format)
    pub password_hash: String,

    /// When the user signed up
    pub created_at: DateTime<Utc>,

    /// When the user last changed their profile
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user from an already-hashed password
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: normalize_email(&email.into()),
            name: name.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view without the password hash
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// User data safe to return over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Trim and lowercase an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal structural check: something@something.something
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(format!("Invalid email address: {}", email));
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err(format!("Invalid email address: {}", email));
    }
    if email.len() > 254 {
        return Err("Email address too long".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let user = User::new("  Alice@Example.COM ", "Alice", "hash");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_profile_hides_hash() {
        let user = User::new("a@b.co", "A", "secret-hash");
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a@.com").is_err());
    }
}
