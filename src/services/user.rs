//! User service
//!
//! Sign-up and credential checks. Token issuing lives in `auth`.

use tracing::info;

use crate::audit::EntityType;
use crate::crypto::{hash_password, verify_password};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::user::{normalize_email, validate_email};
use crate::models::{User, UserId};
use crate::storage::{AuditScope, Storage};

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Service for user accounts
pub struct UserService<'a> {
    storage: &'a Storage,
}

impl<'a> UserService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Register a new user
    pub fn signup(&self, email: &str, password: &str, name: &str) -> EnvelopeResult<User> {
        validate_email(email).map_err(EnvelopeError::Validation)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(EnvelopeError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let name = name.trim();
        let user = User::new(email, name, hash_password(password)?);

        let inserted = self
            .storage
            .users
            .insert_unique(user.clone(), |existing, new| existing.email == new.email)?;
        if inserted.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "User",
                identifier: user.email,
            });
        }
        self.storage.users.save()?;

        self.storage.log_create(
            AuditScope::user(user.id),
            EntityType::User,
            user.id,
            Some(user.email.clone()),
            &user.profile(),
        )?;
        info!(user_id = %user.id, "User signed up");

        Ok(user)
    }

    /// Check credentials
    ///
    /// Unknown emails and wrong passwords produce the same error.
    pub fn login(&self, email: &str, password: &str) -> EnvelopeResult<User> {
        let email = normalize_email(email);
        let invalid = || EnvelopeError::Unauthorized("Invalid email or password".into());

        let user = self
            .storage
            .users
            .find(|u| u.email == email)?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash) {
            return Err(invalid());
        }

        Ok(user)
    }

    pub fn get(&self, id: UserId) -> EnvelopeResult<User> {
        self.storage
            .users
            .get(id)?
            .ok_or_else(|| EnvelopeError::not_found("User", id.to_string()))
    }

    pub fn find_by_email(&self, email: &str) -> EnvelopeResult<Option<User>> {
        let email = normalize_email(email);
        self.storage.users.find(|u| u.email == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::create_test_storage;

    #[test]
    fn test_signup_and_login() {
        let (_temp, storage) = create_test_storage();
        let service = UserService::new(&storage);

        let user = service.signup("Ann@Example.com", "password123", "Ann").unwrap();
        assert_eq!(user.email, "ann@example.com");
        assert_ne!(user.password_hash, "password123");

        let logged_in = service.login("ANN@example.com", "password123").unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn test_duplicate_email() {
        let (_temp, storage) = create_test_storage();
        let service = UserService::new(&storage);
        service.signup("ann@example.com", "password123", "Ann").unwrap();

        let err = service.signup(" ANN@example.com", "password456", "Other").unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_signup_validation() {
        let (_temp, storage) = create_test_storage();
        let service = UserService::new(&storage);

        assert!(service.signup("not-an-email", "password123", "X").unwrap_err().is_validation());
        assert!(service.signup("a@b.co", "short", "X").unwrap_err().is_validation());
    }

    #[test]
    fn test_bad_credentials_are_indistinguishable() {
        let (_temp, storage) = create_test_storage();
        let service = UserService::new(&storage);
        service.signup("ann@example.com", "password123", "Ann").unwrap();

        let wrong_password = service.login("ann@example.com", "nope-nope").unwrap_err();
        let unknown = service.login("bob@example.com", "password123").unwrap_err();
        assert_eq!(wrong_password.status_code(), 401);
        assert_eq!(wrong_password.to_string(), unknown.to_string());
    }
}
