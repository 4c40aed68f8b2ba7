//! Onboarding service

use tracing::debug;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, OnboardingError, OnboardingState, UserId};
use crate::services::access::{authorize, Permission};
use crate::storage::{AuditScope, Storage};

/// Every refused transition, a missing budget included, is a 409
impl From<OnboardingError> for EnvelopeError {
    fn from(err: OnboardingError) -> Self {
        EnvelopeError::Conflict(err.to_string())
    }
}

/// Service for a user's onboarding progress
pub struct OnboardingService<'a> {
    storage: &'a Storage,
}

impl<'a> OnboardingService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// The user's state, created at the first step on first read
    pub fn get(&self, user_id: UserId) -> EnvelopeResult<OnboardingState> {
        if let Some(state) = self.storage.onboarding.get(user_id)? {
            return Ok(state);
        }

        let state = OnboardingState::new(user_id);
        if self.storage.onboarding.insert_new(state.clone())? {
            self.storage.onboarding.save()?;
            return Ok(state);
        }
        // Another request created it first
        self.storage
            .onboarding
            .get(user_id)?
            .ok_or_else(|| EnvelopeError::Storage("Onboarding state vanished".into()))
    }

    /// Move forward; `budget_id` is required when leaving the budget step
    pub fn advance(&self, user_id: UserId, budget_id: Option<BudgetId>) -> EnvelopeResult<OnboardingState> {
        if let Some(budget_id) = budget_id {
            authorize(self.storage, user_id, budget_id, Permission::Read)?;
        }
        self.transition(user_id, |state| state.advance(budget_id).map(|_| ()))
    }

    pub fn back(&self, user_id: UserId) -> EnvelopeResult<OnboardingState> {
        self.transition(user_id, |state| state.back().map(|_| ()))
    }

    /// Skip the current step if it is optional
    pub fn skip(&self, user_id: UserId) -> EnvelopeResult<OnboardingState> {
        self.transition(user_id, |state| state.skip().map(|_| ()))
    }

    /// Start over from the first step
    pub fn reset(&self, user_id: UserId) -> EnvelopeResult<OnboardingState> {
        self.transition(user_id, |state| {
            state.reset();
            Ok(())
        })
    }

    fn transition<F>(&self, user_id: UserId, change: F) -> EnvelopeResult<OnboardingState>
    where
        F: FnOnce(&mut OnboardingState) -> Result<(), OnboardingError>,
    {
        let before = self.get(user_id)?;
        let mut state = before.clone();
        change(&mut state)?;

        self.storage.onboarding.upsert(state.clone())?;
        self.storage.onboarding.save()?;

        self.storage.log_update(
            AuditScope::user(user_id),
            EntityType::Onboarding,
            user_id,
            None,
            &before,
            &state,
        )?;
        debug!(user_id = %user_id, step = %state.step, "Onboarding moved");

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OnboardingStep;
    use crate::services::test_support::{create_test_storage, create_user, setup_budget};

    #[test]
    fn test_created_on_first_read() {
        let (_temp, storage) = create_test_storage();
        let user = create_user(&storage, "new@example.com");
        let service = OnboardingService::new(&storage);

        let state = service.get(user.id).unwrap();
        assert_eq!(state.step, OnboardingStep::Welcome);
        assert!(storage.onboarding.exists(user.id).unwrap());
    }

    #[test]
    fn test_walkthrough() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let user = access.user_id;
        let service = OnboardingService::new(&storage);

        assert_eq!(service.back(user).unwrap_err().status_code(), 409);
        assert_eq!(service.advance(user, None).unwrap().step, OnboardingStep::CreateBudget);
        assert_eq!(service.skip(user).unwrap_err().status_code(), 409);
        assert_eq!(service.advance(user, None).unwrap_err().status_code(), 409);

        let state = service.advance(user, Some(access.budget_id())).unwrap();
        assert_eq!(state.step, OnboardingStep::LinkAccounts);
        assert_eq!(state.budget_id, Some(access.budget_id()));

        assert_eq!(service.skip(user).unwrap().step, OnboardingStep::ChooseCategories);
        assert_eq!(service.advance(user, None).unwrap().step, OnboardingStep::SetTargets);
        let done = service.skip(user).unwrap();
        assert_eq!(done.step, OnboardingStep::Complete);
        assert!(done.completed_at.is_some());
        assert_eq!(service.advance(user, None).unwrap_err().status_code(), 409);

        let reset = service.reset(user).unwrap();
        assert_eq!(reset.step, OnboardingStep::Welcome);
        assert!(reset.budget_id.is_none());
    }

    #[test]
    fn test_advance_requires_membership() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let stranger = create_user(&storage, "stranger@example.com");
        let service = OnboardingService::new(&storage);

        service.advance(stranger.id, None).unwrap();
        let err = service.advance(stranger.id, Some(access.budget_id())).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
