//! Onboarding step machine
//!
//! New users walk through a fixed sequence of steps. Each user has exactly
//! one onboarding state, created lazily on first read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{BudgetId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Welcome,
    CreateBudget,
    LinkAccounts,
    ChooseCategories,
    SetTargets,
    Complete,
}

impl OnboardingStep {
    /// All steps in order
    pub fn all() -> &'static [Self] {
        &[
            Self::Welcome,
            Self::CreateBudget,
            Self::LinkAccounts,
            Self::ChooseCategories,
            Self::SetTargets,
            Self::Complete,
        ]
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Welcome => Some(Self::CreateBudget),
            Self::CreateBudget => Some(Self::LinkAccounts),
            Self::LinkAccounts => Some(Self::ChooseCategories),
            Self::ChooseCategories => Some(Self::SetTargets),
            Self::SetTargets => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    pub fn prev(&self) -> Option<Self> {
        match self {
            Self::Welcome => None,
            Self::CreateBudget => Some(Self::Welcome),
            Self::LinkAccounts => Some(Self::CreateBudget),
            Self::ChooseCategories => Some(Self::LinkAccounts),
            Self::SetTargets => Some(Self::ChooseCategories),
            Self::Complete => Some(Self::SetTargets),
        }
    }

    /// Steps a user may skip without completing them
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::LinkAccounts | Self::SetTargets)
    }

    /// Zero-based position in the sequence
    pub fn index(&self) -> usize {
        Self::all().iter().position(|s| s == self).unwrap_or(0)
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Welcome => "welcome",
            Self::CreateBudget => "create_budget",
            Self::LinkAccounts => "link_accounts",
            Self::ChooseCategories => "choose_categories",
            Self::SetTargets => "set_targets",
            Self::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// A rejected onboarding transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    AlreadyComplete,
    AtFirstStep,
    NotSkippable(OnboardingStep),
    BudgetRequired,
}

impl fmt::Display for OnboardingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyComplete => write!(f, "Onboarding is already complete"),
            Self::AtFirstStep => write!(f, "Cannot go back from the first step"),
            Self::NotSkippable(step) => write!(f, "Step '{}' cannot be skipped", step),
            Self::BudgetRequired => {
                write!(f, "A budget must be created before linking accounts")
            }
        }
    }
}

impl std::error::Error for OnboardingError {}

/// Where a user is in onboarding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingState {
    pub user_id: UserId,
    pub step: OnboardingStep,
    pub budget_id: Option<BudgetId>,

    /// Steps the user skipped on the way
    #[serde(default)]
    pub skipped: Vec<OnboardingStep>,

    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OnboardingState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            step: OnboardingStep::Welcome,
            budget_id: None,
            skipped: Vec::new(),
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step == OnboardingStep::Complete
    }

    /// Move to the next step
    ///
    /// Leaving `create_budget` requires a budget; the caller checks
    /// membership before passing it in.
    pub fn advance(&mut self, budget_id: Option<BudgetId>) -> Result<OnboardingStep, OnboardingError> {
        let next = self.step.next().ok_or(OnboardingError::AlreadyComplete)?;

        if self.step == OnboardingStep::CreateBudget {
            let budget_id = budget_id
                .or(self.budget_id)
                .ok_or(OnboardingError::BudgetRequired)?;
            self.budget_id = Some(budget_id);
        }

        self.move_to(next);
        Ok(next)
    }

    pub fn back(&mut self) -> Result<OnboardingStep, OnboardingError> {
        let prev = self.step.prev().ok_or(OnboardingError::AtFirstStep)?;
        self.skipped.retain(|s| *s != prev);
        self.move_to(prev);
        Ok(prev)
    }

    pub fn skip(&mut self) -> Result<OnboardingStep, OnboardingError> {
        if !self.step.is_skippable() {
            return Err(OnboardingError::NotSkippable(self.step));
        }
        let next = self.step.next().ok_or(OnboardingError::AlreadyComplete)?;
        if !self.skipped.contains(&self.step) {
            self.skipped.push(self.step);
        }
        self.move_to(next);
        Ok(next)
    }

    pub fn reset(&mut self) {
        self.step = OnboardingStep::Welcome;
        self.budget_id = None;
        self.skipped.clear();
        self.completed_at = None;
        self.updated_at = Utc::now();
    }

    fn move_to(&mut self, step: OnboardingStep) {
        let now = Utc::now();
        self.step = step;
        self.completed_at = (step == OnboardingStep::Complete).then_some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_walk() {
        let mut state = OnboardingState::new(UserId::new());
        let budget = BudgetId::new();

        assert_eq!(state.advance(None), Ok(OnboardingStep::CreateBudget));
        assert_eq!(state.advance(None), Err(OnboardingError::BudgetRequired));
        assert_eq!(state.advance(Some(budget)), Ok(OnboardingStep::LinkAccounts));
        assert_eq!(state.budget_id, Some(budget));
        assert_eq!(state.skip(), Ok(OnboardingStep::ChooseCategories));
        assert_eq!(state.advance(None), Ok(OnboardingStep::SetTargets));
        assert_eq!(state.advance(None), Ok(OnboardingStep::Complete));
        assert!(state.is_complete());
        assert!(state.completed_at.is_some());
        assert_eq!(state.skipped, vec![OnboardingStep::LinkAccounts]);

        assert_eq!(state.advance(None), Err(OnboardingError::AlreadyComplete));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = OnboardingState::new(UserId::new());
        assert_eq!(state.back(), Err(OnboardingError::AtFirstStep));
        assert_eq!(
            state.skip(),
            Err(OnboardingError::NotSkippable(OnboardingStep::Welcome))
        );
    }

    #[test]
    fn test_back_clears_completion() {
        let mut state = OnboardingState::new(UserId::new());
        state.step = OnboardingStep::Complete;
        state.completed_at = Some(Utc::now());

        assert_eq!(state.back(), Ok(OnboardingStep::SetTargets));
        assert!(state.completed_at.is_none());
    }

    #[test]
    fn test_reset() {
        let mut state = OnboardingState::new(UserId::new());
        state.advance(None).unwrap();
        state.advance(Some(BudgetId::new())).unwrap();
        state.reset();
        assert_eq!(state.step, OnboardingStep::Welcome);
        assert!(state.budget_id.is_none());
    }

    #[test]
    fn test_step_serialization() {
        let json = serde_json::to_string(&OnboardingStep::ChooseCategories).unwrap();
        assert_eq!(json, "\"choose_categories\"");
        assert_eq!(OnboardingStep::SetTargets.to_string(), "set_targets");
        assert_eq!(OnboardingStep::Complete.index(), 5);
    }
}
