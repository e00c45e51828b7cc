//! The monthly budget of the signed-in user.
//!
//! Unlike the ledger, the budget is written first and committed locally only
//! once the store accepted it.
use api_types::user::{BudgetUpdate, UserProfile};

use crate::{
    EngineError, MoneyCents, ResultEngine,
    store::{DocumentPath, DocumentStore, Remote, from_document, to_document},
};

/// Budget used when the profile has none (or zero).
pub const DEFAULT_BUDGET: MoneyCents = MoneyCents::from_major(50_000);
/// Smallest budget a user may set.
pub const MIN_BUDGET: MoneyCents = MoneyCents::from_major(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetState {
    amount: MoneyCents,
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            amount: DEFAULT_BUDGET,
        }
    }
}

impl BudgetState {
    pub fn amount(&self) -> MoneyCents {
        self.amount
    }

    pub fn reset(&mut self) {
        self.amount = DEFAULT_BUDGET;
    }

    /// Takes the budget from an already fetched profile.
    pub fn adopt(&mut self, profile: &UserProfile) {
        self.amount = match profile.budget_minor {
            Some(minor) if minor > 0 => MoneyCents::new(minor),
            _ => DEFAULT_BUDGET,
        };
    }

    /// Checks that `amount` can be used as a budget.
    pub fn validate(amount: MoneyCents) -> ResultEngine<()> {
        if amount < MIN_BUDGET {
            return Err(EngineError::validation(format!(
                "budget must be at least {MIN_BUDGET}"
            )));
        }
        if amount > MoneyCents::MAX_AMOUNT {
            return Err(EngineError::validation(format!(
                "budget must be at most {}",
                MoneyCents::MAX_AMOUNT
            )));
        }
        Ok(())
    }

    /// Reads the profile of `user_id` and adopts its budget.
    ///
    /// A missing profile yields the default budget and `Ok(None)`. On failure
    /// the budget is reset to the default.
    pub async fn load<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
    ) -> ResultEngine<Option<UserProfile>> {
        let path = DocumentPath::profile(user_id);
        let profile = match remote.get(&path).await {
            Ok(Some(document)) => from_document::<UserProfile>(path.as_str(), document),
            Ok(None) => {
                self.reset();
                return Ok(None);
            }
            Err(err) => Err(err),
        };

        match profile {
            Ok(profile) => {
                self.adopt(&profile);
                Ok(Some(profile))
            }
            Err(err) => {
                tracing::warn!("failed to load budget for {user_id}: {err}");
                self.reset();
                Err(err.into())
            }
        }
    }

    /// Persists a new budget, then commits it locally.
    ///
    /// On failure the previous budget is kept.
    pub async fn set<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
        amount: MoneyCents,
    ) -> ResultEngine<()> {
        Self::validate(amount)?;
        let path = DocumentPath::profile(user_id);
        let fields = to_document(
            path.as_str(),
            &BudgetUpdate {
                budget_minor: amount.cents(),
            },
        )?;

        if let Err(err) = remote.update(&path, fields).await {
            tracing::warn!("budget update for {user_id} failed: {err}");
            return Err(err.into());
        }
        self.amount = amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn profile(budget_minor: Option<i64>) -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            budget_minor,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn adopt_falls_back_to_default() {
        let mut budget = BudgetState::default();
        budget.adopt(&profile(Some(1_234_00)));
        assert_eq!(budget.amount(), MoneyCents::new(1_234_00));
        budget.adopt(&profile(Some(0)));
        assert_eq!(budget.amount(), DEFAULT_BUDGET);
        budget.adopt(&profile(None));
        assert_eq!(budget.amount(), DEFAULT_BUDGET);
    }

    #[test]
    fn minimum_budget_is_enforced() {
        assert!(BudgetState::validate(MoneyCents::from_major(500)).is_err());
        assert!(BudgetState::validate(MoneyCents::from_major(999)).is_err());
        assert!(BudgetState::validate(MIN_BUDGET).is_ok());
        assert!(BudgetState::validate(MoneyCents::MAX_AMOUNT).is_ok());
        assert!(BudgetState::validate(MoneyCents::new(i64::MAX)).is_err());
    }
}
