//! The `Expense` record and the inputs used to create and edit it.
use core::fmt;

use api_types::expense::{ExpenseDocument, ExpensePatchDocument};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Category, EngineError, MoneyCents, ResultEngine};

/// Identifier of an expense, unique within a user's ledger.
///
/// New ids are random UUIDs. Ids read from the store are kept as-is, so
/// documents created by older clients (numeric ids) still load.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpenseId(String);

impl ExpenseId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExpenseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExpenseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the store has acknowledged the last local change of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Synced,
    /// Changed locally, the write to the store failed.
    Pending,
}

/// An expense of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: MoneyCents,
    /// Stored category code, possibly unknown to this client.
    pub category_code: String,
    pub occurred_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub sync: SyncStatus,
}

impl Expense {
    /// Category used for grouping and display.
    #[must_use]
    pub fn category(&self) -> Category {
        Category::resolve(&self.category_code)
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync == SyncStatus::Synced
    }

    pub(crate) fn from_new(new: NewExpense, now: DateTime<Utc>) -> Self {
        Self {
            id: ExpenseId::generate(),
            description: new.description.trim().to_string(),
            amount: new.amount,
            category_code: new.category.code().to_string(),
            occurred_at: new.occurred_at.unwrap_or(now),
            updated_at: None,
            sync: SyncStatus::Pending,
        }
    }

    /// Builds a record from a stored document; the key in the collection
    /// wins over the `id` field inside the document.
    pub(crate) fn from_document(key: &str, doc: ExpenseDocument) -> Self {
        Self {
            id: ExpenseId::from(key),
            description: doc.description,
            amount: MoneyCents::new(doc.amount_minor),
            category_code: doc.category,
            occurred_at: doc.occurred_at,
            updated_at: doc.updated_at,
            sync: SyncStatus::Synced,
        }
    }

    pub(crate) fn to_document(&self) -> ExpenseDocument {
        ExpenseDocument {
            id: self.id.to_string(),
            description: self.description.clone(),
            amount_minor: self.amount.cents(),
            category: self.category_code.clone(),
            occurred_at: self.occurred_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn apply(&mut self, patch: &ExpensePatch, now: DateTime<Utc>) {
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(category) = patch.category {
            self.category_code = category.code().to_string();
        }
        self.updated_at = Some(now);
    }
}

/// Input for [`Ledger::add`](crate::Ledger::add). The ledger assigns the id.
#[derive(Clone, Debug)]
pub struct NewExpense {
    pub description: String,
    pub amount: MoneyCents,
    pub category: Category,
    /// Defaults to "now" when absent.
    pub occurred_at: Option<DateTime<Utc>>,
}

impl NewExpense {
    pub fn new(description: impl Into<String>, amount: MoneyCents, category: Category) -> Self {
        Self {
            description: description.into(),
            amount,
            category,
            occurred_at: None,
        }
    }

    #[must_use]
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        validate_description(&self.description)?;
        validate_amount(self.amount)
    }
}

/// Fields to change on an existing expense. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub amount: Option<MoneyCents>,
    pub category: Option<Category>,
}

impl ExpensePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.amount.is_none() && self.category.is_none()
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.is_empty() {
            return Err(EngineError::validation("nothing to update"));
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        Ok(())
    }

    pub(crate) fn to_document(&self, now: DateTime<Utc>) -> ExpensePatchDocument {
        ExpensePatchDocument {
            description: self.description.as_deref().map(str::trim).map(ToString::to_string),
            amount_minor: self.amount.map(MoneyCents::cents),
            category: self.category.map(|c| c.code().to_string()),
            updated_at: now,
        }
    }
}

fn validate_description(description: &str) -> ResultEngine<()> {
    if description.trim().is_empty() {
        return Err(EngineError::validation("description must not be empty"));
    }
    Ok(())
}

fn validate_amount(amount: MoneyCents) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::validation("amount must be > 0"));
    }
    if amount > MoneyCents::MAX_AMOUNT {
        return Err(EngineError::validation(format!(
            "amount must be at most {}",
            MoneyCents::MAX_AMOUNT
        )));
    }
    Ok(())
}
