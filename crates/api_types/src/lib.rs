//! Shapes shared between the budget core and the remote services.
//!
//! Two families live here:
//! - **documents**: what is stored under `users/{uid}` and
//!   `users/{uid}/expenses/{id}` in the document store;
//! - **wire** payloads for the HTTP document API and the identity API.
//!
//! Monetary values are always integer minor units (`*_minor`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A JSON object as stored by the document store.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub mod expense {
    use super::*;

    /// Expense as stored under `users/{uid}/expenses/{id}`.
    ///
    /// Documents written by the first web client are read too: numeric
    /// `id`, `amount` as a float in major units and `date` instead of
    /// `occurred_at`. They are always written back in the current shape.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(try_from = "StoredExpense")]
    pub struct ExpenseDocument {
        pub id: String,
        pub description: String,
        pub amount_minor: i64,
        /// Category code (`food`, `housing`, ...). Kept verbatim, even when
        /// the client does not recognize it.
        pub category: String,
        /// RFC3339 timestamp.
        pub occurred_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_at: Option<DateTime<Utc>>,
    }

    #[derive(Deserialize)]
    struct StoredExpense {
        #[serde(default)]
        id: Option<LegacyId>,
        description: String,
        #[serde(default)]
        amount_minor: Option<i64>,
        #[serde(default)]
        amount: Option<f64>,
        category: String,
        #[serde(alias = "date")]
        occurred_at: DateTime<Utc>,
        #[serde(default)]
        updated_at: Option<DateTime<Utc>>,
    }

    impl TryFrom<StoredExpense> for ExpenseDocument {
        type Error = String;

        fn try_from(stored: StoredExpense) -> Result<Self, Self::Error> {
            let amount_minor = match (stored.amount_minor, stored.amount) {
                (Some(minor), _) => minor,
                (None, Some(major)) => major_to_minor(major)?,
                (None, None) => return Err("missing field `amount_minor`".to_string()),
            };
            Ok(Self {
                id: stored.id.map(LegacyId::into_string).unwrap_or_default(),
                description: stored.description,
                amount_minor,
                category: stored.category,
                occurred_at: stored.occurred_at,
                updated_at: stored.updated_at,
            })
        }
    }

    /// Partial update of an expense document.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExpensePatchDocument {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub amount_minor: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        pub updated_at: DateTime<Utc>,
    }
}

pub mod user {
    use super::*;

    /// Profile stored under `users/{uid}`.
    ///
    /// Profiles of the first web client (`uid`, `budget` in major units,
    /// `dateCreated`) are read too.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(try_from = "StoredProfile")]
    pub struct UserProfile {
        pub id: String,
        pub name: String,
        pub email: String,
        /// Monthly budget. Missing or zero means "use the default".
        #[serde(default)]
        pub budget_minor: Option<i64>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Deserialize)]
    struct StoredProfile {
        #[serde(alias = "uid")]
        id: String,
        name: String,
        email: String,
        #[serde(default)]
        budget_minor: Option<i64>,
        #[serde(default)]
        budget: Option<f64>,
        #[serde(alias = "dateCreated")]
        created_at: DateTime<Utc>,
    }

    impl TryFrom<StoredProfile> for UserProfile {
        type Error = String;

        fn try_from(stored: StoredProfile) -> Result<Self, Self::Error> {
            let budget_minor = match (stored.budget_minor, stored.budget) {
                (Some(minor), _) => Some(minor),
                (None, Some(major)) => Some(major_to_minor(major)?),
                (None, None) => None,
            };
            Ok(Self {
                id: stored.id,
                name: stored.name,
                email: stored.email,
                budget_minor,
                created_at: stored.created_at,
            })
        }
    }

    /// Partial update written when the budget changes.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetUpdate {
        pub budget_minor: i64,
    }
}

pub mod store {
    use super::*;

    /// One `(path, document)` pair of a batch write.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct WriteOp {
        pub path: String,
        pub document: Document,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BatchWrite {
        pub writes: Vec<WriteOp>,
    }

    /// A document listed from a collection, with its key.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocumentEntry {
        pub id: String,
        pub document: Document,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocumentList {
        pub documents: Vec<DocumentEntry>,
    }
}

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Credentials {
        pub email: String,
        pub password: String,
    }

    /// Returned by sign-in and sign-up.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthResponse {
        pub user_id: String,
        pub email: String,
        /// Bearer token used for the document API.
        pub id_token: String,
    }
}

/// Ids the first web client wrote as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(i64),
}

impl LegacyId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Converts a major-unit amount (e.g. `1500.5`) to minor units.
fn major_to_minor(major: f64) -> Result<i64, String> {
    let minor = (major * 100.0).round();
    // `i64::MAX as f64` rounds up to 2^63, hence the strict upper bound.
    if !minor.is_finite() || minor < i64::MIN as f64 || minor >= i64::MAX as f64 {
        return Err(format!("amount out of range: {major}"));
    }
    Ok(minor as i64)
}

/// Error body returned by both remote services.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Provider error code, e.g. `email-already-in-use`.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{expense::ExpenseDocument, user::UserProfile, *};

    #[test]
    fn first_client_expenses_are_read() {
        let doc: ExpenseDocument = serde_json::from_value(json!({
            "id": 1_700_000_000_000_i64,
            "description": "Suya",
            "amount": 1500.5,
            "category": "food",
            "date": "2026-10-01T08:00:00Z",
            "dateFormatted": "01/10/2026"
        }))
        .unwrap();
        assert_eq!(doc.id, "1700000000000");
        assert_eq!(doc.amount_minor, 150_050);
        assert_eq!(doc.occurred_at.to_rfc3339(), "2026-10-01T08:00:00+00:00");

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["amount_minor"], json!(150_050));
        assert!(written.get("amount").is_none());
        assert_eq!(serde_json::from_value::<ExpenseDocument>(written).unwrap(), doc);
    }

    #[test]
    fn expense_without_amount_is_rejected() {
        let missing = serde_json::from_value::<ExpenseDocument>(json!({
            "id": "a",
            "description": "x",
            "category": "food",
            "occurred_at": "2026-10-01T08:00:00Z"
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn first_client_profiles_are_read() {
        let profile: UserProfile = serde_json::from_value(json!({
            "uid": "abc",
            "name": "Ada",
            "email": "ada@example.com",
            "budget": 75000,
            "dateCreated": "2025-01-05T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(profile.id, "abc");
        assert_eq!(profile.budget_minor, Some(7_500_000));
    }

    #[test]
    fn major_amounts_are_rounded_and_bounded() {
        assert_eq!(major_to_minor(0.1 + 0.2), Ok(30));
        assert_eq!(major_to_minor(-12.345), Ok(-1235));
        assert!(major_to_minor(f64::NAN).is_err());
        assert!(major_to_minor(1e300).is_err());
    }
}
