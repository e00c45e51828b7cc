//! Client-side core of the budget tracker.
//!
//! The crate keeps the signed-in user's expenses and monthly budget in
//! memory, synchronizes them with a per-user document store and derives the
//! figures a presentation layer shows (totals, remaining budget, category
//! breakdown, monthly trend, top expenses).
//!
//! - [`Session`] is the entry point: it owns the store, the identity provider
//!   and the user state.
//! - [`Ledger`] and [`BudgetState`] hold the state and implement the sync
//!   protocol.
//! - [`analytics`] contains the pure aggregation functions.
//! - [`DocumentStore`] and [`IdentityProvider`] are the seams to the remote
//!   services; [`memory`] provides in-process implementations.

pub use api_types::user::UserProfile;
pub use budget::{BudgetState, DEFAULT_BUDGET, MIN_BUDGET};
pub use categories::Category;
pub use error::{AuthError, EngineError, SyncError};
pub use expenses::{Expense, ExpenseId, ExpensePatch, NewExpense, SyncStatus};
pub use identity::{Identity, IdentityProvider};
pub use ledger::Ledger;
pub use money::MoneyCents;
pub use session::{DEFAULT_TIMEOUT, Session, SessionEvent, SignUp, validate_email};
pub use store::{CollectionPath, DocumentPath, DocumentStore, Remote, StoreResult};

pub mod analytics;
mod budget;
mod categories;
mod error;
mod expenses;
mod identity;
mod ledger;
pub mod memory;
mod money;
mod session;
pub mod store;

type ResultEngine<T> = Result<T, EngineError>;
