//! The in-memory expense ledger of the signed-in user.
//!
//! Mutations are applied locally first and then written to the store. A
//! failed write never rolls the local change back: the record is marked
//! [`SyncStatus::Pending`] instead and [`Ledger::resync_pending`] can push it
//! again later. Removal is the exception: when the delete fails the ledger
//! is refreshed from the store, keeping the removed id hidden until its
//! delete is retried.
//!
//! [`Ledger::load`] starts a fresh ledger (sign-in); [`Ledger::refresh`]
//! reloads a live one without losing changes the store has not seen.
use api_types::expense::ExpenseDocument;
use chrono::Utc;

use crate::{
    Category, EngineError, Expense, ExpenseId, ExpensePatch, NewExpense, ResultEngine, SyncError,
    SyncStatus,
    store::{CollectionPath, DocumentPath, DocumentStore, Remote, from_document, to_document},
};

#[derive(Debug, Default)]
pub struct Ledger {
    /// Arrival order.
    expenses: Vec<Expense>,
    /// Removed locally, delete not yet acknowledged by the store.
    pending_deletes: Vec<ExpenseId>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in arrival order.
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn get(&self, id: &ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|expense| &expense.id == id)
    }

    /// Records whose last change has not reached the store.
    pub fn pending(&self) -> impl Iterator<Item = &Expense> {
        self.expenses.iter().filter(|expense| !expense.is_synced())
    }

    /// Ids removed locally whose delete has not reached the store.
    pub fn pending_deletes(&self) -> &[ExpenseId] {
        &self.pending_deletes
    }

    /// Forgets everything (sign-out).
    pub fn clear(&mut self) {
        self.expenses.clear();
        self.pending_deletes.clear();
    }

    /// Expenses sorted by date, most recent first, optionally restricted to
    /// one category. The returned iterator can be cloned to walk it again.
    pub fn list(&self, category: Option<Category>) -> impl Iterator<Item = &Expense> + Clone {
        let mut view: Vec<&Expense> = self
            .expenses
            .iter()
            .filter(|expense| category.is_none_or(|category| expense.category() == category))
            .collect();
        view.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        view.into_iter()
    }

    fn position(&self, id: &ExpenseId) -> ResultEngine<usize> {
        self.expenses
            .iter()
            .position(|expense| &expense.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn fetch<S: DocumentStore>(
        remote: &Remote<S>,
        user_id: &str,
    ) -> Result<Vec<Expense>, SyncError> {
        let collection = CollectionPath::expenses(user_id);
        remote
            .list(&collection)
            .await?
            .into_iter()
            .map(|(key, document)| {
                let path = format!("{collection}/{key}");
                let document: ExpenseDocument = from_document(&path, document)?;
                Ok(Expense::from_document(&key, document))
            })
            .collect()
    }

    /// Replaces the ledger with the expenses stored for `user_id`.
    ///
    /// On failure the ledger is left empty.
    pub async fn load<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
    ) -> ResultEngine<()> {
        self.pending_deletes.clear();
        match Self::fetch(remote, user_id).await {
            Ok(expenses) => {
                tracing::debug!("loaded {} expenses for {user_id}", expenses.len());
                self.expenses = expenses;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("failed to load expenses for {user_id}: {err}");
                self.expenses.clear();
                Err(err.into())
            }
        }
    }

    /// Validates and appends a new expense, then writes the whole collection.
    ///
    /// On a store failure the expense stays in the ledger, marked pending,
    /// and the error is returned.
    pub async fn add<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
        new: NewExpense,
    ) -> ResultEngine<ExpenseId> {
        new.validate()?;
        let expense = Expense::from_new(new, Utc::now());
        let id = expense.id.clone();
        self.expenses.push(expense);

        if let Err(err) = self.write_all(remote, user_id).await {
            tracing::warn!("expense {id} kept locally, sync failed: {err}");
            return Err(err.into());
        }
        Ok(id)
    }

    async fn write_all<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
    ) -> Result<(), SyncError> {
        let writes = self
            .expenses
            .iter()
            .map(|expense| {
                let path = DocumentPath::expense(user_id, &expense.id);
                let document = to_document(path.as_str(), &expense.to_document())?;
                Ok((path, document))
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        remote.batch(writes).await?;
        for expense in &mut self.expenses {
            expense.sync = SyncStatus::Synced;
        }
        Ok(())
    }

    /// Applies `patch` to an existing expense and writes the change.
    pub async fn update<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
        id: &ExpenseId,
        patch: ExpensePatch,
    ) -> ResultEngine<()> {
        let index = self.position(id)?;
        patch.validate()?;

        let now = Utc::now();
        let path = DocumentPath::expense(user_id, id);
        let fields = to_document(path.as_str(), &patch.to_document(now))?;

        let expense = &mut self.expenses[index];
        let never_synced = !expense.is_synced();
        expense.apply(&patch, now);
        expense.sync = SyncStatus::Pending;

        // A record the store may not have yet is written whole.
        let result = if never_synced {
            let document = to_document(path.as_str(), &expense.to_document())?;
            remote.set(&path, document).await
        } else {
            remote.update(&path, fields).await
        };

        match result {
            Ok(()) => {
                self.expenses[index].sync = SyncStatus::Synced;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("update of expense {id} kept locally, sync failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Removes an expense locally, then deletes its document.
    ///
    /// When the delete fails the ledger is refreshed from the store (the
    /// removed id stays hidden) and the delete error is returned.
    pub async fn remove<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
        id: &ExpenseId,
    ) -> ResultEngine<Expense> {
        let index = self.position(id)?;
        let removed = self.expenses.remove(index);

        match remote.delete(&DocumentPath::expense(user_id, id)).await {
            Ok(()) => Ok(removed),
            Err(err) => {
                tracing::warn!("delete of expense {id} failed, refreshing: {err}");
                self.pending_deletes.push(id.clone());
                if let Err(refresh) = self.refresh(remote, user_id).await {
                    tracing::warn!("refresh after failed delete of {id} failed: {refresh}");
                }
                Err(err.into())
            }
        }
    }

    /// Reloads from the store, keeping local records that are still pending
    /// and hiding ids whose delete is pending.
    ///
    /// On failure only the pending records are kept and the error is
    /// returned; pending deletes survive either way.
    pub async fn refresh<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
    ) -> ResultEngine<()> {
        let stored = match Self::fetch(remote, user_id).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!("refresh of expenses for {user_id} failed: {err}");
                self.expenses.retain(|expense| !expense.is_synced());
                return Err(err.into());
            }
        };

        let local_pending: Vec<Expense> = self.pending().cloned().collect();
        let mut merged: Vec<Expense> = stored
            .into_iter()
            .filter(|expense| !self.pending_deletes.contains(&expense.id))
            .map(|expense| {
                local_pending
                    .iter()
                    .find(|local| local.id == expense.id)
                    .cloned()
                    .unwrap_or(expense)
            })
            .collect();
        for local in local_pending {
            if !merged.iter().any(|expense| expense.id == local.id) {
                merged.push(local);
            }
        }
        tracing::debug!("refreshed {} expenses for {user_id}", merged.len());
        self.expenses = merged;
        Ok(())
    }

    /// Retries pending deletes and writes of pending records.
    ///
    /// Returns how many changes reached the store; the first failure is
    /// returned after every retry has been attempted.
    pub async fn resync_pending<S: DocumentStore>(
        &mut self,
        remote: &Remote<S>,
        user_id: &str,
    ) -> ResultEngine<usize> {
        let mut synced = 0;
        let mut first_error: Option<SyncError> = None;

        for id in std::mem::take(&mut self.pending_deletes) {
            match remote.delete(&DocumentPath::expense(user_id, &id)).await {
                Ok(()) => synced += 1,
                Err(err) => {
                    self.pending_deletes.push(id);
                    first_error.get_or_insert(err);
                }
            }
        }

        let writes = self
            .pending()
            .map(|expense| {
                let path = DocumentPath::expense(user_id, &expense.id);
                let document = to_document(path.as_str(), &expense.to_document())?;
                Ok((path, document))
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        if !writes.is_empty() {
            let count = writes.len();
            match remote.batch(writes).await {
                Ok(()) => {
                    for expense in &mut self.expenses {
                        expense.sync = SyncStatus::Synced;
                    }
                    synced += count;
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => {
                tracing::warn!("resync incomplete ({synced} changes synced): {err}");
                Err(err.into())
            }
            None => Ok(synced),
        }
    }
}
