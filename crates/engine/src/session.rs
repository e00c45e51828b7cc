//! The session context: who is signed in, their ledger and their budget.
//!
//! A [`Session`] owns the store and the identity provider. Signing in loads
//! the profile, the budget and the ledger; signing out discards them. Every
//! ledger and budget operation requires a signed-in user.
//!
//! Presentation layers read snapshots ([`Session::summary`],
//! [`Session::analytics`], [`Session::expenses`]) and listen to
//! [`SessionEvent`]s from [`Session::subscribe`] to know when to re-render.
use std::time::Duration;

use api_types::user::UserProfile;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;

use crate::{
    AuthError, BudgetState, Category, EngineError, Expense, ExpenseId, ExpensePatch, Ledger,
    MoneyCents, NewExpense, ResultEngine,
    analytics::{self, Analytics, Period, Summary},
    budget::DEFAULT_BUDGET,
    identity::{Identity, IdentityProvider},
    store::{DocumentPath, DocumentStore, Remote, from_document, to_document},
};

/// Deadline applied to every store call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MIN_PASSWORD_LEN: usize = 6;
const EVENT_CAPACITY: usize = 64;

/// Change notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut,
    /// The ledger content or the sync state of a record changed.
    LedgerChanged,
    BudgetChanged(MoneyCents),
}

/// Sign-up form.
#[derive(Clone, Debug, Default)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Defaults to [`DEFAULT_BUDGET`].
    pub budget: Option<MoneyCents>,
}

#[derive(Debug)]
struct ActiveUser {
    identity: Identity,
    profile: UserProfile,
}

pub struct Session<S, I> {
    remote: Remote<S>,
    identity: I,
    user: Option<ActiveUser>,
    ledger: Ledger,
    budget: BudgetState,
    events: broadcast::Sender<SessionEvent>,
}

/// Accepts `local@domain.tld` without whitespace.
pub fn validate_email(email: &str) -> ResultEngine<()> {
    let invalid = || EngineError::validation("please enter a valid email address");
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (name, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if name.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

impl SignUp {
    fn validate(&self) -> ResultEngine<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("please enter your full name"));
        }
        validate_email(self.email.trim())?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(EngineError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        if self.password != self.confirm_password {
            return Err(EngineError::validation("passwords do not match"));
        }
        BudgetState::validate(self.budget.unwrap_or(DEFAULT_BUDGET))
    }
}

impl<S: DocumentStore, I: IdentityProvider> Session<S, I> {
    pub fn new(store: S, identity: I) -> Self {
        Self::with_timeout(store, identity, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(store: S, identity: I, timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            remote: Remote::new(store, timeout),
            identity,
            user: None,
            ledger: Ledger::new(),
            budget: BudgetState::default(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.user.as_ref().map(|user| &user.identity)
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.user.as_ref().map(|user| &user.profile)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn budget(&self) -> MoneyCents {
        self.budget.amount()
    }

    fn user_id(&self) -> ResultEngine<String> {
        self.user
            .as_ref()
            .map(|user| user.identity.user_id.clone())
            .ok_or(EngineError::Auth(AuthError::NotSignedIn))
    }

    /// Creates the account and its profile. The new user is left signed out.
    pub async fn sign_up(&mut self, form: SignUp) -> ResultEngine<UserProfile> {
        form.validate()?;
        let email = form.email.trim().to_string();
        let identity = self.identity.sign_up(&email, &form.password).await?;

        let profile = UserProfile {
            id: identity.user_id.clone(),
            name: form.name.trim().to_string(),
            email,
            budget_minor: Some(form.budget.unwrap_or(DEFAULT_BUDGET).cents()),
            created_at: Utc::now(),
        };
        let path = DocumentPath::profile(&identity.user_id);
        let document = to_document(path.as_str(), &profile)?;
        let written = self.remote.set(&path, document).await;

        if let Err(err) = self.identity.sign_out().await {
            tracing::warn!("sign-out after sign-up failed: {err}");
        }
        written?;

        tracing::info!("account created for {}", profile.email);
        Ok(profile)
    }

    /// Signs in and loads profile, budget and ledger.
    ///
    /// A failure to load the ledger is returned, but the session stays
    /// signed in with an empty ledger.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> ResultEngine<()> {
        let email = email.trim();
        validate_email(email)?;
        if password.is_empty() {
            return Err(EngineError::validation("please enter your password"));
        }
        if self.is_signed_in() {
            self.sign_out().await?;
        }

        let identity = self.identity.sign_in(email, password).await?;
        let profile = match self.fetch_profile(&identity.user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                if let Err(sign_out) = self.identity.sign_out().await {
                    tracing::warn!("sign-out after failed sign-in failed: {sign_out}");
                }
                return Err(err);
            }
        };

        self.budget.adopt(&profile);
        let user_id = identity.user_id.clone();
        self.user = Some(ActiveUser { identity, profile });
        tracing::info!("signed in as {user_id}");

        let loaded = self.ledger.load(&self.remote, &user_id).await;
        self.notify(SessionEvent::SignedIn { user_id });
        self.notify(SessionEvent::LedgerChanged);
        loaded
    }

    async fn fetch_profile(&self, user_id: &str) -> ResultEngine<UserProfile> {
        let path = DocumentPath::profile(user_id);
        let document = self
            .remote
            .get(&path)
            .await?
            .ok_or(EngineError::Auth(AuthError::ProfileMissing))?;
        Ok(from_document(path.as_str(), document)?)
    }

    /// Signs out and discards every piece of user state.
    pub async fn sign_out(&mut self) -> ResultEngine<()> {
        let result = self.identity.sign_out().await;
        if let Some(user) = self.user.take() {
            tracing::info!("signed out {}", user.identity.user_id);
        }
        self.ledger.clear();
        self.budget.reset();
        self.notify(SessionEvent::SignedOut);
        Ok(result?)
    }

    /// Reloads budget and ledger from the store. Changes not yet synced
    /// (pending records and deletes) survive the reload.
    pub async fn reload(&mut self) -> ResultEngine<()> {
        let user_id = self.user_id()?;
        let budget = self.budget.load(&self.remote, &user_id).await;
        let ledger = self.ledger.refresh(&self.remote, &user_id).await;
        self.notify(SessionEvent::BudgetChanged(self.budget.amount()));
        self.notify(SessionEvent::LedgerChanged);
        if let Some(user) = self.user.as_mut()
            && let Ok(Some(profile)) = &budget
        {
            user.profile = profile.clone();
        }
        budget.map(|_| ())?;
        ledger
    }

    pub async fn add_expense(&mut self, new: NewExpense) -> ResultEngine<ExpenseId> {
        let user_id = self.user_id()?;
        let result = self.ledger.add(&self.remote, &user_id, new).await;
        if !matches!(result, Err(EngineError::Validation(_))) {
            self.notify(SessionEvent::LedgerChanged);
        }
        result
    }

    pub async fn update_expense(&mut self, id: &ExpenseId, patch: ExpensePatch) -> ResultEngine<()> {
        let user_id = self.user_id()?;
        let result = self.ledger.update(&self.remote, &user_id, id, patch).await;
        if matches!(result, Ok(()) | Err(EngineError::Sync(_))) {
            self.notify(SessionEvent::LedgerChanged);
        }
        result
    }

    pub async fn remove_expense(&mut self, id: &ExpenseId) -> ResultEngine<Expense> {
        let user_id = self.user_id()?;
        let result = self.ledger.remove(&self.remote, &user_id, id).await;
        if !matches!(result, Err(EngineError::NotFound(_))) {
            self.notify(SessionEvent::LedgerChanged);
        }
        result
    }

    /// Retries every local change the store has not acknowledged.
    pub async fn resync(&mut self) -> ResultEngine<usize> {
        let user_id = self.user_id()?;
        let result = self.ledger.resync_pending(&self.remote, &user_id).await;
        self.notify(SessionEvent::LedgerChanged);
        result
    }

    pub async fn set_budget(&mut self, amount: MoneyCents) -> ResultEngine<()> {
        let user_id = self.user_id()?;
        self.budget.set(&self.remote, &user_id, amount).await?;
        if let Some(user) = self.user.as_mut() {
            user.profile.budget_minor = Some(amount.cents());
        }
        self.notify(SessionEvent::BudgetChanged(amount));
        Ok(())
    }

    /// Expenses, most recent first.
    pub fn expenses(&self, category: Option<Category>) -> impl Iterator<Item = &Expense> + Clone {
        self.ledger.list(category)
    }

    pub fn summary_at<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> Summary {
        analytics::summary(self.ledger.expenses(), self.budget.amount(), reference)
    }

    pub fn summary(&self) -> Summary {
        self.summary_at(&Utc::now())
    }

    pub fn analytics_at<Tz: TimeZone>(&self, period: Period, reference: &DateTime<Tz>) -> Analytics {
        analytics::analytics(self.ledger.expenses(), period, reference)
    }

    pub fn analytics(&self, period: Period) -> Analytics {
        self.analytics_at(period, &Utc::now())
    }
}
