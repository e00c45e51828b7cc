use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use engine::{
    Category, DocumentStore, Expense, ExpenseId, ExpensePatch, IdentityProvider, MoneyCents,
    NewExpense, Session, SessionEvent, SignUp,
    analytics::{Analytics, Period, Summary},
    memory::{MemoryIdentity, MemoryStore},
};
use tokio::sync::broadcast;

use crate::{
    config::{AddArgs, AppConfig, BudgetCommand, Command, UpdateArgs},
    error::{AppError, Result},
    format,
};

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demo-password";

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::debug!("session event: {event:?}"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("skipped {skipped} session events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Signs in with the configured credentials, runs `command`, signs out.
///
/// The command's own result is returned; a failed sign-out is only logged.
/// Changes that did not reach the store are dropped with the session.
pub async fn run<S, I>(
    session: &mut Session<S, I>,
    config: &AppConfig,
    tz: Tz,
    command: Command,
) -> Result<()>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    tokio::spawn(log_events(session.subscribe()));
    let (email, password) = config.credentials()?;

    if let Command::Signup { name, budget } = command {
        let profile = session
            .sign_up(SignUp {
                name,
                email: email.to_string(),
                password: password.to_string(),
                confirm_password: password.to_string(),
                budget,
            })
            .await?;
        let budget = profile.budget_minor.map(MoneyCents::new).unwrap_or_default();
        println!("Account created for {} with a budget of {}.", profile.email, format::money(budget));
        println!("Sign in by running any other command.");
        return Ok(());
    }

    if let Err(err) = session.sign_in(email, password).await {
        if !session.is_signed_in() {
            return Err(err.into());
        }
        tracing::warn!("expenses could not be loaded: {err}");
    }

    let result = execute(session, tz, command).await;
    let ledger = session.ledger();
    let unsynced = ledger.pending().count() + ledger.pending_deletes().len();
    if unsynced > 0 {
        tracing::warn!("{unsynced} change(s) did not reach the store and are discarded");
    }
    if let Err(err) = session.sign_out().await {
        tracing::warn!("sign-out failed: {err}");
    }
    result
}

async fn execute<S, I>(session: &mut Session<S, I>, tz: Tz, command: Command) -> Result<()>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    let now = Utc::now().with_timezone(&tz);
    match command {
        Command::Summary => print_summary(&session.summary_at(&now)),
        Command::List { category } => print_expenses(session.expenses(category), tz),
        Command::Add(args) => {
            let new = new_expense(args, tz)?;
            let id = session.add_expense(new).await?;
            println!("Added {id}.");
        }
        Command::Update(args) => {
            let UpdateArgs {
                id,
                description,
                amount,
                category,
            } = args;
            let patch = ExpensePatch {
                description,
                amount,
                category,
            };
            session.update_expense(&ExpenseId::from(id.as_str()), patch).await?;
            println!("Updated {id}.");
        }
        Command::Remove { id } => {
            let removed = session.remove_expense(&ExpenseId::from(id)).await?;
            println!(
                "Removed {} ({}).",
                removed.description,
                format::money(removed.amount)
            );
        }
        Command::Budget(args) => match args.command {
            BudgetCommand::Show => println!("Monthly budget: {}", format::money(session.budget())),
            BudgetCommand::Set { amount } => {
                session.set_budget(amount).await?;
                println!("Monthly budget set to {}.", format::money(amount));
            }
        },
        Command::Analytics { period } => print_analytics(&session.analytics_at(period, &now)),
        Command::Signup { .. } | Command::Demo => {
            return Err(AppError::Invalid("command not available here".to_string()));
        }
    }
    Ok(())
}

fn new_expense(args: AddArgs, tz: Tz) -> Result<NewExpense> {
    let new = NewExpense::new(args.description, args.amount, args.category);
    match args.on {
        Some(day) => Ok(new.occurred_at(midday(day, tz)?)),
        None => Ok(new),
    }
}

fn midday(day: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    let invalid = || AppError::Invalid(format!("no such local time on {day}"));
    let local = day.and_hms_opt(12, 0, 0).ok_or_else(invalid)?;
    let at = tz.from_local_datetime(&local).earliest().ok_or_else(invalid)?;
    Ok(at.with_timezone(&Utc))
}

fn print_summary(summary: &Summary) {
    println!("Budget:      {}", format::money(summary.budget));
    println!("Spent:       {}", format::money(summary.total_spent));
    println!("This month:  {}", format::money(summary.month_spent));
    println!(
        "Remaining:   {} ({})",
        format::money(summary.remaining),
        format::status(summary.status)
    );
}

fn print_expenses<'a>(expenses: impl Iterator<Item = &'a Expense>, tz: Tz) {
    let mut empty = true;
    for expense in expenses {
        empty = false;
        let pending = if expense.is_synced() { "" } else { " (not synced)" };
        println!(
            "{}  {:<24} {:>16}  {}  {}{pending}",
            expense.occurred_at.with_timezone(&tz).format("%Y-%m-%d"),
            expense.description,
            format::money(expense.amount),
            format::category(expense.category()),
            expense.id,
        );
    }
    if empty {
        println!("No expenses.");
    }
}

fn print_analytics(analytics: &Analytics) {
    println!("Period: {}  total {}", analytics.period, format::money(analytics.total));

    println!("\nBy category");
    for share in &analytics.breakdown.shares {
        println!(
            "  {:<22} {:>16} {:>6.1}%",
            format::category(share.category),
            format::money(share.amount),
            share.percent
        );
    }

    println!("\nMonthly trend");
    for point in &analytics.trend {
        println!("  {:<9} {:>16}", point.label, format::money(point.total));
    }

    println!("\nTop expenses");
    if analytics.top.is_empty() {
        println!("  none");
    }
    for (rank, expense) in analytics.top.iter().enumerate() {
        println!(
            "  {}. {:<24} {:>16}",
            rank + 1,
            expense.description,
            format::money(expense.amount)
        );
    }
}

/// Walks through a session against an in-memory store, including a write
/// made while the store is offline.
pub async fn demo(tz: Tz) -> Result<()> {
    let store = MemoryStore::new();
    let mut session = Session::new(store.clone(), MemoryIdentity::new());
    tokio::spawn(log_events(session.subscribe()));

    session
        .sign_up(SignUp {
            name: "Demo User".to_string(),
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
            confirm_password: DEMO_PASSWORD.to_string(),
            budget: Some(MoneyCents::from_major(80_000)),
        })
        .await?;
    session.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await?;

    let now = Utc::now();
    let samples = [
        ("Hostel rent", 45_000, Category::Housing, 40),
        ("Textbooks", 12_500, Category::Academic, 20),
        ("Groceries", 8_200, Category::Food, 3),
        ("Bus fare", 1_500, Category::Transportation, 1),
        ("Cinema", 3_000, Category::Entertainment, 0),
    ];
    for (description, amount, category, days_ago) in samples {
        let new = NewExpense::new(description, MoneyCents::from_major(amount), category)
            .occurred_at(now - Duration::days(days_ago));
        session.add_expense(new).await?;
    }

    store.set_online(false);
    let offline = NewExpense::new("Haircut", MoneyCents::from_major(2_000), Category::Personal);
    if let Err(err) = session.add_expense(offline).await {
        println!("Offline write kept locally: {err}");
    }
    store.set_online(true);
    let synced = session.resync().await?;
    println!("{synced} pending change(s) synchronized.\n");

    let reference = now.with_timezone(&tz);
    print_expenses(session.expenses(None), tz);
    println!();
    print_summary(&session.summary_at(&reference));
    println!();
    print_analytics(&session.analytics_at(Period::All, &reference));

    session.sign_out().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine::{AuthError, EngineError, Identity};

    use super::*;

    /// Signs out locally but reports a provider failure.
    struct BrokenSignOut(MemoryIdentity);

    impl IdentityProvider for BrokenSignOut {
        async fn sign_up(&self, email: &str, password: &str) -> std::result::Result<Identity, AuthError> {
            self.0.sign_up(email, password).await
        }

        async fn sign_in(&self, email: &str, password: &str) -> std::result::Result<Identity, AuthError> {
            self.0.sign_in(email, password).await
        }

        async fn sign_out(&self) -> std::result::Result<(), AuthError> {
            self.0.sign_out().await?;
            Err(AuthError::Provider("connection reset".to_string()))
        }
    }

    #[test]
    fn day_is_placed_at_local_midday() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let at = midday(day, chrono_tz::Africa::Lagos).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 10, 1, 11, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn command_error_survives_a_failed_sign_out() {
        let mut session = Session::new(MemoryStore::new(), BrokenSignOut(MemoryIdentity::new()));
        session
            .sign_up(SignUp {
                name: "Demo User".to_string(),
                email: DEMO_EMAIL.to_string(),
                password: DEMO_PASSWORD.to_string(),
                confirm_password: DEMO_PASSWORD.to_string(),
                budget: None,
            })
            .await
            .unwrap();
        let config = AppConfig {
            email: DEMO_EMAIL.to_string(),
            password: Some(DEMO_PASSWORD.to_string()),
            ..AppConfig::default()
        };

        let missing = Command::Remove {
            id: "missing".to_string(),
        };
        let err = run(&mut session, &config, chrono_tz::UTC, missing).await.unwrap_err();
        assert!(matches!(err, AppError::Engine(EngineError::NotFound(_))));
        assert!(!session.is_signed_in());

        let summary = run(&mut session, &config, chrono_tz::UTC, Command::Summary).await;
        assert!(summary.is_ok());
    }

    #[tokio::test]
    async fn demo_runs_to_completion() {
        demo(chrono_tz::UTC).await.unwrap();
    }
}
