use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use engine::{Category, MoneyCents, analytics::Period};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/budget.toml";
const ENV_PREFIX: &str = "BUDGET";
const PASSWORD_ENV: &str = "BUDGET_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Rest,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub store_url: String,
    pub identity_url: String,
    pub data_file: PathBuf,
    pub email: String,
    /// Only ever read from `BUDGET_PASSWORD`.
    #[serde(skip)]
    pub password: Option<String>,
    pub timeout_ms: u64,
    pub timezone: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            store_url: "http://127.0.0.1:8080".to_string(),
            identity_url: "http://127.0.0.1:8081".to_string(),
            data_file: PathBuf::from("config/budget_data.json"),
            email: String::new(),
            password: None,
            timeout_ms: 10_000,
            timezone: "Africa/Lagos".to_string(),
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| AppError::Invalid(format!("timezone {}: {err}", self.timezone)))
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        if self.email.is_empty() {
            return Err(AppError::Invalid(
                "no email configured (use --email or BUDGET_EMAIL)".to_string(),
            ));
        }
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| AppError::Invalid(format!("{PASSWORD_ENV} is not set")))?;
        Ok((&self.email, password))
    }
}

#[derive(Debug, Parser)]
#[command(name = "budget", about = "Track expenses against a monthly budget")]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the backend.
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Override the document API URL.
    #[arg(long)]
    store_url: Option<String>,
    /// Override the identity API URL.
    #[arg(long)]
    identity_url: Option<String>,
    /// Override the data file of the file backend.
    #[arg(long)]
    data_file: Option<PathBuf>,
    /// Override the account email (password is never read from CLI).
    #[arg(long)]
    email: Option<String>,
    /// Override the request timeout, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Override timezone (IANA name).
    #[arg(long)]
    timezone: Option<String>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account; sign in afterwards.
    Signup {
        #[arg(long)]
        name: String,
        /// Monthly budget, defaults to 50,000.00.
        #[arg(long)]
        budget: Option<MoneyCents>,
    },
    /// Budget, spending and status.
    Summary,
    /// Expenses, newest first.
    List {
        #[arg(long)]
        category: Option<Category>,
    },
    Add(AddArgs),
    Update(UpdateArgs),
    Remove { id: String },
    Budget(BudgetArgs),
    /// Breakdown, trend and top expenses for a period.
    Analytics {
        #[arg(long, default_value_t = Period::Month)]
        period: Period,
    },
    /// Run a short session against an in-memory store.
    Demo,
}

#[derive(Debug, ClapArgs)]
pub struct AddArgs {
    pub description: String,
    pub amount: MoneyCents,
    #[arg(long, default_value_t = Category::Other)]
    pub category: Category,
    /// Day of the expense (YYYY-MM-DD, local time); defaults to now.
    #[arg(long)]
    pub on: Option<NaiveDate>,
}

#[derive(Debug, ClapArgs)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub amount: Option<MoneyCents>,
    #[arg(long)]
    pub category: Option<Category>,
}

#[derive(Debug, ClapArgs)]
pub struct BudgetArgs {
    #[command(subcommand)]
    pub command: BudgetCommand,
}

#[derive(Debug, Subcommand)]
pub enum BudgetCommand {
    Show,
    Set { amount: MoneyCents },
}

pub fn load() -> Result<(AppConfig, Command)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;
    settings.password = std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty());

    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(store_url) = args.store_url {
        settings.store_url = store_url;
    }
    if let Some(identity_url) = args.identity_url {
        settings.identity_url = identity_url;
    }
    if let Some(data_file) = args.data_file {
        settings.data_file = data_file;
    }
    if let Some(email) = args.email {
        settings.email = email;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if let Some(level) = args.level {
        settings.level = level;
    }

    Ok((settings, args.command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let args = Args::try_parse_from([
            "budget", "--backend", "rest", "add", "Rice", "3000.50", "--category", "food",
        ])
        .unwrap();
        assert_eq!(args.backend, Some(Backend::Rest));
        let Command::Add(add) = args.command else {
            panic!("expected add");
        };
        assert_eq!(add.amount, MoneyCents::new(300_050));
        assert_eq!(add.category, Category::Food);

        let args = Args::try_parse_from(["budget", "budget", "set", "60000"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Budget(BudgetArgs {
                command: BudgetCommand::Set { amount }
            }) if amount == MoneyCents::from_major(60_000)
        ));
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Args::try_parse_from(["budget", "list", "--category", "pets"]).is_err());
    }

    #[test]
    fn unsynced_changes_are_not_exposed_as_a_command() {
        // Pending markers live only as long as one invocation.
        assert!(Args::try_parse_from(["budget", "resync"]).is_err());
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.tz().unwrap(), chrono_tz::Africa::Lagos);
        assert!(config.credentials().is_err());
    }
}
