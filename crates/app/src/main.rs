use std::process::ExitCode;

use adapters::{BearerToken, FileStore, LocalIdentity, RestIdentity, RestStore};
use engine::Session;

use crate::{
    config::{Backend, Command},
    error::Result,
};

mod commands;
mod config;
mod error;
mod format;

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> Result<()> {
    let (settings, command) = config::load()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "budget={level},engine={level},adapters={level}",
            level = settings.level
        ))
        .init();

    let tz = settings.tz()?;
    if matches!(command, Command::Demo) {
        return commands::demo(tz).await;
    }

    match settings.backend {
        Backend::File => {
            tracing::info!("using data file {}", settings.data_file.display());
            let store = FileStore::new(&settings.data_file);
            let identity = LocalIdentity::new(store.clone());
            let mut session = Session::with_timeout(store, identity, settings.timeout());
            commands::run(&mut session, &settings, tz, command).await
        }
        Backend::Rest => {
            tracing::info!("using document API at {}", settings.store_url);
            let token = BearerToken::default();
            let store = RestStore::new(&settings.store_url, settings.timeout(), token.clone())?;
            let identity = RestIdentity::new(&settings.identity_url, settings.timeout(), token)?;
            let mut session = Session::with_timeout(store, identity, settings.timeout());
            commands::run(&mut session, &settings, tz, command).await
        }
    }
}
