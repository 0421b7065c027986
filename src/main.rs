use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use walletdb::{
    config::{CliArgs, Command, Config, EntityKind},
    logging, report, storage,
};
use walletdb_core::{Entity, Notification, Session, StorageBackend, StorageError, Transaction, User, Wallet};

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::setup_logging(&config.logging);

    match run(&cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command, config: &Config) -> Result<(), StorageError> {
    let backend = storage::open_and_init(&config.database)?;
    match command {
        Command::Init => {
            tracing::info!(url = %config.database.url, "Ledger tables ready");
        }
        Command::Stats => {
            report::stats_table(backend.as_ref())?.printstd();
        }
        Command::Show { kind, id } => match kind {
            EntityKind::User => show::<User>(backend, id)?,
            EntityKind::Wallet => show::<Wallet>(backend, id)?,
            EntityKind::Transaction => show::<Transaction>(backend, id)?,
            EntityKind::Notification => show::<Notification>(backend, id)?,
        },
    }
    Ok(())
}

fn show<T: Entity>(backend: Arc<dyn StorageBackend>, id: &str) -> Result<(), StorageError> {
    let session = Session::new(backend);
    match session.find::<T>(id)? {
        Some(entity) => report::record_table(&entity).printstd(),
        None => println!("{} not found: {}", T::schema().name, id),
    }
    Ok(())
}
