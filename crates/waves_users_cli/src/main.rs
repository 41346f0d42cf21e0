//! CLI smoke entry point.
//!
//! # Responsibility
//! - Resolve configuration, open both stores and report their state.
//! - Keep output deterministic for quick local sanity checks.

use log::info;
use std::error::Error;
use std::process::ExitCode;
use waves_users_core::db::migrations::schema_version;
use waves_users_core::db::{open_document_db, open_user_db};
use waves_users_core::{
    core_version, default_log_level, init_logging, AppConfig, SqliteUserRepository, UserRepository,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("waves_users error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }
    config.credential_manager()?;

    let users_conn = open_user_db(&config.users_db)?;
    let documents_conn = open_document_db(&config.documents_db)?;
    let (_, user_count) = SqliteUserRepository::new(&users_conn).list_users(1, 1)?;

    println!("waves_users_core version={}", core_version());
    println!(
        "users_db={} schema_version={} users={user_count}",
        config.users_db.display(),
        schema_version(&users_conn)?
    );
    println!(
        "documents_db={} schema_version={}",
        config.documents_db.display(),
        schema_version(&documents_conn)?
    );
    info!("event=cli_probe module=cli status=ok users={user_count}");
    Ok(())
}
