use chrono::Utc;
use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_mailer::{
    DispatchReport, Dispatcher, MailerService, MessageLevel, PgMailerStore, SmtpTransportFactory,
    handlers,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

mod config;
mod db;
mod server;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "mailer", version, about = "Scheduled email dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Dispatch the given scheduled sends, in order
    Dispatch {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Dispatch every unsent send whose scheduled time has passed
    DispatchDue,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(&config.environment);

    let db = db::connect(&config.database)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            db::run_migrations(&db).await?;
        }
        Command::Serve => {
            if config.migrate_on_start {
                db::run_migrations(&db).await?;
            }

            let store = Arc::new(PgMailerStore::new(db.clone()));
            let service = MailerService::new(store.clone());
            let dispatcher = Dispatcher::new(
                store,
                Arc::new(SmtpTransportFactory),
                config.dispatch.failure_policy,
            );

            let app = server::build_app(
                handlers::router(service, dispatcher),
                &config.cors_origins,
            );
            server::serve(app, &config.server)
                .await
                .map_err(|e| eyre::eyre!("Server error: {}", e))?;
        }
        Command::Dispatch { ids } => {
            let report = dispatcher(&db, &config).dispatch(&ids).await;
            finish_run(report)?;
        }
        Command::DispatchDue => {
            let report = dispatcher(&db, &config).dispatch_due(Utc::now()).await?;
            finish_run(report)?;
        }
    }

    match db.close().await {
        Ok(_) => info!("PostgreSQL connection closed successfully"),
        Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
    }
    Ok(())
}

fn dispatcher(
    db: &sea_orm::DatabaseConnection,
    config: &Config,
) -> Dispatcher<PgMailerStore, SmtpTransportFactory> {
    Dispatcher::new(
        Arc::new(PgMailerStore::new(db.clone())),
        Arc::new(SmtpTransportFactory),
        config.dispatch.failure_policy,
    )
}

/// Print operator messages; a run with failed sends exits non-zero.
fn finish_run(report: DispatchReport) -> eyre::Result<()> {
    for message in &report.messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.text),
            MessageLevel::Error => eprintln!("{}", message.text),
        }
    }

    let summary = report.summary;
    println!(
        "{} sent, {} failed, {} skipped",
        summary.sent, summary.failed, summary.skipped
    );

    if !report.is_success() {
        eyre::bail!("{} scheduled email(s) failed", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["mailer"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_dispatch_requires_ids() {
        assert!(Cli::try_parse_from(["mailer", "dispatch"]).is_err());

        let id = Uuid::now_v7();
        let cli = Cli::try_parse_from(["mailer", "dispatch", &id.to_string()]).unwrap();
        match cli.command {
            Some(Command::Dispatch { ids }) => assert_eq!(ids, vec![id]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_id() {
        assert!(Cli::try_parse_from(["mailer", "dispatch", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_finish_run_fails_on_failed_sends() {
        let mut report = DispatchReport::default();
        assert!(finish_run(report.clone()).is_ok());

        report.summary.failed = 1;
        assert!(finish_run(report).is_err());
    }
}
