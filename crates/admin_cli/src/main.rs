use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, EngineError};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Admin utilities for the points ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./ledger.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Grant points to an account.
    Credit(CreditArgs),
    /// Print an account's balance.
    Balance(AccountArgs),
    /// Print one page of an account's history.
    History(HistoryArgs),
    /// Accept or reject a pending debit.
    Finalize(FinalizeArgs),
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[arg(long)]
    account: String,
}

#[derive(Args, Debug)]
struct CreditArgs {
    #[arg(long)]
    account: String,
    #[arg(long)]
    points: i64,
    #[arg(long)]
    note: String,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long)]
    account: String,
    #[arg(long)]
    max: Option<u64>,
    /// Cursor printed by a previous page.
    #[arg(long)]
    from: Option<String>,
}

#[derive(Args, Debug)]
struct FinalizeArgs {
    #[arg(long)]
    account: String,
    #[arg(long)]
    flow: Uuid,
    /// Release the points instead of spending them.
    #[arg(long)]
    reject: bool,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Migrate => {
            println!("database is up to date");
        }
        Command::Credit(args) => {
            let flow_id = engine
                .record_manual_credit(&args.account, args.points, &args.note)
                .await?;
            println!("credited {} points to {}: {flow_id}", args.points, args.account);
        }
        Command::Balance(args) => {
            let balance = engine.balance(&args.account).await?;
            println!(
                "{}: total {} / available {}",
                args.account, balance.total, balance.available
            );
        }
        Command::History(args) => {
            let page = engine
                .history(&args.account, args.from.as_deref(), args.max)
                .await?;
            for record in &page.items {
                println!(
                    "{}  {:<16}  {:<8}  {:>8}  {}",
                    record.timestamp.to_rfc3339(),
                    record.kind.as_str(),
                    record.state.as_str(),
                    record.delta_points,
                    record.description
                );
            }
            match page.next_cursor {
                Some(cursor) => println!("next: --from {cursor}"),
                None => println!("(end of history)"),
            }
        }
        Command::Finalize(args) => {
            match engine
                .finalize_debit(args.flow, &args.account, !args.reject)
                .await
            {
                Ok(()) => {
                    let verb = if args.reject { "rejected" } else { "accepted" };
                    println!("{verb} {}", args.flow);
                }
                Err(EngineError::Conflict(_)) => {
                    eprintln!("flow is not pending: {}", args.flow);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
