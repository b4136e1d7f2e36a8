use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use payledger::application::ledger::LedgerService;
use payledger::domain::account::AccountId;
use payledger::domain::ports::LedgerStoreBox;
use payledger::infrastructure::in_memory::InMemoryLedgerStore;
#[cfg(feature = "storage-rocksdb")]
use payledger::infrastructure::rocksdb::RocksDBStore;
use payledger::interfaces::csv::account_reader::AccountReader;
use payledger::interfaces::csv::statement_writer::StatementWriter;
use payledger::interfaces::http;
use payledger::logging::init_logging;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYLEDGER_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "PAYLEDGER_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the ledger HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "PAYLEDGER_LISTEN", default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },
    /// Create accounts from a CSV file with columns id,balance,currency
    Seed {
        /// Input accounts CSV file
        input: PathBuf,
    },
    /// Print an account's payments as CSV, newest first
    Statement {
        /// Account id
        account: String,
    },
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "--db-path requires a build with the `storage-rocksdb` feature"
        )),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let ledger = LedgerService::new(open_store(cli.db_path)?);

    match cli.command {
        Command::Serve { listen } => serve(ledger, listen).await,
        Command::Seed { input } => seed(&ledger, input).await,
        Command::Statement { account } => statement(&ledger, account).await,
    }
}

async fn serve(ledger: LedgerService, listen: SocketAddr) -> Result<()> {
    let app = http::router(Arc::new(ledger));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .into_diagnostic()?;
    tracing::info!(%listen, "ledger API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()
}

async fn seed(ledger: &LedgerService, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = AccountReader::new(file);

    let mut created = 0usize;
    for row in reader.accounts() {
        match row {
            Ok(account) => {
                let id = account.id.clone();
                match ledger
                    .create_account(account.id, account.balance, account.currency)
                    .await
                {
                    Ok(()) => created += 1,
                    Err(e) if e.is_business() => {
                        eprintln!("Error creating account {}: {}", id, e);
                    }
                    // Storage failures abort the whole run.
                    Err(e) => return Err(e).into_diagnostic(),
                }
            }
            Err(e) => {
                eprintln!("Error reading account: {}", e);
            }
        }
    }

    tracing::info!(created, "seed finished");
    Ok(())
}

async fn statement(ledger: &LedgerService, account: String) -> Result<()> {
    let entries = ledger
        .get_payments(&AccountId::from(account))
        .await
        .into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = StatementWriter::new(stdout.lock());
    writer.write_statement(entries).into_diagnostic()?;

    Ok(())
}
