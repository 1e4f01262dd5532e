use clap::{Parser, Subcommand};
use lipa::application::Services;
use lipa::config::AppConfig;
use lipa::domain::ports::{PaymentStoreRef, RatingStoreRef};
use lipa::infrastructure::in_memory::{InMemoryPaymentStore, InMemoryRatingStore};
use lipa::infrastructure::mpesa::MpesaGateway;
use lipa::interfaces::csv::payment_writer::PaymentWriter;
use lipa::interfaces::http;
use lipa::telemetry;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LIPA_CONFIG", global = true)]
    config: Option<String>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the payment and rating API (default)
    Serve {
        /// Listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Write every payment record to stdout as CSV
    Export,
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<(PaymentStoreRef, RatingStoreRef)> {
    let Some(path) = db_path else {
        return Ok(in_memory_stores());
    };
    let store = lipa::infrastructure::rocksdb::RocksDBStore::open(path).into_diagnostic()?;
    let payments: PaymentStoreRef = Arc::new(store.clone());
    let ratings: RatingStoreRef = Arc::new(store);
    Ok((payments, ratings))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<(PaymentStoreRef, RatingStoreRef)> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> (PaymentStoreRef, RatingStoreRef) {
    (
        Arc::new(InMemoryPaymentStore::new()),
        Arc::new(InMemoryRatingStore::new()),
    )
}

async fn serve(config: AppConfig, payments: PaymentStoreRef, ratings: RatingStoreRef) -> Result<()> {
    if config.gateway.shortcode.is_empty() || config.gateway.consumer_key.is_empty() {
        tracing::warn!("Gateway credentials are not configured; push requests will fail");
    }

    let gateway = MpesaGateway::new(config.gateway.clone()).into_diagnostic()?;
    let services = Services::new(
        Arc::new(gateway),
        payments,
        ratings,
        &config.gateway.country_code,
        config.rating.window().into_diagnostic()?,
    );
    let app = http::router(services, config.server.enable_cors);

    let addr = config.server.listen_addr;
    let listener = TcpListener::bind(addr).await.into_diagnostic()?;
    tracing::info!(%addr, callback_url = %config.gateway.callback_url, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).into_diagnostic()?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;
    if cli.db_path.is_some() {
        config.storage.db_path = cli.db_path;
    }

    telemetry::init(&config.logging);

    let (payments, ratings) = open_stores(config.storage.db_path.clone())?;

    match cli.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            serve(config, payments, ratings).await
        }
        Command::Export => {
            let records = payments.all().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = PaymentWriter::new(stdout.lock());
            writer.write_payments(records).into_diagnostic()?;
            Ok(())
        }
    }
}
