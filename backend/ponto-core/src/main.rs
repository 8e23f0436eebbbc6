// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ponto_core::backend_client::BackendClient;
use ponto_core::config::AppConfig;
use ponto_core::server::{router, AppState};
use ponto_core::{AppError, Collaborators, Competence, PayrollEngine};

#[derive(Parser, Debug)]
#[command(name = "ponto-core", version, about = "Attendance aggregation and payroll reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Print the competence aggregates as JSON
    Aggregate {
        #[arg(long)]
        competence: Competence,
    },
    /// Reconcile the payroll ledger for a competence
    Reconcile {
        #[arg(long)]
        competence: Competence,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- Setup ---
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    info!("Configuration loaded. Backend: {}", config.backend_url);

    // --- Engine ---
    let http_client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;
    let backend = Arc::new(
        BackendClient::new(&config.backend_url, config.backend_token.clone(), http_client)
            .context("invalid PONTO_BACKEND_URL")?,
    );
    if config.backend_token.is_none() {
        warn!("PONTO_BACKEND_TOKEN not set, calling the backend without authorization");
    }
    let engine = Arc::new(
        PayrollEngine::new(Collaborators::from_single(backend), config.engine_config())
            .map_err(AppError::from)?,
    );
    info!("Payroll engine initialized.");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, engine).await,
        Command::Aggregate { competence } => {
            let aggregates = engine.aggregate_competence(competence).await?;
            println!("{}", serde_json::to_string_pretty(&aggregates)?);
            Ok(())
        }
        Command::Reconcile { competence } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping before the next write");
                    ctrl_c.cancel();
                }
            });

            let report = engine.reconcile_competence(competence, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", report.summary());
            if !report.is_clean() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, engine: Arc<PayrollEngine>) -> Result<()> {
    let state = AppState::new(engine.clone());
    let app = router(state.clone());
    let addr = config.bind_addr()?;

    // --- Background catalog check ---
    let catalog_engine = engine.clone();
    tokio::spawn(async move {
        match catalog_engine.ensure_event_catalog().await {
            Ok(created) if created.is_empty() => info!("Payroll event catalog up to date."),
            Ok(created) => info!("Created {} payroll events.", created.len()),
            Err(e) => error!("Event catalog check failed: {}", e),
        }
    });

    // --- Shutdown ---
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested.");
            shutdown.cancel();
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    // --- Run Web Server ---
    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
                .await
                .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e)))?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }
    Ok(())
}
