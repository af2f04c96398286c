use std::process::ExitCode;

use anyhow::Context as _;
use api::db::{self, PgStore};
use api::settings::ServerSettings;
use api::Settings;
use clap::Parser;
use store::{MemoryStore, RecordStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "server", about = "JSON CRUD API over test_items and users")]
struct Args {
    /// Serve from an in-memory store instead of PostgreSQL. Data is lost on exit.
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();

    match launch_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn launch_server(args: Args) -> anyhow::Result<()> {
    let settings = Settings::new().context("Failed to load settings")?;

    if args.memory {
        tracing::warn!("Serving from an in-memory store");
        return serve(MemoryStore::new(), &settings.server).await;
    }

    let pool = db::connect(&settings.database)
        .await
        .context("Failed to connect to database")?;

    db::migrate::run(&pool)
        .await
        .context("Failed to run migrations")?;

    serve(PgStore::new(pool.clone()), &settings.server).await?;

    pool.close().await;
    Ok(())
}

async fn serve<S: RecordStore>(store: S, settings: &ServerSettings) -> anyhow::Result<()> {
    let router = api::router(store, settings);

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
