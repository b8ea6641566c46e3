//! `eduforalld`: the EduForAll server binary.
//!
//!   eduforalld -c <context-name-or-path> [--listen <addr>]
//!
//! A bare context name is looked up as `/etc/eduforall/<name>.toml`.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use eduforall_core::{Module, ServiceConfig};
use eduforall_kv::{KVStore, RedbStore};
use eduforall_sql::{SQLStore, SqliteStore};
use tracing::info;

use config::{MailSection, ServerConfig};
use school::mail::{LogMailer, Mailer, NullMailer};
use school::{SchoolModule, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "eduforalld", about = "EduForAll learning platform server")]
struct Cli {
    /// Context name or path to a TOML config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let paths = ServiceConfig {
        data_dir: Some(server_config.storage.data_dir.clone().into()),
        listen: cli.listen,
        ..Default::default()
    };
    let (sql, kv) = open_stores(&paths)?;

    let school = SchoolModule::new(
        sql,
        kv,
        build_mailer(&server_config.mail),
        SessionConfig::from(&server_config.session),
    )?;
    school
        .on_start()
        .map_err(|e| anyhow::anyhow!("{} module failed to start: {}", school.name(), e))?;

    let app = routes::build_router(vec![(school.name(), school.routes())]);
    let listener = tokio::net::TcpListener::bind(&paths.listen)
        .await
        .with_context(|| format!("failed to bind {}", paths.listen))?;
    info!("EduForAll server listening on {}", paths.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn open_stores(paths: &ServiceConfig) -> anyhow::Result<(Arc<dyn SQLStore>, Arc<dyn KVStore>)> {
    if let Some(dir) = &paths.data_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let sql = SqliteStore::open(&paths.resolve_sqlite_path())
        .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?;
    let kv = RedbStore::open(&paths.resolve_session_db_path())
        .map_err(|e| anyhow::anyhow!("failed to open session store: {}", e))?;
    Ok((Arc::new(sql), Arc::new(kv)))
}

fn build_mailer(mail: &MailSection) -> Arc<dyn Mailer> {
    if mail.enabled {
        Arc::new(LogMailer::new(mail.from_address.clone()))
    } else {
        info!("Outbound mail disabled");
        Arc::new(NullMailer)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
