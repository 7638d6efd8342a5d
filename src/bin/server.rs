//! Linkgate REST API Server
//!
//! Run with: cargo run --features server --bin linkgate-server
//!
//! Endpoints:
//!   GET    /health                     - Health check
//!   POST   /api/links                  - Create link (random or custom path)
//!   GET    /api/links?all=true         - List own (or all) links
//!   DELETE /api/links/:id              - Delete link
//!   GET    /api/links/:id/stats        - Click statistics
//!   POST   /api/register               - Register user
//!   GET    /api/users                  - List users
//!   PUT    /api/users/:id/permissions  - Replace permissions
//!   DELETE /api/users/:id              - Delete user
//!   GET    /*path                      - Redirect

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use linkgate::server::{router, AppState, SharedStore};
use linkgate::{bootstrap, is_bootstrapped, Config, LmdbStore};

/// Unset flags fall back to LINKGATE_DB, LINKGATE_MAP_SIZE, PORT and LINKGATE_ADMIN
#[derive(Debug, Parser)]
#[command(name = "linkgate-server", version, about)]
struct Args {
    /// LMDB environment directory
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Create this user as administrator if the store has none
    #[arg(long)]
    admin: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    if let Some(p) = args.db_path {
        config.db_path = p;
    }
    if let Some(p) = args.port {
        config.port = p;
    }
    if args.admin.is_some() {
        config.bootstrap_admin = args.admin;
    }

    let store: SharedStore = match LmdbStore::open_with(&config.db_path, config.map_size) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to open database at {}: {e}", config.db_path.display());
            std::process::exit(1);
        }
    };

    if let Some(name) = &config.bootstrap_admin {
        match is_bootstrapped(&store) {
            Ok(true) => tracing::info!("already bootstrapped, ignoring admin '{name}'"),
            Ok(false) => {
                if let Err(e) = bootstrap(&store, name) {
                    eprintln!("Failed to bootstrap admin '{name}': {e}");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("Failed to read users: {e}");
                std::process::exit(1);
            }
        }
    }

    let app = router(Arc::new(AppState::new(store)));
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, db = %config.db_path.display(), "linkgate-server v{} listening", env!("CARGO_PKG_VERSION"));
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
