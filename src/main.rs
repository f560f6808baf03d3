use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notekeep::{api, db};

#[derive(Parser)]
#[command(name = "notekeep")]
#[command(about = "Personal note-taking server")]
struct Cli {
    /// SQLite database file. Defaults to the platform data directory.
    #[arg(long, global = true, env = "NOTEKEEP_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "notekeep=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let path = match path {
        Some(path) => path,
        None => db::default_path()?,
    };
    tracing::info!("Using database at {}", path.display());

    let db = db::Database::open(path)?;
    db.migrate()?;
    Ok(db)
}

async fn serve(db: db::Database, host: &str, port: u16) -> anyhow::Result<()> {
    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let config = api::SecurityConfig::from_env();
    if config.trust_proxy {
        tracing::info!("Rate limiting on X-Forwarded-For/X-Real-IP client addresses");
    }
    if let Some(limiter) = config.auth_rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }

    let app = api::create_router_with_config(db, config);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("notekeep listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            let db = open_database(cli.db)?;
            serve(db, &host, port).await?;
        }
        Some(Commands::Migrate) => {
            open_database(cli.db)?;
            tracing::info!("Migrations are up to date");
        }
        None => {
            let db = open_database(cli.db)?;
            serve(db, "127.0.0.1", 3000).await?;
        }
    }

    Ok(())
}
