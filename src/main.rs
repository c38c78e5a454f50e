use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docmind::api::{self, AppState, RouterOptions};
use docmind::auth::{AuthService, TokenIssuer};
use docmind::config::{self, Config, LoggingConfig, StorageConfig};
use docmind::documents::DocumentService;
use docmind::extraction::{OcrEngine, TextExtractor};
use docmind::llm::HttpChatClient;
use docmind::logging;
use docmind::storage::{FsBlobStore, SqliteDocumentStore, SqliteUserStore, sqlite};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "docmind",
    version,
    about = "Document upload server with AI summaries and Q&A"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create the database schema and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::load_dotenv();
    logging::init_tracing(&LoggingConfig::from_env());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            open_database(&StorageConfig::from_env()).await?;
            tracing::info!("Database schema is up to date");
            Ok(())
        }
        Command::Serve => {
            let config = Config::load().context("Invalid configuration")?;
            let pool = open_database(&config.storage).await?;
            serve(config, pool).await
        }
    }
}

async fn open_database(storage: &StorageConfig) -> Result<sqlx::SqlitePool> {
    let pool = sqlite::connect(&storage.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", storage.database_url))?;
    sqlite::migrate(&pool)
        .await
        .context("Failed to apply database schema")?;
    Ok(pool)
}

async fn serve(config: Config, pool: sqlx::SqlitePool) -> Result<()> {
    if config.uploads.accepted.iter().any(|kind| kind.is_image())
        && !OcrEngine::new(&config.ocr).is_available().await
    {
        tracing::warn!(
            command = %config.ocr.command,
            "OCR engine not found; image uploads will be stored with a failure summary"
        );
    }

    let chat = HttpChatClient::new(&config.llm).context("Invalid AI provider configuration")?;
    let documents = DocumentService::new(
        Arc::new(SqliteDocumentStore::new(pool.clone())),
        Arc::new(FsBlobStore::new(config.storage.upload_dir.clone())),
        TextExtractor::new(&config.ocr),
        Arc::new(chat),
        config.uploads.clone(),
        config.ai,
    );
    let auth = AuthService::new(
        Arc::new(SqliteUserStore::new(pool)),
        TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_days),
    );

    let app = api::create_router(
        AppState {
            documents: Arc::new(documents),
            auth: Arc::new(auth),
        },
        &RouterOptions {
            max_upload_bytes: config.uploads.max_bytes,
            cors_allowed_origin: config.server.cors_allowed_origin.clone(),
        },
    );

    let (listener, port) = bind_listener(config.server.port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn bind_listener(fixed_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = fixed_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 5001..=5099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 5001-5099",
    ))
}
