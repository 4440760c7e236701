use server_http::{build_router, AppState};
use shared::config::{Config, LogFormat, LoggingConfig};
use shared::Error;
use stash::{keygen, DocumentOperationsService, ExpiryMechanism, StorageFactory};
use storage_engine::UnifiedStorageFactory;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if exists)
    let dotenv = dotenvy::dotenv();

    let config = Config::load()?;
    init_tracing(&config.logging)?;

    match dotenv {
        Ok(path) => info!(
            path = %path.display(),
            "Loaded environment variables from .env file"
        ),
        Err(_) => debug!("No .env file found, using system environment variables"),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting stash HTTP server...");

    let expiration = config.expiration();
    if expiration.is_enabled() && !ExpiryMechanism::for_kind(config.storage.kind).supports_expiry()
    {
        warn!(
            backend = %config.storage.kind,
            "Expiration is configured but this backend never expires documents"
        );
    }

    // Any backend failure here is fatal
    let store = UnifiedStorageFactory
        .create_from_config(&config.storage, expiration, config.operation_timeout())
        .await?;

    let key_generator = keygen::from_config(config.key_generator, &config.key_space)?;
    let documents = DocumentOperationsService::new(
        store,
        key_generator,
        config.key_length,
        config.max_length,
    );

    let loaded = documents.load_static_documents(&config.documents).await?;
    if loaded > 0 {
        info!(count = loaded, "Static documents published");
    }

    let state = AppState::new(documents.clone());
    let router = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(%address, backend = %config.storage.kind, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    documents.shutdown().await?;
    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", logging.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
