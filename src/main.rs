use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ewschart::api::RestApi;
use ewschart::config::{load_config, LoggingConfig};

fn init_logging(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = load_config(Path::new("config.yaml"))
        .map_err(|e| Box::<dyn Error>::from(e))?;
    init_logging(&config.logging);

    info!(customer = %config.customer_code, "Starting ewschart");

    let host: IpAddr = config
        .api
        .host
        .parse()
        .map_err(|e| Box::<dyn Error>::from(format!("invalid api.host: {}", e)))?;
    let addr = SocketAddr::new(host, config.api.port);
    let api = RestApi::new(Arc::new(config));

    info!("Starting server on {}", addr);

    // Create a channel for shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let routes = api.routes();
    let (_, server) = warp::serve(routes)
        .bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("Shutting down server...");
        });

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();

    server_handle.await.map_err(|e| Box::<dyn Error>::from(e))?;

    info!("Server shutdown complete");
    Ok(())
}
