use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::Router;
use configs::{AppConfig, RatesConfig, ServerConfig};
use models::Rate;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, ServerState};
use service::{
    rates::RateStore,
    runtime,
    storage::JsonFileGateway,
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", server.host, server.port).parse()?)
}

/// Import the rates collection and wrap it in handler state.
/// An unreadable or unparsable data file is fatal: the server does not start.
pub async fn build_state(rates: &RatesConfig) -> Result<ServerState, StartupError> {
    let data_file = PathBuf::from(&rates.data_file);
    if rates.persistent {
        runtime::ensure_env(&data_file)
            .await
            .map_err(|e| StartupError::Runtime(e.to_string()))?;
    }

    let mut gateway = JsonFileGateway::<Rate>::new(data_file).persistent(rates.persistent);
    if let Some(seed) = &rates.seed_file {
        gateway = gateway.with_seed(seed);
    }
    let store = RateStore::new(Arc::new(gateway), rates.defaults())
        .await
        .map_err(|e| StartupError::Runtime(format!("rates import failed: {e}")))?;
    Ok(ServerState { rates: store })
}

/// Build the app from an already loaded configuration and serve it until the listener fails.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    info!(
        data_file = %cfg.rates.data_file,
        persistent = cfg.rates.persistent,
        default_currency = %cfg.rates.default_currency,
        default_rate_type = %cfg.rates.default_rate_type,
        "rates configuration loaded"
    );

    let state = build_state(&cfg.rates).await?;
    let app: Router = routes::build_router(state, build_cors());

    // Bind and serve
    let addr = bind_addr(&cfg.server)?;
    info!(%addr, "starting rates server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
