//! DataTable API Server Entry Point
//!
//! Loads configuration, opens the store, applies schema updates and
//! starts the Axum HTTP server.

use datatable_api::telemetry::init_tracing;
use datatable_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, DataTableHost};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let api_config = ApiConfig::from_env();
    let config = api_config.load_datatable_config()?;
    let host = DataTableHost::open(config)?;
    host.apply_schema_updates()?;

    let app = create_router(AppState::new(host));

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting DataTable API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
