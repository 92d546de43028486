use crate::cli::ServeArgs;
use crate::infra::{AppState, LeadController};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lead_agent::config::AppConfig;
use lead_agent::error::AppError;
use lead_agent::workflows::leads::lead_router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(
    mut config: AppConfig,
    controller: LeadController,
    args: ServeArgs,
) -> Result<(), AppError> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_operational_routes(lead_router(Arc::new(controller)))
        .layer(Extension(state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead agent listening");

    axum::serve(listener, app).await?;
    Ok(())
}
