use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_desk_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use bto_allocation::allocation::AllocationDesk;
use bto_allocation::config::AppConfig;
use bto_allocation::error::AppError;
use bto_allocation::storage::CsvStore;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub(crate) async fn run(mut config: AppConfig, mut args: ServeArgs) -> Result<(), AppError> {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(CsvStore::new(&config.storage.data_dir));
    let (desk, report) = AllocationDesk::open(store, config.policy)?;
    for warning in &report.warnings {
        warn!(%warning, "dataset drift left for review");
    }

    let app = with_desk_routes(Arc::new(Mutex::new(desk)))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = %config.storage.data_dir.display(),
        "allocation desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
