use crate::cli::ServeArgs;
use crate::infra::{seed_demo_directory, AppState, InMemoryNotifier};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pace::config::AppConfig;
use pace::error::AppError;
use pace::telemetry;
use pace::workflows::applications::{ApplicationService, InMemoryStore};
use pace::workflows::dashboard::DashboardHub;
use pace::workflows::roster::RosterImporter;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(roster) = args.roster.take() {
        config.workflow.roster_path = Some(roster);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::new());
    let roster_loaded = match &config.workflow.roster_path {
        Some(path) => {
            let members = RosterImporter::from_path(path)?;
            let loaded = RosterImporter::load_into(store.as_ref(), members)?;
            info!(loaded, path = %path.display(), "staff roster imported");
            true
        }
        None => false,
    };
    if args.seed_demo {
        seed_demo_directory(&store, !roster_loaded)
            .map_err(|err| AppError::Workflow(err.into()))?;
    }

    let notifier = Arc::new(InMemoryNotifier::default());
    let dashboard = DashboardHub::new(config.workflow.dashboard_capacity);
    let application_service = Arc::new(ApplicationService::new(store, notifier, dashboard));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "application workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
