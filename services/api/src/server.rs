use crate::cli::ServeArgs;
use crate::infra::{AppState, PendingStore};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use credit_pro::applications::{
    AuditEventRepository, CreditApplicationRepository, CreditApplicationService,
};
use credit_pro::config::{AppConfig, ConfigError, StorageBackend};
use credit_pro::error::AppError;
use credit_pro::storage::{
    InMemoryAuditEventRepository, InMemoryCreditApplicationRepository,
    PostgresCreditApplicationRepository, RedisAuditEventRepository,
};
use credit_pro::telemetry;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
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

    telemetry::init(&config.telemetry)?;

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory application and audit stores");
            serve(config, async {
                Ok((
                    InMemoryCreditApplicationRepository::default(),
                    InMemoryAuditEventRepository::default(),
                ))
            })
            .await
        }
        StorageBackend::External => {
            let database = config
                .storage
                .database
                .clone()
                .ok_or(ConfigError::MissingVariable("DATABASE_URL"))?;
            let audit = config
                .storage
                .audit
                .clone()
                .ok_or(ConfigError::MissingVariable("AUDIT_REDIS_URL"))?;

            serve(config, async move {
                let applications = PostgresCreditApplicationRepository::connect(&database).await?;
                let audit = RedisAuditEventRepository::connect(&audit).await?;
                Ok((applications, audit))
            })
            .await
        }
    }
}

/// Bind and serve right away while `setup` prepares the stores. Readiness flips once both
/// stores are installed; a setup failure stops the server.
async fn serve<R, A, F>(config: AppConfig, setup: F) -> Result<(), AppError>
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
    F: Future<Output = Result<(R, A), AppError>>,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        environment: config.environment,
    };

    let applications = PendingStore::<R>::new();
    let audit = PendingStore::<A>::new();
    let application_service = Arc::new(CreditApplicationService::new(
        Arc::new(applications.clone()),
        Arc::new(audit.clone()),
    ));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening, waiting for store setup");

    let initialize = async {
        let (application_store, audit_store) = setup.await?;
        applications.install(application_store);
        audit.install(audit_store);
        readiness_flag.store(true, Ordering::Release);

        info!(
            environment = config.environment.label(),
            backend = ?config.storage.backend,
            %addr,
            "credit application service ready"
        );
        Ok::<(), AppError>(())
    };
    let serving = async { axum::serve(listener, app).await.map_err(AppError::from) };

    tokio::try_join!(initialize, serving)?;
    Ok(())
}
