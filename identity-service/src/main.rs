use identity_service::{
    build_router,
    config::IdentityConfig,
    middleware::SessionRegistry,
    services::{seed_defaults, FlagStore, IdentityService, InMemoryStore},
    AppState,
};
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let store = Arc::new(InMemoryStore::new());
    let report = seed_defaults(
        store.as_ref(),
        &config.bootstrap.org_name,
        &config.bootstrap.admin_email,
    )
    .await?;

    if report.write_admin_authkey(&mut std::io::stderr().lock())? {
        tracing::warn!(
            admin = %report.admin.email,
            "Created bootstrap site admin; its authkey was printed to stderr and is not shown again"
        );
    } else {
        tracing::info!(admin = %report.admin.email, "Bootstrap site admin already present");
    }

    let identity = IdentityService::new(store, FlagStore::new(config.flags.clone()))
        .with_registration_org(report.organization.name.clone());

    let state = AppState {
        config: config.clone(),
        identity,
        sessions: SessionRegistry::with_ttl(config.session_ttl()),
    };
    let app = build_router(state);

    let addr = config.common.socket_addr()?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
