use crate::{
    axum_http::{default_routers, route_gate, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use crates::{
    domain::repositories::storage::MediaStorageClient,
    events::notification_hub::NotificationHub,
    infra::{
        db::postgres::postgres_connection::PgPoolSquad,
        storages::supabase_storage::{SupabaseStorageClient, SupabaseStorageConfig},
    },
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let notification_hub = Arc::new(NotificationHub::new());
    let storage: Arc<dyn MediaStorageClient> = Arc::new(
        SupabaseStorageClient::new(SupabaseStorageConfig {
            endpoint: config.supabase.s3_endpoint.clone(),
            region: config.supabase.s3_region.clone(),
            bucket: config.supabase.media_bucket.clone(),
            access_key: config.supabase.s3_access_key.clone(),
            secret_key: config.supabase.s3_secret_key.clone(),
            project_url: config.supabase.project_url.clone(),
        })
        .await?,
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/daily-reward",
            routers::daily_reward::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&notification_hub),
            ),
        )
        .nest(
            "/api/notifications",
            routers::notifications::routes(Arc::clone(&db_pool), Arc::clone(&notification_hub)),
        )
        .merge(routers::media::routes(Arc::clone(&db_pool), storage))
        .merge(routers::auth::routes(Arc::clone(&db_pool), Arc::clone(&config)))
        .merge(routers::billing::routes(
            Arc::clone(&db_pool),
            Arc::clone(&config),
            Arc::clone(&notification_hub),
        ))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(Arc::clone(&config)))
        .layer(middleware::from_fn(route_gate::gate))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any), // TODO Add the domain later
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdow_signal())
        .await?;

    Ok(())
}

async fn shutdow_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
