use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use order_webhooks::adapters::http::{app, WebhookAppState};
use order_webhooks::adapters::{PostgresInboundEventStore, PostgresOrderRepository};
use order_webhooks::application::{ReconcileUnprocessedEvents, Reconciler};
use order_webhooks::config::AppConfig;
use order_webhooks::ports::{InboundEventStore, OrderRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    config.validate().context("validate configuration")?;

    init_tracing(&config);

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await
        .context("connect to database")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let event_store: Arc<dyn InboundEventStore> =
        Arc::new(PostgresInboundEventStore::new(pool.clone()));
    let order_repository: Arc<dyn OrderRepository> =
        Arc::new(PostgresOrderRepository::new(pool.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler_task = if config.reconciler.enabled {
        let reconciler = Reconciler::new(
            ReconcileUnprocessedEvents::new(event_store.clone(), order_repository.clone()),
            config.reconciler.worker_config(),
        );
        Some(tokio::spawn(async move { reconciler.run(shutdown_rx).await }))
    } else {
        None
    };

    let state = WebhookAppState {
        verifier: Arc::new(config.payment.verifier()),
        event_store,
        order_repository,
        redelivery_policy: config.payment.redelivery_policy,
    };
    let router = app(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    tracing::info!(
        %addr,
        environment = config.server.environment.as_str(),
        "Order webhooks listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = reconciler_task {
        let _ = task.await;
    }
    pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
