use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use shopfront_api::metrics::Metrics;
use shopfront_api::{app, state::{AppState, AuthConfig}};
use shopfront_catalog::{CouponRepository, ProductRepository};
use shopfront_core::{EventPublisher, LogEventPublisher, PaymentGateway};
use shopfront_order::{
    MockPaymentGateway, OrderPlacementService, OrderRepository, PaymentOrchestrator, PaymentRepository,
};
use shopfront_store::app_config::{Config, PaymentProvider, StorageBackend};
use shopfront_store::{
    DbClient, InMemoryStore, PaypalClient, PgCatalogRepository, PgOrderRepository, PgPaymentRepository,
    RedisClient, RedisEventPublisher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Repositories {
    products: Arc<dyn ProductRepository>,
    coupons: Arc<dyn CouponRepository>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
}

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let db = DbClient::new(url, config.storage.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let catalog = Arc::new(PgCatalogRepository::new(db.pool.clone()));
            Ok(Repositories {
                products: catalog.clone(),
                coupons: catalog,
                orders: Arc::new(PgOrderRepository::new(db.pool.clone())),
                payments: Arc::new(PgPaymentRepository::new(db.pool)),
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            Ok(Repositories {
                products: store.clone(),
                coupons: store.clone(),
                orders: store.clone(),
                payments: store,
            })
        }
    }
}

fn gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config.payments.provider {
        PaymentProvider::Paypal => {
            let paypal = config
                .payments
                .paypal
                .clone()
                .context("payments.paypal is required for the paypal provider")?;
            Ok(Arc::new(PaypalClient::new(paypal)?))
        }
        PaymentProvider::Mock => {
            tracing::warn!("Using the mock payment gateway; every payment succeeds");
            Ok(Arc::new(MockPaymentGateway))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopfront_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Shopfront API on port {}", config.server.port);

    let repos = repositories(&config).await?;

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url).context("Invalid Redis URL")?,
        )),
        None => None,
    };
    let publisher: Arc<dyn EventPublisher> = match &redis {
        Some(client) => Arc::new(RedisEventPublisher::new(client.as_ref().clone())),
        None => Arc::new(LogEventPublisher),
    };

    let placement = OrderPlacementService::new(
        repos.products,
        repos.coupons,
        repos.orders.clone(),
        publisher.clone(),
    );
    let payments = PaymentOrchestrator::new(
        gateway(&config)?,
        repos.orders,
        repos.payments,
        publisher,
        config.payments.currency.clone(),
    );

    let app_state = AppState {
        placement: Arc::new(placement),
        payments: Arc::new(payments),
        redis,
        rate_limit: config.rate_limit.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        client_base_url: config.payments.client_base_url.clone(),
        metrics: Arc::new(Metrics::new()?),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
