use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hearth_api::middleware::rate_limit::RateLimiter;
use hearth_api::state::{AppState, AuthConfig};
use hearth_api::{app, mailer, worker};
use hearth_core::counter::CounterStore;
use hearth_core::payment::MockCardGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = hearth_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Hearth API on port {}", config.server.port);

    // Database
    let db = hearth_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Rate-limit counters: Redis when reachable, file-backed otherwise.
    let window = Duration::from_secs(config.rate_limit.window_seconds);
    let counter_store: Arc<dyn CounterStore> =
        match hearth_store::RedisClient::new(&config.redis.url).await {
            Ok(redis) => Arc::new(hearth_store::RedisCounterStore::new(redis)),
            Err(e) => {
                tracing::warn!(
                    "Redis unreachable ({e}), falling back to file-based rate limit counters"
                );
                Arc::new(
                    hearth_store::FileCounterStore::new(&config.rate_limit.fallback_dir, window)
                        .expect("Failed to create fallback counter dir"),
                )
            }
        };
    let limiter = Arc::new(RateLimiter::new(
        counter_store,
        config.rate_limit.requests_per_window,
        window,
    ));

    // Reservation event fan-out (SSE)
    let (events_tx, _) = tokio::sync::broadcast::channel(100);

    let reservations = Arc::new(hearth_store::reservation_repo::StoreReservationRepository::new(
        db.pool.clone(),
    ));

    let state = AppState {
        users: Arc::new(hearth_store::user_repo::StoreUserRepository::new(db.pool.clone())),
        agents: Arc::new(hearth_store::agent_repo::StoreAgentRepository::new(db.pool.clone())),
        admins: Arc::new(hearth_store::admin_repo::StoreAdminRepository::new(db.pool.clone())),
        properties: Arc::new(hearth_store::property_repo::StorePropertyRepository::new(
            db.pool.clone(),
        )),
        reservations: reservations.clone(),
        payments: Arc::new(hearth_store::payment_repo::StorePaymentRepository::new(
            db.pool.clone(),
        )),
        gateway: Arc::new(MockCardGateway),
        mailer: Arc::new(mailer::LogMailer),
        events_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules: config.business_rules.clone(),
        uploads: config.uploads.clone(),
    };

    // Background release of unpaid holds.
    tokio::spawn(worker::start_expiry_worker(
        reservations,
        config.business_rules.pending_hold_minutes,
    ));

    let app = app(state, limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
