use {
    donor_sync::{
        AppState,
        adapters::{http, stripe_client::StripeGateway},
        config::Config,
        domain::gateway::{GatewayRegistry, PaymentGateway},
        infra::postgres::PgStore,
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let gateway = |key: &Option<String>| {
        key.as_deref()
            .map(|k| Arc::new(StripeGateway::new(k)) as Arc<dyn PaymentGateway>)
    };
    let gateways = GatewayRegistry::new(
        gateway(&config.stripe_secret_key_test),
        gateway(&config.stripe_secret_key_live),
    );
    for (mode, key) in [
        ("test", &config.stripe_secret_key_test),
        ("live", &config.stripe_secret_key_live),
    ] {
        if key.is_none() {
            tracing::warn!(mode, "no Stripe key configured, {mode} mode requests will be rejected");
        }
    }

    let store = Arc::new(PgStore::new(pool));
    let state = AppState {
        donations: store.clone(),
        profiles: store.clone(),
        pledges: store,
        gateways,
        jwt_secret: config.jwt_secret.into(),
    };

    let app = http::router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
