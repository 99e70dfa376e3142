use anyhow::Context;
use checkout_api::config;
use checkout_api::db;
use checkout_api::events::{self, EventSender};
use checkout_api::services::catalog::SeaOrmProductCatalog;
use checkout_api::services::checkout::{CheckoutSessionService, SeaOrmSessionStore};
use checkout_api::services::orders::{OrderService, SeaOrmOrderStore};
use checkout_api::services::payments::{
    AesGcmFieldCipher, KakaoPayProvider, PaymentService, SeaOrmPaymentStore,
};
use checkout_api::{app, AppState};
use chrono::Duration;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&app_config.log_level, app_config.log_json);

    info!(
        environment = %app_config.environment,
        "starting checkout-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        db::establish_connection_from_app_config(&app_config)
            .await
            .context("failed to connect to database")?,
    );

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(events::process_events(event_rx));

    let cipher = Arc::new(
        AesGcmFieldCipher::new(&app_config.encryption_key_bytes()?)
            .context("failed to initialize field encryption")?,
    );

    let public_base_url = format!("http://{}:{}", app_config.host, app_config.port);
    let psp = Arc::new(
        KakaoPayProvider::new(&app_config.psp, public_base_url)
            .context("failed to build PSP client")?,
    );

    let catalog = Arc::new(SeaOrmProductCatalog::new(db.clone()));
    let payments = Arc::new(PaymentService::new(
        Arc::new(SeaOrmPaymentStore::new(db.clone())),
        psp,
        cipher,
        event_sender.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        Arc::new(SeaOrmOrderStore::new(db.clone())),
        catalog.clone(),
        event_sender.clone(),
    ));
    let checkout = Arc::new(CheckoutSessionService::new(
        Arc::new(SeaOrmSessionStore::new(db.clone())),
        catalog,
        payments.clone(),
        orders.clone(),
        event_sender,
        Duration::seconds(app_config.session_ttl_secs as i64),
    ));

    let state = AppState {
        checkout,
        payments,
        orders,
    };

    let addr = format!("{}:{}", app_config.host, app_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
