use std::net::SocketAddr;
use std::sync::Arc;

use marketplace_backend::config::AppConfig;
use marketplace_backend::gateway::{PaymentGateway, RazorpayGateway, TestGateway};
use marketplace_backend::store::memory::InMemoryStore;
use marketplace_backend::store::postgres::PgStore;
use marketplace_backend::store::MarketplaceStore;
use marketplace_backend::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let store: Arc<dyn MarketplaceStore> = match &config.database_url {
        Some(url) => {
            let pool = db::build_pool(url, config.database_pool_size)?;
            let store = PgStore::new(pool);
            store.health_check().await?;
            log::info!("Database health check passed");
            Arc::new(store)
        }
        None => {
            log::warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(InMemoryStore::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> =
        match (&config.payment_key_id, &config.payment_key_secret) {
            (Some(key_id), Some(secret)) => Arc::new(RazorpayGateway::new(
                &config.payment_gateway_url,
                key_id,
                secret,
            )),
            _ => {
                log::warn!("Payment keys not set; orders are minted locally as test orders");
                Arc::new(TestGateway)
            }
        };

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    log::info!("Starting server on {}", addr);

    let app = build_router(AppState::new(config, store, gateway));
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service()).await?;

    Ok(())
}
