//! # Application State
//!
//! Shared state for the axum application: the orchestrator, the price feed
//! client, and environment-driven configuration. All services are
//! constructed here and injected; nothing is a process-wide singleton.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use topup_core::CallbackUrls;
use topup_ledger::TopupOrchestrator;
use topup_prices::PriceFeedClient;
use topup_stripe::StripeGateway;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for checkout redirect callbacks
    pub base_url: String,
    /// Postgres connection string
    pub database_url: String,
    /// Market-data API base URL
    pub price_feed_url: String,
    /// Price cache TTL in seconds
    pub price_ttl_secs: i64,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables. `DATABASE_URL` is required; the
    /// process must fail fast before accepting traffic without it.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            database_url,
            price_feed_url: std::env::var("PRICE_FEED_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com".to_string()),
            price_ttl_secs: std::env::var("PRICE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Top-up state machine
    pub orchestrator: Arc<TopupOrchestrator>,
    /// Price feed client
    pub prices: Arc<PriceFeedClient>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Wire up the full application: config, pool, migrations, gateway.
    ///
    /// Fails fast on missing credentials or an unreachable database.
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        topup_ledger::run_migrations(&pool).await?;

        let gateway = StripeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let orchestrator = TopupOrchestrator::new(
            pool,
            Arc::new(gateway),
            CallbackUrls::new(&config.base_url),
        );

        let prices = PriceFeedClient::new(&config.price_feed_url, config.price_ttl_secs)
            .map_err(|e| anyhow::anyhow!("Failed to initialize price feed: {}", e))?;

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            prices: Arc::new(prices),
            config,
        })
    }
}
