//! # topup-prices
//!
//! Price feed client over a CoinGecko-style market-data API.
//!
//! Quotes are cached per pair with a TTL, and the pair lookup is an
//! explicit two-step: query the forward pair, and only if the feed has no
//! forward quote, query the reverse pair and invert. The outcome is a
//! tagged `RateLookup` rather than exception-driven fallback.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use topup_core::{TopupError, TopupResult};
use tracing::{debug, instrument};

/// Result of a pair lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "rate", rename_all = "lowercase")]
pub enum RateLookup {
    /// The feed quotes the pair directly
    Direct(Decimal),
    /// Derived by inverting the reverse pair's quote
    Inverse(Decimal),
    /// Neither direction is quoted
    Unavailable,
}

#[derive(Debug, Clone)]
struct CachedRate {
    lookup: RateLookup,
    fetched_at: DateTime<Utc>,
}

/// Market-data client with an instance-owned TTL cache.
///
/// Explicitly constructed and injected; no process-wide cache.
pub struct PriceFeedClient {
    client: Client,
    base_url: String,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), CachedRate>>,
}

impl PriceFeedClient {
    /// Create a client against the given API base URL
    pub fn new(base_url: impl Into<String>, ttl_secs: i64) -> TopupResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| TopupError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            ttl: Duration::seconds(ttl_secs),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Look up the exchange rate for `base/quote`.
    ///
    /// Serves from cache while fresh; `Unavailable` outcomes are not
    /// cached so a transiently unlisted pair gets retried.
    #[instrument(skip(self))]
    pub async fn lookup(&self, base: &str, quote: &str) -> TopupResult<RateLookup> {
        let base = base.to_lowercase();
        let quote = quote.to_lowercase();
        let key = (base.clone(), quote.clone());

        if let Some(cached) = self.cache.read().await.get(&key) {
            if Utc::now() - cached.fetched_at < self.ttl {
                debug!("Price cache hit: {}/{}", base, quote);
                return Ok(cached.lookup.clone());
            }
        }

        let lookup = match self.fetch_pair(&base, &quote).await? {
            Some(rate) => RateLookup::Direct(rate),
            None => match self.fetch_pair(&quote, &base).await? {
                Some(reverse) if !reverse.is_zero() => {
                    RateLookup::Inverse(Decimal::ONE / reverse)
                }
                _ => RateLookup::Unavailable,
            },
        };

        if lookup != RateLookup::Unavailable {
            self.cache.write().await.insert(
                key,
                CachedRate {
                    lookup: lookup.clone(),
                    fetched_at: Utc::now(),
                },
            );
        }

        Ok(lookup)
    }

    /// Fetch one direction from the feed; `None` when the feed does not
    /// quote it.
    async fn fetch_pair(&self, id: &str, vs: &str) -> TopupResult<Option<Decimal>> {
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies={}",
            self.base_url, id, vs
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TopupError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TopupError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(TopupError::GatewayError {
                provider: "price-feed".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let quotes: HashMap<String, HashMap<String, Decimal>> = serde_json::from_str(&body)
            .map_err(|e| {
                TopupError::Serialization(format!("Failed to parse price response: {}", e))
            })?;

        Ok(quotes.get(id).and_then(|m| m.get(vs)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn direct_quote_wins() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": { "usd": 62000.5 }
            })))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), 60).unwrap();
        let lookup = client.lookup("bitcoin", "usd").await.unwrap();
        assert_eq!(lookup, RateLookup::Direct(dec!(62000.5)));
    }

    #[tokio::test]
    async fn inverse_quote_when_forward_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "usd"))
            .and(query_param("vs_currencies", "bitcoin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": { "usd": 50000 }
            })))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), 60).unwrap();
        let lookup = client.lookup("usd", "bitcoin").await.unwrap();
        assert_eq!(lookup, RateLookup::Inverse(dec!(0.00002)));
    }

    #[tokio::test]
    async fn unavailable_when_neither_direction_quoted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), 60).unwrap();
        let lookup = client.lookup("foo", "bar").await.unwrap();
        assert_eq!(lookup, RateLookup::Unavailable);
    }

    #[tokio::test]
    async fn fresh_quotes_served_from_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": { "usd": 62000 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), 60).unwrap();
        let first = client.lookup("bitcoin", "usd").await.unwrap();
        let second = client.lookup("bitcoin", "usd").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_quotes_refetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": { "usd": 62000 }
            })))
            .expect(2)
            .mount(&server)
            .await;

        // Zero TTL: every lookup is already expired.
        let client = PriceFeedClient::new(server.uri(), 0).unwrap();
        client.lookup("bitcoin", "usd").await.unwrap();
        client.lookup("bitcoin", "usd").await.unwrap();
    }

    #[tokio::test]
    async fn feed_error_surfaces_as_gateway_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), 60).unwrap();
        let err = client.lookup("bitcoin", "usd").await.unwrap_err();
        assert!(matches!(err, TopupError::GatewayError { .. }));
    }
}
