use std::time::Duration;

use tracing::{debug, warn};

use crate::bucket::TokenBucket;
use crate::config::{Config, UPSTREAM_RETRY_BACKOFF_SECS};
use crate::error::{AppError, Result};

use super::price_extract::Product;

const QUERY_PRODUCT_COST: u32 = 15;
const SEARCH_DEALS_COST: u32 = 5;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Deal {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "currentPrice")]
    pub current_price: Option<i64>,
    #[serde(default, rename = "originalPrice")]
    pub original_price: Option<i64>,
    #[serde(default, rename = "deltaPercent")]
    pub delta_percent: Option<f64>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default, rename = "reviewCount")]
    pub review_count: Option<i64>,
    #[serde(default, rename = "salesRank")]
    pub sales_rank: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenStatus {
    pub available: i64,
    pub refill_in_secs: i64,
    pub rate_per_minute: i64,
}

/// Client for the upstream product/price/deal API (§4.2). Every call debits
/// the shared [`TokenBucket`] before the request and re-syncs it from the
/// response's reported token balance afterward.
pub struct KeepaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    bucket: std::sync::Arc<TokenBucket>,
}

impl KeepaClient {
    pub fn new(cfg: &Config, bucket: std::sync::Arc<TokenBucket>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: "https://api.keepa.com".to_string(),
            bucket,
        })
    }

    /// Fetches a single product by its 10-character code in the given
    /// marketplace (§4.2). Costs ~15 tokens.
    pub async fn query_product(
        &self,
        product_code: &str,
        domain: crate::types::Domain,
    ) -> Result<Product> {
        crate::types::validate_product_code(product_code)?;
        self.bucket.acquire(QUERY_PRODUCT_COST).await?;

        let url = format!(
            "{}/product?key={}&domain={}&asin={}&stats=1&history=1&offers=20",
            self.base_url, self.api_key, domain as u8, product_code
        );

        let body = self.get_with_retry(&url).await?;
        self.sync_bucket_from_body(&body).await;

        let products = body
            .get("products")
            .and_then(|p| p.as_array())
            .ok_or_else(|| AppError::InvalidResponse("missing products array".to_string()))?;

        let first = products
            .first()
            .ok_or_else(|| AppError::InvalidResponse("empty products array".to_string()))?;

        serde_json::from_value(first.clone())
            .map_err(|e| AppError::InvalidResponse(format!("product shape mismatch: {e}")))
    }

    /// Searches the deal endpoint for products matching a filter (§4.2).
    /// Costs ~5 tokens. Some access tiers reject this call with a 404,
    /// which is translated into [`AppError::DealAccessDenied`].
    pub async fn search_deals(&self, filter: &serde_json::Value) -> Result<Vec<Deal>> {
        self.bucket.acquire(SEARCH_DEALS_COST).await?;

        let url = format!("{}/deal?key={}", self.base_url, self.api_key);
        let resp = self
            .http
            .post(&url)
            .json(filter)
            .send()
            .await
            .map_err(AppError::Http)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::DealAccessDenied);
        }
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::UpstreamThrottled);
        }
        if !resp.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "deal endpoint returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp.json().await.map_err(AppError::Http)?;

        let not_found_body = body
            .get("error")
            .and_then(|e| e.as_str())
            .map(|s| s.to_lowercase().contains("not found"))
            .unwrap_or(false);
        if not_found_body {
            return Err(AppError::DealAccessDenied);
        }

        self.sync_bucket_from_body(&body).await;

        let deals = body
            .get("deals")
            .and_then(|d| d.get("dr"))
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(deals.len());
        for v in deals {
            match serde_json::from_value::<Deal>(v) {
                Ok(d) => out.push(d),
                Err(e) => warn!("skipping malformed deal entry: {e}"),
            }
        }
        Ok(out)
    }

    /// Free call reporting the bucket's state as last known by the server.
    pub async fn token_status(&self) -> Result<TokenStatus> {
        let url = format!("{}/token?key={}", self.base_url, self.api_key);
        let body = self.get_with_retry(&url).await?;
        let status = TokenStatus {
            available: body.get("tokensLeft").and_then(|v| v.as_i64()).unwrap_or(0),
            refill_in_secs: body.get("refillIn").and_then(|v| v.as_i64()).unwrap_or(60),
            rate_per_minute: body.get("refillRate").and_then(|v| v.as_i64()).unwrap_or(0),
        };
        self.bucket
            .sync(status.available, Some(status.rate_per_minute))
            .await;
        Ok(status)
    }

    async fn sync_bucket_from_body(&self, body: &serde_json::Value) {
        if let Some(tokens_left) = body.get("tokensLeft").and_then(|v| v.as_i64()) {
            let rate = body.get("refillRate").and_then(|v| v.as_i64());
            self.bucket.sync(tokens_left, rate).await;
        }
    }

    /// GET with the upstream retry/backoff schedule (§4.2, §7): a 429
    /// triggers a single paused retry; transient failures retry at
    /// 1s/2s/4s before surfacing [`AppError::UpstreamUnavailable`].
    async fn get_with_retry(&self, url: &str) -> Result<serde_json::Value> {
        let mut last_err = None;

        for (attempt, backoff) in std::iter::once(0u64)
            .chain(UPSTREAM_RETRY_BACKOFF_SECS.iter().copied())
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }

            match self.http.get(url).send().await {
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    warn!("upstream throttled, pausing before retry");
                    tokio::time::sleep(Duration::from_secs(crate::config::THROTTLE_PAUSE_SECS))
                        .await;
                    last_err = Some(AppError::UpstreamThrottled);
                    continue;
                }
                Ok(resp) if resp.status().is_success() => {
                    return resp.json().await.map_err(AppError::Http);
                }
                Ok(resp) => {
                    last_err = Some(AppError::UpstreamUnavailable(format!(
                        "status {}",
                        resp.status()
                    )));
                }
                Err(e) => {
                    debug!("upstream request error on attempt {attempt}: {e}");
                    last_err = Some(AppError::Http(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::UpstreamUnavailable("exhausted retries".into())))
    }
}
