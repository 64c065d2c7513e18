use elasticsearch::http::transport::Transport;
use elasticsearch::indices::IndicesCreateParts;
use elasticsearch::{DeleteByQueryParts, Elasticsearch, IndexParts};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::config::{search_indices, UPSTREAM_RETRY_BACKOFF_SECS};
use crate::error::{AppError, Result};

use super::mappings::{deals_index_body, prices_index_body};

/// Thin wrapper over the search index client (§4.6). Writes are best-effort:
/// not transactional with the relational store, retried with exponential
/// backoff, and never allowed to abort the caller on final failure.
pub struct SearchIndexClient {
    client: Elasticsearch,
}

impl SearchIndexClient {
    pub fn new(url: &str) -> Result<Self> {
        let transport = Transport::single_node(url)
            .map_err(|e| AppError::SearchIndexUnavailable(e.to_string()))?;
        Ok(Self {
            client: Elasticsearch::new(transport),
        })
    }

    /// Creates both indexes if absent, with their declared analyzers and
    /// mappings (§4.8 step 4).
    pub async fn ensure_indices(&self) -> Result<()> {
        self.ensure_index(
            search_indices::PRICES,
            prices_index_body(search_indices::MAX_RESULT_WINDOW),
        )
        .await?;
        self.ensure_index(
            search_indices::DEALS,
            deals_index_body(search_indices::MAX_RESULT_WINDOW),
        )
        .await?;
        Ok(())
    }

    async fn ensure_index(&self, name: &str, body: Value) -> Result<()> {
        let exists = self
            .client
            .indices()
            .exists(elasticsearch::indices::IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| AppError::SearchIndexUnavailable(e.to_string()))?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        self.client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::SearchIndexUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Indexes a price-update document into `keeper-prices`, retrying at
    /// 1s/2s/4s before giving up (§4.6).
    pub async fn index_price(&self, key: &str, doc: &Value) -> Result<()> {
        self.index_with_retry(search_indices::PRICES, key, doc).await
    }

    /// Indexes a deal document into `keeper-deals`, same retry policy.
    pub async fn index_deal(&self, key: &str, doc: &Value) -> Result<()> {
        self.index_with_retry(search_indices::DEALS, key, doc).await
    }

    async fn index_with_retry(&self, index: &str, key: &str, doc: &Value) -> Result<()> {
        let mut last_err = None;
        for (attempt, backoff) in std::iter::once(0u64)
            .chain(UPSTREAM_RETRY_BACKOFF_SECS.iter().copied())
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            }

            let result = self
                .client
                .index(IndexParts::IndexId(index, key))
                .body(doc)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status_code().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = Some(AppError::SearchIndexUnavailable(format!(
                        "index {index} returned {}",
                        resp.status_code()
                    )));
                }
                Err(e) => {
                    warn!("search index write attempt {attempt} failed: {e}");
                    last_err = Some(AppError::SearchIndexUnavailable(e.to_string()));
                }
            }
        }

        let err = last_err.unwrap_or_else(|| AppError::SearchIndexUnavailable("unknown".into()));
        error!("search index write to {index} exhausted retries: {err}");
        Err(err)
    }

    /// Deletes documents older than `RETENTION_DAYS` from both indexes
    /// (§4.6).
    pub async fn purge_expired(&self, older_than_unix_secs: i64) -> Result<()> {
        let query = json!({
            "query": {
                "range": { "timestamp": { "lt": older_than_unix_secs * 1000 } }
            }
        });

        for index in [search_indices::PRICES, search_indices::DEALS] {
            let result = self
                .client
                .delete_by_query(DeleteByQueryParts::Index(&[index]))
                .body(query.clone())
                .send()
                .await;

            if let Err(e) = result {
                warn!("retention purge failed for {index}: {e}");
            }
        }
        Ok(())
    }
}
