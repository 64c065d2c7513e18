use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{watch, Semaphore};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db;
use crate::dispatch::AlertDispatcher;
use crate::error::Result;
use crate::events::EventLogProducer;
use crate::keepa::{KeepaClient, Product};
use crate::search::SearchIndexClient;
use crate::types::{
    format_unix_secs_iso, now_unix_secs, CollectedDeal, EventType, PriceUpdateEvent, WatchedProduct,
};

/// Owns the recurring main loop (§4.8). The one-time startup sequence
/// lives in `main::run` (the teacher's own `run` body); this struct is
/// constructed only once that sequence has completed.
pub struct Scheduler {
    cfg: Config,
    pool: SqlitePool,
    client: Arc<KeepaClient>,
    producer: Arc<EventLogProducer>,
    search: Arc<SearchIndexClient>,
    dispatcher: Arc<AlertDispatcher>,
}

impl Scheduler {
    pub fn new(
        cfg: Config,
        pool: SqlitePool,
        client: Arc<KeepaClient>,
        producer: Arc<EventLogProducer>,
        search: Arc<SearchIndexClient>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            cfg,
            pool,
            client,
            producer,
            search,
            dispatcher,
        }
    }

    /// Runs until `shutdown` is signalled (§4.8, §5). A price check fires
    /// every `price_check_interval_seconds`; every 4th cycle additionally
    /// runs the daily deal-report pass (§4.8 "every 4 cycles, default: once
    /// per 24h"). The dispatcher drains pending alerts on its own shorter
    /// tick so they don't wait a full price-check interval.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut price_ticker = interval(Duration::from_secs(self.cfg.price_check_interval_seconds));
        let mut dispatch_ticker =
            interval(Duration::from_secs(crate::config::DISPATCH_POLL_INTERVAL_SECS));
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler main loop shutting down");
                        break;
                    }
                }
                _ = price_ticker.tick() => {
                    if let Err(e) = self.run_price_check().await {
                        error!("price check cycle failed: {e}");
                    }
                    cycle += 1;
                    if cycle % 4 == 0 {
                        if let Err(e) = self.run_daily_deal_reports().await {
                            warn!("daily deal report cycle failed: {e}");
                        }
                    }
                }
                _ = dispatch_ticker.tick() => {
                    if let Err(e) = self.dispatcher.run_once().await {
                        warn!("alert dispatch pass failed: {e}");
                    }
                }
            }
        }
    }

    /// §4.8 `runPriceCheck`: loads every ACTIVE watch, fans out one price
    /// fetch per watch bounded by `parallel_price_fetch`, and applies each
    /// success to persistence, the event log, and the search index. One
    /// fetch failure never aborts the rest of the batch.
    async fn run_price_check(&self) -> Result<()> {
        let watches = db::watches::get_active_watches(&self.pool).await?;
        info!(count = watches.len(), "price check cycle starting");

        let semaphore = Arc::new(Semaphore::new(self.cfg.parallel_price_fetch.max(1)));
        let mut tasks = Vec::with_capacity(watches.len());

        for watch in watches {
            let semaphore = Arc::clone(&semaphore);
            let client = Arc::clone(&self.client);
            let domain = self.cfg.default_domain;
            tasks.push(async move {
                let _permit = semaphore.acquire().await.ok()?;
                match client.query_product(&watch.product_code, domain).await {
                    Ok(product) => Some((watch, product)),
                    Err(e) => {
                        debug!(product_code = %watch.product_code, "price check fetch failed: {e}");
                        None
                    }
                }
            });
        }

        let results = futures::future::join_all(tasks).await;
        let mut checked = 0usize;
        for (watch, product) in results.into_iter().flatten() {
            let product_code = watch.product_code.clone();
            if let Err(e) = self.apply_price_result(watch, &product).await {
                warn!(product_code = %product_code, "price check apply failed: {e}");
            } else {
                checked += 1;
            }
        }
        info!(checked, "price check cycle complete");
        Ok(())
    }

    async fn apply_price_result(&self, watch: WatchedProduct, product: &Product) -> Result<()> {
        let Some(price) = product.current_price() else {
            // All-negative/absent series (§8 boundary behavior): the watch
            // is still considered checked this cycle, just with no new price.
            db::watches::touch_last_checked(&self.pool, watch.id).await?;
            return Ok(());
        };

        let previous_price = watch.current_price;
        let updated =
            db::watches::update_watch_price(&self.pool, watch.id, price, Some("keepa")).await?;

        let percent_change = previous_price.and_then(|prev| {
            if prev > 0.0 {
                Some(((price - prev) / prev) * 100.0)
            } else {
                None
            }
        });
        let timestamp = format_unix_secs_iso(now_unix_secs());

        let event = PriceUpdateEvent {
            product_code: updated.product_code.clone(),
            product_title: updated.product_title.clone(),
            current_price: price,
            target_price: updated.target_price,
            previous_price,
            percent_change,
            domain: self.cfg.default_domain.as_str().to_string(),
            currency: "EUR".to_string(),
            timestamp: timestamp.clone(),
            event_type: EventType::PriceUpdate,
        };
        if let Ok(payload) = serde_json::to_string(&event) {
            self.producer
                .send_best_effort(
                    crate::config::topics::PRICE_UPDATES,
                    &updated.product_code,
                    &payload,
                )
                .await;
        }

        let doc = serde_json::json!({
            "product_code": updated.product_code,
            "product_title": updated.product_title,
            "current_price": price,
            "target_price": updated.target_price,
            "previous_price": previous_price,
            "percent_change": percent_change,
            "domain": self.cfg.default_domain.as_str(),
            "currency": "EUR",
            "timestamp": timestamp,
            "event_type": "price_update",
        });
        if let Err(e) = self.search.index_price(&updated.product_code, &doc).await {
            warn!(product_code = %updated.product_code, "search index write failed: {e}");
        }

        if price <= updated.target_price * crate::config::TARGET_TOLERANCE {
            db::alerts::create_price_alert(
                &self.pool,
                updated.id,
                price,
                updated.target_price,
                previous_price,
                price,
            )
            .await?;
        }

        Ok(())
    }

    /// §4.8 `runDailyDealReports`: for every active filter, evaluate
    /// recently collected deals against the filter's criteria, persist a
    /// report, and leave it for the out-of-scope report-delivery
    /// collaborator to send (§1 "dispatch policy in scope, transport is
    /// not" applies equally to reports).
    async fn run_daily_deal_reports(&self) -> Result<()> {
        let filters = db::filters::active_filters(&self.pool).await?;
        if filters.is_empty() {
            return Ok(());
        }
        info!(count = filters.len(), "running daily deal report pass");

        let since = now_unix_secs() - 24 * 3_600;
        let deals = db::deals::recent_deals(&self.pool, since, 500).await?;

        for filter in filters {
            let categories: Vec<String> =
                serde_json::from_str(&filter.categories).unwrap_or_default();
            let matched: Vec<&CollectedDeal> = deals
                .iter()
                .filter(|d| filter_matches(d, &filter, &categories))
                .collect();

            if matched.is_empty() {
                continue;
            }

            let payload = serde_json::json!({ "deals": matched });
            if let Err(e) = db::reports::create_report(&self.pool, &filter.id, &payload).await {
                warn!(filter_id = %filter.id, "report persistence failed: {e}");
            }
        }

        Ok(())
    }
}

fn filter_matches(
    deal: &CollectedDeal,
    filter: &db::models::DealFilterRow,
    categories: &[String],
) -> bool {
    if !categories.is_empty() {
        let in_category = deal
            .category
            .as_deref()
            .map(|c| categories.iter().any(|f| f == c))
            .unwrap_or(false);
        if !in_category {
            return false;
        }
    }
    if let Some(min) = filter.min_price {
        if deal.current_price < min {
            return false;
        }
    }
    if let Some(max) = filter.max_price {
        if deal.current_price > max {
            return false;
        }
    }
    if let Some(min) = filter.min_discount {
        if deal.discount_percent.unwrap_or(0.0) < min {
            return false;
        }
    }
    if let Some(max) = filter.max_discount {
        if deal.discount_percent.unwrap_or(0.0) > max {
            return false;
        }
    }
    if let Some(min) = filter.min_rating {
        if deal.rating.unwrap_or(0.0) < min {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DealFilterRow;

    fn deal(price: f64, discount: f64, rating: f64, category: &str) -> CollectedDeal {
        CollectedDeal {
            product_code: "B07W6JN8V8".to_string(),
            title: "Widget".to_string(),
            current_price: price,
            original_price: None,
            discount_percent: Some(discount),
            rating: Some(rating),
            review_count: None,
            sales_rank: None,
            market_domain: "DE".to_string(),
            category: Some(category.to_string()),
            deal_score: 70.0,
            url: None,
            prime_eligible: false,
            collected_at: 0,
        }
    }

    fn filter(min_price: Option<f64>, max_price: Option<f64>, min_discount: Option<f64>, min_rating: Option<f64>) -> DealFilterRow {
        DealFilterRow {
            id: "f1".to_string(),
            user_id: "u1".to_string(),
            categories: "[]".to_string(),
            min_price,
            max_price,
            min_discount,
            max_discount: None,
            min_rating,
            active: 1,
        }
    }

    #[test]
    fn filter_excludes_deal_below_min_price() {
        let f = filter(Some(20.0), None, None, None);
        assert!(!filter_matches(&deal(10.0, 50.0, 4.5, "Electronics"), &f, &[]));
    }

    #[test]
    fn filter_excludes_deal_below_min_discount() {
        let f = filter(None, None, Some(50.0), None);
        assert!(!filter_matches(&deal(10.0, 20.0, 4.5, "Electronics"), &f, &[]));
    }

    #[test]
    fn filter_excludes_deal_outside_category_set() {
        let f = filter(None, None, None, None);
        assert!(!filter_matches(
            &deal(10.0, 50.0, 4.5, "Garden"),
            &f,
            &["Electronics".to_string()]
        ));
    }

    #[test]
    fn filter_accepts_deal_matching_all_criteria() {
        let f = filter(Some(5.0), Some(100.0), Some(20.0), Some(4.0));
        assert!(filter_matches(
            &deal(45.0, 50.0, 4.5, "Electronics"),
            &f,
            &["Electronics".to_string()]
        ));
    }
}
