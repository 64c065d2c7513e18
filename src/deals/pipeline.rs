use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{Config, DealSourceMode};
use crate::error::{AppError, Result};
use crate::events::EventLogProducer;
use crate::keepa::{Deal, Domain, KeepaClient};
use crate::search::SearchIndexClient;
use crate::types::{format_unix_secs_iso, now_unix_secs, CollectedDeal};

use super::keyboard::{infer_layout, is_keyboard_deal};
use super::normalize::normalize;
use super::scoring::score;
use super::seeds::SeedSource;
use super::spam::is_spam;

const EU_DOMAINS: &[Domain] = &[Domain::De, Domain::Uk, Domain::Fr, Domain::It, Domain::Es];

/// Long-running task launched by the scheduler at startup (§4.7). Each
/// iteration resolves the seed set, groups it by marketplace, fetches
/// products with bounded concurrency, and fans each kept deal out to
/// persistence, the event log, and the search index.
pub struct DealPipeline {
    pool: sqlx::SqlitePool,
    client: Arc<KeepaClient>,
    producer: Arc<EventLogProducer>,
    search: Arc<SearchIndexClient>,
    seeds: SeedSource,
    concurrency: usize,
    interval_secs: u64,
    deal_source_mode: DealSourceMode,
    deal_endpoint_disabled: Arc<std::sync::atomic::AtomicBool>,
}

impl DealPipeline {
    pub fn new(
        cfg: &Config,
        pool: sqlx::SqlitePool,
        client: Arc<KeepaClient>,
        producer: Arc<EventLogProducer>,
        search: Arc<SearchIndexClient>,
    ) -> Self {
        Self {
            pool,
            client,
            producer,
            search,
            seeds: SeedSource::from_config(cfg),
            concurrency: cfg.parallel_price_fetch.max(1),
            interval_secs: cfg.deal_scan_interval_seconds,
            deal_source_mode: cfg.deal_source_mode,
            deal_endpoint_disabled: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("deal pipeline shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_iteration().await {
                        warn!("deal pipeline iteration failed: {e}");
                    }
                }
            }
        }
    }

    async fn run_iteration(&mut self) -> Result<()> {
        if self.deal_source_mode == DealSourceMode::Deals && !self.deal_endpoint_disabled() {
            match self.run_deal_endpoint_iteration().await {
                Ok(()) => return Ok(()),
                Err(AppError::DealAccessDenied) => {
                    warn!("deal endpoint denied for this process, falling back to product queries");
                    self.disable_deal_endpoint();
                }
                Err(e) => warn!("deal endpoint scan failed, falling back to product queries: {e}"),
            }
        }

        self.run_product_query_iteration().await
    }

    /// §4.7 edge case 4: attempts the deal-search endpoint across every
    /// configured marketplace. A single `DealAccessDenied` anywhere
    /// propagates up so the caller can disable the endpoint for the rest of
    /// this process's lifetime and fall back to per-seed product queries.
    async fn run_deal_endpoint_iteration(&self) -> Result<()> {
        for &domain in EU_DOMAINS {
            let filter = json!({ "domainId": domain as u8, "priceTypes": [0] });
            let deals = self.client.search_deals(&filter).await?;
            for deal in &deals {
                self.process_deal(domain, deal).await;
            }
        }
        Ok(())
    }

    async fn process_deal(&self, domain: Domain, deal: &Deal) {
        let raw = json!({
            "title": deal.title,
            "current_price": deal.current_price.map(|v| v as f64 / 100.0),
            "list_price": deal.original_price.map(|v| v as f64 / 100.0),
            "discount_percent": deal.delta_percent,
            "rating": deal.rating.map(|v| v as f64 / 10.0),
            "review_count": deal.review_count,
            "sales_rank": deal.sales_rank,
            "category": deal.category,
        });
        self.process_normalized(domain, &deal.asin, &raw).await;
    }

    async fn run_product_query_iteration(&mut self) -> Result<()> {
        let grouped = self.seeds.resolve_by_domain(EU_DOMAINS);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        for (domain, codes) in grouped {
            let mut tasks = Vec::with_capacity(codes.len());
            for code in codes {
                let semaphore = Arc::clone(&semaphore);
                let client = Arc::clone(&self.client);
                let permit_code = code.clone();
                tasks.push(async move {
                    let _permit = semaphore.acquire().await.ok()?;
                    match client.query_product(&permit_code, domain).await {
                        Ok(product) => Some((permit_code, product)),
                        Err(e) => {
                            debug!("deal pipeline product fetch failed for {permit_code}: {e}");
                            None
                        }
                    }
                });
            }

            let results = futures::future::join_all(tasks).await;

            for result in results.into_iter().flatten() {
                let (code, product) = result;
                self.process_product(domain, &code, &product).await;
            }
        }

        Ok(())
    }

    async fn process_product(&self, domain: Domain, code: &str, product: &crate::keepa::Product) {
        let raw = json!({
            "title": product.title,
            "current_price": product.current_price(),
            "rating": product.current_rating(),
            "review_count": product.current_review_count(),
            "sales_rank": product.current_sales_rank(),
            "category": product.category(),
        });

        self.process_normalized(domain, code, &raw).await;
    }

    async fn process_normalized(&self, domain: Domain, code: &str, raw: &serde_json::Value) {
        let deal = normalize(code, raw);

        if is_spam(&deal) {
            debug!("deal {code} rejected by spam filter");
            return;
        }
        if !is_keyboard_deal(&deal) {
            debug!("deal {code} rejected by keyboard-domain predicate");
            return;
        }

        let Some(current_price) = deal.current_price else {
            return;
        };

        let deal_score = score(&deal);
        let layout = infer_layout(deal.title.as_deref(), domain);
        let collected_at = now_unix_secs();

        let collected = CollectedDeal {
            product_code: deal.product_code.clone(),
            title: deal.title.clone().unwrap_or_default(),
            current_price,
            original_price: deal.list_price,
            discount_percent: deal.discount_percent,
            rating: deal.rating,
            review_count: deal.review_count,
            sales_rank: deal.sales_rank,
            market_domain: domain.as_str().to_string(),
            category: deal.category.clone(),
            deal_score,
            url: deal.url.clone(),
            prime_eligible: deal.prime_eligible,
            collected_at,
        };

        // (a) persistence
        if let Err(e) = crate::db::deals::save_collected_deals_batch(&self.pool, std::slice::from_ref(&collected)).await {
            warn!("deal {code} persistence write failed: {e}");
        }

        // (b) event log — best-effort, never blocks (a)/(c)
        let event = crate::types::DealUpdateEvent {
            product_code: collected.product_code.clone(),
            product_title: collected.title.clone(),
            current_price: collected.current_price,
            target_price: collected.current_price,
            previous_price: None,
            percent_change: None,
            domain: collected.market_domain.clone(),
            currency: "EUR".to_string(),
            timestamp: format_unix_secs_iso(collected_at),
            event_type: crate::types::EventType::DealUpdate,
        };
        if let Ok(payload) = serde_json::to_string(&event) {
            self.producer
                .send_best_effort(crate::config::topics::DEAL_UPDATES, code, &payload)
                .await;
        }

        // (c) search index
        let doc = json!({
            "product_code": collected.product_code,
            "title": collected.title,
            "current_price": collected.current_price,
            "original_price": collected.original_price,
            "discount_percent": collected.discount_percent,
            "rating": collected.rating,
            "review_count": collected.review_count,
            "sales_rank": collected.sales_rank,
            "domain": collected.market_domain,
            "category": collected.category,
            "prime_eligible": collected.prime_eligible,
            "deal_score": collected.deal_score,
            "layout": layout,
            "timestamp": format_unix_secs_iso(collected_at),
        });
        if let Err(e) = self.search.index_deal(code, &doc).await {
            warn!("deal {code} search index write failed: {e}");
        }

        // (d) alert if any watching user's target is crossed
        if let Ok(watches) = crate::db::watches::get_active_watches(&self.pool).await {
            for watch in watches.iter().filter(|w| w.product_code == collected.product_code) {
                if collected.current_price <= watch.target_price * crate::config::TARGET_TOLERANCE {
                    if let Err(e) = crate::db::alerts::create_price_alert(
                        &self.pool,
                        watch.id,
                        collected.current_price,
                        watch.target_price,
                        watch.current_price,
                        collected.current_price,
                    )
                    .await
                    {
                        warn!("deal {code} alert creation failed: {e}");
                    }
                }
            }
        }
    }

    /// Disables the deal endpoint for the remaining lifetime of this
    /// process (§4.7 edge case 4); subsequent iterations fall back to
    /// per-seed product queries regardless of `deal_source_mode`.
    pub fn disable_deal_endpoint(&self) {
        self.deal_endpoint_disabled
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn deal_endpoint_disabled(&self) -> bool {
        self.deal_endpoint_disabled.load(std::sync::atomic::Ordering::Relaxed)
    }
}
