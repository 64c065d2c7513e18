use crate::error::{AppError, Result};
use crate::types::Domain;

/// Tolerance applied when deciding whether a watch's current price counts as
/// "crossed" its target: `current <= target * TARGET_TOLERANCE`. Preserved
/// verbatim from the source system (see DESIGN.md Open Questions).
pub const TARGET_TOLERANCE: f64 = 1.01;

/// Duplicate-alert suppression window, in seconds (§4.9, §8).
pub const ALERT_DEDUP_WINDOW_SECS: i64 = 3_600;

/// Maximum alerts delivered per user per rolling hour before digesting (§4.9).
pub const ALERT_RATE_CAP_PER_HOUR: u32 = 10;

/// Dispatch retry offsets, in seconds, relative to the first attempt (§4.9).
pub const DISPATCH_RETRY_OFFSETS_SECS: &[u64] = &[0, 30, 120];

/// Number of send attempts per channel before falling through (§4.9).
pub const DISPATCH_ATTEMPTS_PER_CHANNEL: u32 = 3;

/// Backoff schedule for a single retried upstream call (§4.2, §7).
pub const UPSTREAM_RETRY_BACKOFF_SECS: &[u64] = &[1, 2, 4];

/// Pause applied after a 429 before the single retry (§6).
pub const THROTTLE_PAUSE_SECS: u64 = 60;

/// Token bucket poll interval while a caller waits for `Acquire` (§4.1).
pub const BUCKET_POLL_MS: u64 = 500;

/// Default `maxWait` for a bucket `Acquire` call, in seconds (§4.1).
pub const BUCKET_DEFAULT_MAX_WAIT_SECS: u64 = 120;

/// How often the scheduler runs an alert-dispatch pass between price-check
/// cycles (§4.9 "Dispatcher drains pending alerts"). Not named explicitly
/// in §6's config table; the teacher has no equivalent constant to borrow
/// from, so this is a conservative fixed interval rather than a tunable.
pub const DISPATCH_POLL_INTERVAL_SECS: u64 = 60;

/// Default backoff before a consumer reconnects after an error (§4.5).
pub const CONSUMER_ERROR_BACKOFF_SECS: u64 = 5;

/// Default graceful-shutdown deadline (§5).
pub const SHUTDOWN_DEADLINE_SECS: u64 = 30;

/// Channel capacity for internal task-to-task routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Event log topics (§4.4).
pub mod topics {
    pub const PRICE_UPDATES: &str = "price-updates";
    pub const DEAL_UPDATES: &str = "deal-updates";
}

/// Event log consumer group ids (§4.5).
pub mod consumer_groups {
    pub const PRICE: &str = "keeper-consumer-group";
    pub const DEALS: &str = "keeper-consumer-group-deals";
}

/// Search index names and settings (§4.6).
pub mod search_indices {
    pub const PRICES: &str = "keeper-prices";
    pub const DEALS: &str = "keeper-deals";
    pub const MAX_RESULT_WINDOW: u32 = 50_000;
    pub const RETENTION_DAYS: i64 = 90;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_url: String,
    pub event_log_brokers: String,
    pub search_index_url: String,
    pub log_level: String,
    pub http_port: u16,

    /// "product_only" forces product-query fallback; "deals" enables the deal endpoint.
    pub deal_source_mode: DealSourceMode,
    pub deal_seed_file: String,
    pub deal_seed_asins: Vec<String>,
    pub deal_scan_interval_seconds: u64,
    pub deal_scan_batch_size: usize,

    pub price_check_interval_seconds: u64,
    pub parallel_price_fetch: usize,

    pub tokens_per_minute: u32,
    pub tokens_capacity: u32,

    /// Marketplace used for individual watch price checks (§4.8
    /// `runPriceCheck`). `WatchedProduct` (§3) carries no per-watch domain
    /// attribute, so a single configured default stands in for it — see
    /// DESIGN.md Open Questions.
    pub default_domain: Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealSourceMode {
    ProductOnly,
    Deals,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env("API_KEY")?,
            database_url: require_env("DATABASE_URL")?,
            event_log_brokers: require_env("EVENT_LOG_BROKERS")?,
            search_index_url: require_env("SEARCH_INDEX_URL")?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("HTTP_PORT must be a valid port number".to_string()))?,

            deal_source_mode: match std::env::var("DEAL_SOURCE_MODE")
                .unwrap_or_else(|_| "product_only".to_string())
                .as_str()
            {
                "deals" => DealSourceMode::Deals,
                _ => DealSourceMode::ProductOnly,
            },
            deal_seed_file: std::env::var("DEAL_SEED_FILE")
                .unwrap_or_else(|_| "data/seed_asins_eu_qwertz.txt".to_string()),
            deal_seed_asins: std::env::var("DEAL_SEED_ASINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            deal_scan_interval_seconds: parse_or("DEAL_SCAN_INTERVAL_SECONDS", 3_600),
            deal_scan_batch_size: parse_or("DEAL_SCAN_BATCH_SIZE", 10),

            price_check_interval_seconds: parse_or("PRICE_CHECK_INTERVAL_SECONDS", 21_600),
            parallel_price_fetch: parse_or("PARALLEL_PRICE_FETCH", 5),

            tokens_per_minute: parse_or("TOKENS_PER_MINUTE", 20),
            tokens_capacity: parse_or("TOKENS_CAPACITY", 200),

            default_domain: std::env::var("DEFAULT_DOMAIN")
                .ok()
                .and_then(|v| match v.to_uppercase().as_str() {
                    "US" => Some(Domain::Us),
                    "UK" => Some(Domain::Uk),
                    "DE" => Some(Domain::De),
                    "FR" => Some(Domain::Fr),
                    "IT" => Some(Domain::It),
                    "ES" => Some(Domain::Es),
                    _ => None,
                })
                .unwrap_or(Domain::De),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("{key} is required")))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
