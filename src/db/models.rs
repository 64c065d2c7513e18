/// Database row types, decoupled from the wire/domain types in `types.rs` so
/// schema-column shape and public API shape can drift independently.

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub messaging_channel_address: Option<String>,
    pub webhook_url: Option<String>,
    pub deleted: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct WatchedProductRow {
    pub id: String,
    pub user_id: String,
    pub product_code: String,
    pub product_title: String,
    pub current_price: Option<f64>,
    pub target_price: f64,
    pub volatility_score: f64,
    pub status: String,
    pub last_checked_at: Option<i64>,
    pub last_price_change_at: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub watch_id: String,
    pub price: f64,
    pub source: Option<String>,
    pub recorded_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceAlertRow {
    pub id: String,
    pub watch_id: String,
    pub triggered_price: f64,
    pub target_price: f64,
    pub old_price: Option<f64>,
    pub new_price: f64,
    pub discount_percent: Option<f64>,
    pub status: String,
    pub notification_channel: Option<String>,
    pub triggered_at: i64,
    pub sent_at: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DealFilterRow {
    pub id: String,
    pub user_id: String,
    pub categories: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_discount: Option<f64>,
    pub max_discount: Option<f64>,
    pub min_rating: Option<f64>,
    pub active: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DealReportRow {
    pub id: String,
    pub filter_id: String,
    pub payload: String,
    pub generated_at: i64,
    pub sent_at: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CollectedDealRow {
    pub id: i64,
    pub product_code: String,
    pub title: String,
    pub current_price: f64,
    pub original_price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub sales_rank: Option<i64>,
    pub market_domain: String,
    pub category: Option<String>,
    pub deal_score: f64,
    pub url: Option<String>,
    pub prime_eligible: i64,
    pub collected_at: i64,
}

impl From<WatchedProductRow> for crate::types::WatchedProduct {
    fn from(row: WatchedProductRow) -> Self {
        use std::str::FromStr;
        crate::types::WatchedProduct {
            id: crate::types::WatchId(uuid::Uuid::parse_str(&row.id).unwrap_or_default()),
            user_id: crate::types::UserId(
                uuid::Uuid::parse_str(&row.user_id).unwrap_or_default(),
            ),
            product_code: row.product_code,
            product_title: row.product_title,
            current_price: row.current_price,
            target_price: row.target_price,
            volatility_score: row.volatility_score,
            status: crate::types::WatchStatus::from_str(&row.status)
                .unwrap_or(crate::types::WatchStatus::Active),
            last_checked_at: row.last_checked_at,
            last_price_change_at: row.last_price_change_at,
        }
    }
}

impl From<CollectedDealRow> for crate::types::CollectedDeal {
    fn from(row: CollectedDealRow) -> Self {
        crate::types::CollectedDeal {
            product_code: row.product_code,
            title: row.title,
            current_price: row.current_price,
            original_price: row.original_price,
            discount_percent: row.discount_percent,
            rating: row.rating,
            review_count: row.review_count,
            sales_rank: row.sales_rank,
            market_domain: row.market_domain,
            category: row.category,
            deal_score: row.deal_score,
            url: row.url,
            prime_eligible: row.prime_eligible != 0,
            collected_at: row.collected_at,
        }
    }
}
