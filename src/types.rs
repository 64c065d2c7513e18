use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque 128-bit user identifier (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The reserved all-zero identifier denoting the system user (§3, §9).
pub const SYSTEM_USER_ID: UserId = UserId(Uuid::nil());

/// Opaque 128-bit watch identifier (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchId(pub Uuid);

impl WatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub messaging_channel_address: Option<String>,
    pub webhook_url: Option<String>,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Marketplace domain (§4.2, GLOSSARY)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Domain {
    Us = 1,
    Uk = 2,
    De = 3,
    Fr = 4,
    It = 8,
    Es = 9,
}

impl Domain {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Domain::Us),
            2 => Some(Domain::Uk),
            3 => Some(Domain::De),
            4 => Some(Domain::Fr),
            8 => Some(Domain::It),
            9 => Some(Domain::Es),
            _ => None,
        }
    }

    /// Per-country hostname used only for constructing product URLs (GLOSSARY).
    pub fn hostname(&self) -> &'static str {
        match self {
            Domain::Us => "www.amazon.com",
            Domain::Uk => "www.amazon.co.uk",
            Domain::De => "www.amazon.de",
            Domain::Fr => "www.amazon.fr",
            Domain::It => "www.amazon.it",
            Domain::Es => "www.amazon.es",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Us => "US",
            Domain::Uk => "UK",
            Domain::De => "DE",
            Domain::Fr => "FR",
            Domain::It => "IT",
            Domain::Es => "ES",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WatchedProduct
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchStatus {
    Active,
    Paused,
    Inactive,
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WatchStatus::Active => "ACTIVE",
            WatchStatus::Paused => "PAUSED",
            WatchStatus::Inactive => "INACTIVE",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(WatchStatus::Active),
            "PAUSED" => Ok(WatchStatus::Paused),
            "INACTIVE" => Ok(WatchStatus::Inactive),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedProduct {
    pub id: WatchId,
    pub user_id: UserId,
    pub product_code: String,
    pub product_title: String,
    pub current_price: Option<f64>,
    pub target_price: f64,
    pub volatility_score: f64,
    pub status: WatchStatus,
    pub last_checked_at: Option<i64>,
    pub last_price_change_at: Option<i64>,
}

/// A product code is exactly 10 alphanumeric characters (§3, §8).
pub fn validate_product_code(code: &str) -> crate::error::Result<()> {
    if code.len() == 10 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(crate::error::AppError::InvalidInput(format!(
            "product code must be exactly 10 alphanumeric characters, got {code:?}"
        )))
    }
}

/// Target price must be strictly positive (§3, §8).
pub fn validate_target_price(price: f64) -> crate::error::Result<()> {
    if price > 0.0 {
        Ok(())
    } else {
        Err(crate::error::AppError::InvalidInput(format!(
            "target price must be > 0, got {price}"
        )))
    }
}

// ---------------------------------------------------------------------------
// PriceHistory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub watch_id: WatchId,
    pub price: f64,
    pub source: Option<String>,
    pub recorded_at: i64,
}

// ---------------------------------------------------------------------------
// PriceAlert
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertStatus::Pending => "PENDING",
            AlertStatus::Sent => "SENT",
            AlertStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AlertStatus::Pending),
            "SENT" => Ok(AlertStatus::Sent),
            "FAILED" => Ok(AlertStatus::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: String,
    pub watch_id: WatchId,
    pub triggered_price: f64,
    pub target_price: f64,
    pub old_price: Option<f64>,
    pub new_price: f64,
    pub discount_percent: Option<f64>,
    pub status: AlertStatus,
    pub notification_channel: Option<String>,
    pub triggered_at: i64,
    pub sent_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// DealFilter / DealReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFilter {
    pub id: String,
    pub user_id: UserId,
    pub categories: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_discount: Option<f64>,
    pub max_discount: Option<f64>,
    pub min_rating: Option<f64>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealReport {
    pub id: String,
    pub filter_id: String,
    pub payload: serde_json::Value,
    pub generated_at: i64,
    pub sent_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// CollectedDeal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedDeal {
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
    pub prime_eligible: bool,
    pub collected_at: i64,
}

// ---------------------------------------------------------------------------
// Event log payloads (§4.4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PriceUpdate,
    DealUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdateEvent {
    pub product_code: String,
    pub product_title: String,
    pub current_price: f64,
    pub target_price: f64,
    pub previous_price: Option<f64>,
    pub percent_change: Option<f64>,
    pub domain: String,
    pub currency: String,
    pub timestamp: String,
    pub event_type: EventType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealUpdateEvent {
    pub product_code: String,
    pub product_title: String,
    pub current_price: f64,
    pub target_price: f64,
    pub previous_price: Option<f64>,
    pub percent_change: Option<f64>,
    pub domain: String,
    pub currency: String,
    pub timestamp: String,
    pub event_type: EventType,
}

pub fn now_unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Format a Unix-seconds timestamp as an RFC 3339 / ISO 8601 UTC string
/// without pulling in a date-time crate, matching the teacher's own
/// hand-rolled calendar arithmetic in reverse.
pub fn format_unix_secs_iso(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    // Civil-from-days algorithm (Howard Hinnant's date algorithms).
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_code_length_enforced() {
        assert!(validate_product_code("B07W6JN8V8").is_ok());
        assert!(validate_product_code("TOOSHORT").is_err());
        assert!(validate_product_code("B07W6JN8V8X").is_err());
        assert!(validate_product_code("B07W6J-8V8").is_err());
    }

    #[test]
    fn target_price_must_be_positive() {
        assert!(validate_target_price(45.0).is_ok());
        assert!(validate_target_price(0.0).is_err());
        assert!(validate_target_price(-1.0).is_err());
    }

    #[test]
    fn domain_hostname_mapping_covers_five_markets() {
        assert_eq!(Domain::De.hostname(), "www.amazon.de");
        assert_eq!(Domain::Uk.hostname(), "www.amazon.co.uk");
        assert_eq!(Domain::Fr.hostname(), "www.amazon.fr");
        assert_eq!(Domain::It.hostname(), "www.amazon.it");
        assert_eq!(Domain::Es.hostname(), "www.amazon.es");
    }

    #[test]
    fn domain_from_id_rejects_unknown() {
        assert!(Domain::from_id(5).is_none());
        assert_eq!(Domain::from_id(3), Some(Domain::De));
    }

    #[test]
    fn system_user_is_all_zero() {
        assert_eq!(SYSTEM_USER_ID.0, Uuid::nil());
    }

    #[test]
    fn iso_format_round_trips_known_instant() {
        // 2024-01-15T10:30:00Z
        let secs = 1_705_314_600;
        assert_eq!(format_unix_secs_iso(secs), "2024-01-15T10:30:00Z");
    }
}
