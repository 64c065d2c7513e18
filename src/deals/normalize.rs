use serde_json::Value;

/// Canonical deal record produced from a heterogeneous upstream payload
/// (§4.7 Normalization). Downstream scoring/filtering/fan-out all operate
/// on this shape; nothing past this module sees raw upstream field names.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDeal {
    pub product_code: String,
    pub title: Option<String>,
    pub current_price: Option<f64>,
    pub list_price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub sales_rank: Option<i64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub url: Option<String>,
    pub prime_eligible: bool,
}

/// Accepts both camelCase and underscore_case field aliases, and both
/// "list_price"/"original_price" spellings for the pre-discount price.
/// Numeric fields may arrive as JSON numbers or as numeric strings.
pub fn normalize(product_code: &str, raw: &Value) -> NormalizedDeal {
    let title = first_str(raw, &["title", "product_title", "productTitle"]);
    let current_price = first_number(raw, &["current_price", "currentPrice", "price"]);
    let list_price = first_number(
        raw,
        &[
            "list_price",
            "listPrice",
            "original_price",
            "originalPrice",
        ],
    );
    let rating = first_number(raw, &["rating", "stars", "avg_rating", "avgRating"]);
    let review_count =
        first_number(raw, &["review_count", "reviewCount", "reviews"]).map(|v| v as i64);
    let sales_rank = first_number(raw, &["sales_rank", "salesRank", "rank"]).map(|v| v as i64);
    let category = first_str(raw, &["category", "category_name", "categoryName"]);
    let brand = first_str(raw, &["brand", "brand_name", "brandName"]);
    let url = first_str(raw, &["url", "productUrl", "product_url"]);
    let prime_eligible = first_bool(raw, &["prime_eligible", "primeEligible", "isPrime"]);

    let discount_percent = match (current_price, list_price) {
        (Some(current), Some(list)) if current > 0.0 && list > 0.0 && list > current => {
            Some((((1.0 - current / list) * 100.0) * 10.0).round() / 10.0)
        }
        _ => first_number(
            raw,
            &["discount_percent", "discountPercent", "delta_percent", "deltaPercent"],
        ),
    };

    NormalizedDeal {
        product_code: product_code.to_string(),
        title,
        current_price,
        list_price,
        discount_percent,
        rating,
        review_count,
        sales_rank,
        category,
        brand,
        url,
        prime_eligible,
    }
}

fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| raw.get(*k))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn first_number(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| raw.get(*k)).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
    })
}

fn first_bool(raw: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|k| raw.get(*k))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_aliases_are_accepted() {
        let raw = json!({
            "currentPrice": 19.99,
            "originalPrice": 29.99,
            "title": "Widget"
        });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.current_price, Some(19.99));
        assert_eq!(deal.list_price, Some(29.99));
    }

    #[test]
    fn underscore_case_aliases_are_accepted() {
        let raw = json!({
            "current_price": 19.99,
            "list_price": 29.99
        });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.current_price, Some(19.99));
        assert_eq!(deal.list_price, Some(29.99));
    }

    #[test]
    fn stringified_numbers_are_parsed() {
        let raw = json!({
            "current_price": "19.99",
            "list_price": "29.99"
        });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.current_price, Some(19.99));
        assert_eq!(deal.list_price, Some(29.99));
    }

    #[test]
    fn discount_computed_when_both_prices_present() {
        let raw = json!({ "current_price": 75.0, "list_price": 100.0 });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.discount_percent, Some(25.0));
    }

    #[test]
    fn discount_taken_from_upstream_when_prices_missing() {
        let raw = json!({ "discount_percent": 42.0 });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.discount_percent, Some(42.0));
    }

    #[test]
    fn discount_not_computed_when_list_below_current() {
        let raw = json!({ "current_price": 100.0, "list_price": 50.0 });
        let deal = normalize("B07W6JN8V8", &raw);
        assert_eq!(deal.discount_percent, None);
    }
}
