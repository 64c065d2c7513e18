use super::normalize::NormalizedDeal;

const SPAM_TITLE_MARKERS: &[&str] = &["dropship", "fast shipping"];

/// Rejects a deal if any rule holds (§4.7 Spam filter): rating below 3.5,
/// price below 10, discount above 80%, a spam marker in the title, or a
/// missing title altogether.
pub fn is_spam(deal: &NormalizedDeal) -> bool {
    let Some(title) = &deal.title else {
        return true;
    };
    let lower = title.to_lowercase();

    if deal.rating.map(|r| r < 3.5).unwrap_or(false) {
        return true;
    }
    if deal.current_price.map(|p| p < 10.0).unwrap_or(false) {
        return true;
    }
    if deal.discount_percent.map(|d| d > 80.0).unwrap_or(false) {
        return true;
    }
    if SPAM_TITLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_deal() -> NormalizedDeal {
        NormalizedDeal {
            product_code: "B07W6JN8V8".to_string(),
            title: Some("Mechanical Keyboard".to_string()),
            current_price: Some(45.0),
            list_price: Some(90.0),
            discount_percent: Some(50.0),
            rating: Some(4.2),
            review_count: Some(200),
            sales_rank: Some(500),
            category: Some("Electronics".to_string()),
            brand: Some("Keychron".to_string()),
            url: None,
            prime_eligible: false,
        }
    }

    #[test]
    fn clean_deal_passes() {
        assert!(!is_spam(&base_deal()));
    }

    #[test]
    fn missing_title_is_spam() {
        let mut d = base_deal();
        d.title = None;
        assert!(is_spam(&d));
    }

    #[test]
    fn low_rating_is_spam() {
        let mut d = base_deal();
        d.rating = Some(3.0);
        assert!(is_spam(&d));
    }

    #[test]
    fn price_below_ten_is_spam() {
        let mut d = base_deal();
        d.current_price = Some(9.99);
        assert!(is_spam(&d));
    }

    #[test]
    fn discount_above_eighty_percent_is_spam() {
        let mut d = base_deal();
        d.discount_percent = Some(90.0);
        assert!(is_spam(&d));
    }

    #[test]
    fn dropship_title_is_spam() {
        let mut d = base_deal();
        d.title = Some("Cheap Fast Shipping Dropship Keyboard".to_string());
        d.discount_percent = Some(90.0);
        d.rating = Some(3.2);
        assert!(is_spam(&d));
    }
}
