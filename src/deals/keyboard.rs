use super::normalize::NormalizedDeal;
use crate::types::Domain;

const KEYWORD_MARKERS: &[&str] = &[
    "tastatur",
    "keyboard",
    "clavier",
    "teclado",
    "tastiera",
    "qwertz",
    "azerty",
    "mechanisch",
    "keychron",
    "ducky",
];

const BRAND_WHITELIST: &[&str] = &["logitech", "cherry", "corsair", "razer"];

/// Keeps only items that plausibly are keyboards: a keyword in the
/// lowercased title, or a brand on the whitelist (§4.7 Domain predicate).
pub fn is_keyboard_deal(deal: &NormalizedDeal) -> bool {
    let title_match = deal
        .title
        .as_deref()
        .map(|t| {
            let lower = t.to_lowercase();
            KEYWORD_MARKERS.iter().any(|k| lower.contains(k))
        })
        .unwrap_or(false);

    let brand_match = deal
        .brand
        .as_deref()
        .map(|b| BRAND_WHITELIST.contains(&b.to_lowercase().as_str()))
        .unwrap_or(false);

    title_match || brand_match
}

/// Layout annotation: an explicit signal in the title wins; otherwise the
/// layout is inferred from the marketplace (§4.7 Layout annotation).
pub fn infer_layout(title: Option<&str>, domain: Domain) -> &'static str {
    if let Some(title) = title {
        let upper = title.to_uppercase();
        if upper.contains("QWERTZ") {
            return "QWERTZ";
        }
        if upper.contains("AZERTY") {
            return "AZERTY";
        }
        if upper.contains("QWERTY-IT") {
            return "QWERTY-IT";
        }
    }

    match domain {
        Domain::De => "QWERTZ",
        Domain::Fr => "AZERTY",
        Domain::It => "QWERTY-IT",
        _ => "QWERTY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal_with(title: &str, brand: Option<&str>) -> NormalizedDeal {
        NormalizedDeal {
            product_code: "B07W6JN8V8".to_string(),
            title: Some(title.to_string()),
            current_price: Some(45.0),
            list_price: Some(90.0),
            discount_percent: Some(50.0),
            rating: Some(4.2),
            review_count: Some(200),
            sales_rank: Some(500),
            category: Some("Electronics".to_string()),
            brand: brand.map(|b| b.to_string()),
            url: None,
            prime_eligible: false,
        }
    }

    #[test]
    fn keyword_in_title_is_kept() {
        assert!(is_keyboard_deal(&deal_with("Mechanische Tastatur QWERTZ", None)));
    }

    #[test]
    fn whitelisted_brand_is_kept_without_keyword() {
        assert!(is_keyboard_deal(&deal_with("Wireless Mouse Combo", Some("Logitech"))));
    }

    #[test]
    fn unrelated_item_is_rejected() {
        assert!(!is_keyboard_deal(&deal_with("Garden Hose 50ft", Some("NoName"))));
    }

    #[test]
    fn explicit_layout_signal_wins_over_market_inference() {
        assert_eq!(infer_layout(Some("Keychron K8 AZERTY"), Domain::De), "AZERTY");
    }

    #[test]
    fn market_inference_used_when_no_explicit_signal() {
        assert_eq!(infer_layout(Some("Keychron K8"), Domain::De), "QWERTZ");
        assert_eq!(infer_layout(Some("Keychron K8"), Domain::Fr), "AZERTY");
        assert_eq!(infer_layout(Some("Keychron K8"), Domain::It), "QWERTY-IT");
    }
}
