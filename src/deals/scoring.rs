use super::normalize::NormalizedDeal;

/// Weighted composite score in [0, 100] (§4.7 Scoring, GLOSSARY). A deal
/// missing rating/rank/price information scores 0 on that component rather
/// than being rejected here — the spam filter handles absence separately.
pub fn score(deal: &NormalizedDeal) -> f64 {
    let discount = deal.discount_percent.unwrap_or(0.0).clamp(0.0, 100.0);
    let rating_score = deal.rating.map(|r| (r / 5.0) * 100.0).unwrap_or(0.0);
    let rank_score = deal
        .sales_rank
        .map(|r| 100.0 * (1.0 - (r as f64 / 100_000.0).min(1.0)))
        .unwrap_or(0.0);
    let price_score = deal
        .current_price
        .map(|p| 100.0 * (1.0 - (p / 500.0).min(1.0)))
        .unwrap_or(0.0);

    0.50 * discount + 0.35 * rating_score + 0.10 * rank_score + 0.05 * price_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(discount: f64, rating: f64, rank: i64, price: f64) -> NormalizedDeal {
        NormalizedDeal {
            product_code: "B07W6JN8V8".to_string(),
            title: Some("Widget".to_string()),
            current_price: Some(price),
            list_price: None,
            discount_percent: Some(discount),
            rating: Some(rating),
            review_count: None,
            sales_rank: Some(rank),
            category: None,
            brand: None,
            url: None,
            prime_eligible: false,
        }
    }

    #[test]
    fn perfect_deal_scores_near_ceiling() {
        let d = deal(100.0, 5.0, 0, 0.0);
        assert!((score(&d) - 100.0).abs() < 0.01);
    }

    #[test]
    fn worst_deal_scores_zero() {
        let d = deal(0.0, 0.0, 1_000_000, 10_000.0);
        assert_eq!(score(&d), 0.0);
    }

    #[test]
    fn missing_components_contribute_zero_not_reject() {
        let d = NormalizedDeal {
            product_code: "B07W6JN8V8".to_string(),
            title: Some("Widget".to_string()),
            current_price: None,
            list_price: None,
            discount_percent: Some(50.0),
            rating: None,
            review_count: None,
            sales_rank: None,
            category: None,
            brand: None,
            url: None,
            prime_eligible: false,
        };
        assert!((score(&d) - 25.0).abs() < 0.01);
    }
}
