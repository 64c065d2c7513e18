use serde::Deserialize;

use super::domain::{series, PRICE_PRIORITY_CHAIN, SENTINEL_NEVER_POPULATED, SENTINEL_UNAVAILABLE};

/// A single packed price series: `[t0, v0, t1, v1, …]` in chronological
/// order (§4.2, GLOSSARY). Deserialized directly from the upstream array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PackedSeries(pub Vec<i64>);

impl PackedSeries {
    /// The most recent (time, value) pair, if any.
    fn last_pair(&self) -> Option<(i64, i64)> {
        if self.0.len() < 2 {
            return None;
        }
        let len = self.0.len();
        Some((self.0[len - 2], self.0[len - 1]))
    }

    /// Most recent usable value in currency cents, skipping sentinel values
    /// by walking backward through recorded pairs.
    fn last_usable_value(&self) -> Option<i64> {
        let mut idx = self.0.len();
        while idx >= 2 {
            let value = self.0[idx - 1];
            if value != SENTINEL_UNAVAILABLE && value != SENTINEL_NEVER_POPULATED && value > 0 {
                return Some(value);
            }
            idx -= 2;
        }
        None
    }
}

/// Raw product payload from the external API, covering only the fields the
/// pipeline reads (§4.2).
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain_id: Option<u8>,
    #[serde(default)]
    pub csv: Vec<Option<PackedSeries>>,
    #[serde(default)]
    pub stats: Option<Stats>,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default, rename = "buyBoxPrice")]
    pub buy_box_price: Option<i64>,
    #[serde(default)]
    pub category_tree: Vec<CategoryNode>,
    #[serde(default, rename = "salesRanks")]
    pub sales_ranks: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub current: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Offer {
    #[serde(default, rename = "offerCSV")]
    pub offer_csv: Option<PackedSeries>,
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryNode {
    #[serde(default)]
    pub name: Option<String>,
}

impl Product {
    fn series_at(&self, idx: usize) -> Option<&PackedSeries> {
        self.csv.get(idx).and_then(|opt| opt.as_ref())
    }

    /// Walks `csv[0] → csv[11] → csv[7] → csv[1] → csv[12] → csv[18] →
    /// csv[9]`, then `stats.current` in the same order, then offer arrays,
    /// then the root `buyBoxPrice`. Returns the price in currency units
    /// (§4.2), or `None` if nothing resolves.
    pub fn current_price(&self) -> Option<f64> {
        for &idx in PRICE_PRIORITY_CHAIN {
            if let Some(series) = self.series_at(idx) {
                if let Some((_, value)) = series.last_pair() {
                    if value > 0 {
                        return Some(value as f64 / 100.0);
                    }
                }
            }
        }

        if let Some(stats) = &self.stats {
            for &idx in PRICE_PRIORITY_CHAIN {
                if let Some(&value) = stats.current.get(idx) {
                    if value > 0 {
                        return Some(value as f64 / 100.0);
                    }
                }
            }
        }

        for offer in &self.offers {
            if let Some(price) = offer.price {
                if price > 0 {
                    return Some(price as f64 / 100.0);
                }
            }
            if let Some(csv) = &offer.offer_csv {
                if let Some(value) = csv.last_usable_value() {
                    return Some(value as f64 / 100.0);
                }
            }
        }

        if let Some(price) = self.buy_box_price {
            if price > 0 {
                return Some(price as f64 / 100.0);
            }
        }

        None
    }

    /// Current sales rank, reading `csv[3]` the same way as price series.
    pub fn current_sales_rank(&self) -> Option<i64> {
        self.series_at(series::SALES_RANK)
            .and_then(|s| s.last_usable_value())
    }

    /// Rating on a 0-5 scale. The upstream stores it as ten times the
    /// rating (half-star resolution); values above 10 are halved back down
    /// before normalizing (§4.2).
    pub fn current_rating(&self) -> Option<f64> {
        let raw = self
            .series_at(series::RATING)
            .and_then(|s| s.last_usable_value())?;
        Some(if raw > 10 { raw as f64 / 10.0 } else { raw as f64 })
    }

    pub fn current_review_count(&self) -> Option<i64> {
        self.series_at(series::REVIEW_COUNT)
            .and_then(|s| s.last_usable_value())
    }

    pub fn category(&self) -> Option<String> {
        self.category_tree.last().and_then(|n| n.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(i64, i64)]) -> Option<PackedSeries> {
        let mut v = Vec::new();
        for (t, val) in pairs {
            v.push(*t);
            v.push(*val);
        }
        Some(PackedSeries(v))
    }

    fn empty_product(csv: Vec<Option<PackedSeries>>) -> Product {
        Product {
            asin: "B07W6JN8V8".to_string(),
            title: Some("Test product".to_string()),
            domain_id: Some(3),
            csv,
            stats: None,
            offers: Vec::new(),
            buy_box_price: None,
            category_tree: Vec::new(),
            sales_ranks: None,
        }
    }

    #[test]
    fn amazon_series_takes_priority() {
        let mut csv = vec![None; 19];
        csv[0] = series(&[(100, 4499)]);
        csv[11] = series(&[(100, 9999)]);
        let product = empty_product(csv);
        assert_eq!(product.current_price(), Some(44.99));
    }

    #[test]
    fn falls_through_to_buy_box_when_amazon_unavailable() {
        let mut csv = vec![None; 19];
        csv[0] = series(&[(100, SENTINEL_UNAVAILABLE)]);
        csv[11] = series(&[(100, 5499)]);
        let product = empty_product(csv);
        assert_eq!(product.current_price(), Some(54.99));
    }

    #[test]
    fn all_negative_series_yields_no_price() {
        let mut csv = vec![None; 19];
        csv[0] = series(&[(100, SENTINEL_UNAVAILABLE)]);
        csv[11] = series(&[(100, SENTINEL_NEVER_POPULATED)]);
        let product = empty_product(csv);
        assert_eq!(product.current_price(), None);
    }

    #[test]
    fn stats_current_used_when_csv_empty() {
        let mut product = empty_product(vec![]);
        product.stats = Some(Stats {
            current: vec![3999, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        });
        assert_eq!(product.current_price(), Some(39.99));
    }

    #[test]
    fn buy_box_price_is_last_resort() {
        let mut product = empty_product(vec![]);
        product.buy_box_price = Some(2500);
        assert_eq!(product.current_price(), Some(25.0));
    }

    #[test]
    fn rating_above_ten_is_halved_before_normalizing() {
        let mut csv = vec![None; 19];
        csv[16] = series(&[(100, 45)]);
        let product = empty_product(csv);
        assert_eq!(product.current_rating(), Some(4.5));
    }

    #[test]
    fn last_usable_value_skips_trailing_sentinels() {
        let s = PackedSeries(vec![100, 1999, 200, SENTINEL_UNAVAILABLE, 300, SENTINEL_NEVER_POPULATED]);
        assert_eq!(s.last_usable_value(), Some(1999));
    }
}
