pub use crate::types::Domain;

/// Price series type indices within the external API's packed `csv` array
/// (§4.2). Only the series the priority chain consults are named; the
/// upstream format defines more (SalesRank=3, Rating=16, ReviewCount=17,
/// …) that the pipeline reads elsewhere.
pub mod series {
    pub const AMAZON: usize = 0;
    pub const MARKETPLACE_NEW: usize = 1;
    pub const MARKETPLACE_USED: usize = 2;
    pub const SALES_RANK: usize = 3;
    pub const NEW_FBA: usize = 7;
    pub const WAREHOUSE: usize = 9;
    pub const BUY_BOX: usize = 11;
    pub const USED_LIKE_NEW: usize = 12;
    pub const RATING: usize = 16;
    pub const REVIEW_COUNT: usize = 17;
    pub const BUY_BOX_USED: usize = 18;
}

/// The order in which series are consulted when resolving a product's
/// current price (§4.2).
pub const PRICE_PRIORITY_CHAIN: &[usize] = &[
    series::AMAZON,
    series::BUY_BOX,
    series::NEW_FBA,
    series::MARKETPLACE_NEW,
    series::USED_LIKE_NEW,
    series::BUY_BOX_USED,
    series::WAREHOUSE,
];

/// A series value of `-1` means "not available for this series at this
/// time"; `-2` means "series never populated" (§4.2, GLOSSARY).
pub const SENTINEL_UNAVAILABLE: i64 = -1;
pub const SENTINEL_NEVER_POPULATED: i64 = -2;
