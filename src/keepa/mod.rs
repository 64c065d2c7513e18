pub mod client;
pub mod domain;
pub mod price_extract;

pub use client::{Deal, KeepaClient, TokenStatus};
pub use domain::Domain;
pub use price_extract::Product;
