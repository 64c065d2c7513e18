pub mod client;
pub mod mappings;

pub use client::SearchIndexClient;
