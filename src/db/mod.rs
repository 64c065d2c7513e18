pub mod alerts;
pub mod deals;
pub mod filters;
pub mod history;
pub mod models;
pub mod pool;
pub mod reports;
pub mod users;
pub mod watches;
