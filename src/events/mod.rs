pub mod deal_consumer;
pub mod price_consumer;
pub mod producer;

pub use deal_consumer::DealConsumer;
pub use price_consumer::PriceConsumer;
pub use producer::EventLogProducer;
