mod chat;
mod health;
mod limit;
mod metrics;

pub use chat::chat_handler;
pub use health::health_handler;
pub use limit::limit_handler;
pub use metrics::metrics_handler;
