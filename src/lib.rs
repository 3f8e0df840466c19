pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod rate_limit;
pub mod state;
pub mod upstream;
