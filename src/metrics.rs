use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("relay_requests_total", "Total number of chat requests").unwrap();
    pub static ref UPSTREAM_ERRORS: Counter =
        register_counter!("relay_upstream_errors_total", "Upstream calls that did not succeed").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("relay_rate_limited_total", "Chat requests rejected by the daily quota").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "relay_upstream_latency_seconds",
        "Upstream call latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("relay_tracked_clients", "Clients with a usage record in memory").unwrap();
}
