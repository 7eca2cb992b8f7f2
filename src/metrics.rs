use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REGISTRATIONS_TOTAL: Counter =
        register_counter!("relay_registrations_total", "Total URLs registered").unwrap();
    pub static ref REDIRECTS_TOTAL: Counter =
        register_counter!("relay_redirects_total", "Total redirect pages served").unwrap();
    pub static ref NOT_FOUND_TOTAL: Counter =
        register_counter!("relay_not_found_total", "Redirects for unknown or expired tokens").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("relay_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "relay_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref STORED_TOKENS: Gauge =
        register_gauge!("relay_stored_tokens", "Current number of stored tokens").unwrap();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
