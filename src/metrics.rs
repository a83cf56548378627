use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static::lazy_static! {
    pub static ref REMOTE_BUILDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "graphlift_remote_builds_total", "Build attempts by outcome", &["outcome"]
    ).unwrap();
    pub static ref FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "graphlift_fallbacks_total", "Local fallbacks by failing stage", &["stage", "error"]
    ).unwrap();
    pub static ref STAGE_DURATION: HistogramVec = register_histogram_vec!(
        "graphlift_stage_duration_seconds", "Remote build stage duration", &["stage"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]
    ).unwrap();
    pub static ref BYTES_TRANSFERRED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "graphlift_bytes_transferred_total", "Bytes moved to or from staging", &["direction"]
    ).unwrap();
    pub static ref STATUS_POLLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "graphlift_status_polls_total", "Job status calls", &["result"]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&REMOTE_BUILDS_TOTAL);
    lazy_static::initialize(&FALLBACKS_TOTAL);
    lazy_static::initialize(&STAGE_DURATION);
    lazy_static::initialize(&BYTES_TRANSFERRED_TOTAL);
    lazy_static::initialize(&STATUS_POLLS_TOTAL);
}

/// Text exposition of the default registry.
pub fn render() -> String {
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buf).unwrap_or_default()
}
