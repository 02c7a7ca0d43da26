use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, IntCounter, IntCounterVec, register_gauge, register_histogram,
    register_int_counter, register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("vitals_requests_total", "Total number of vitals submissions").unwrap();
    pub static ref RATE_LIMITED: IntCounter =
        register_int_counter!("vitals_rate_limited_total", "Submissions rejected by the rate limiter").unwrap();
    pub static ref VALIDATION_FAILURES: IntCounter =
        register_int_counter!("vitals_validation_failures_total", "Submissions rejected as bad requests").unwrap();
    pub static ref INTERNAL_ERRORS: IntCounter =
        register_int_counter!("vitals_internal_errors_total", "Submissions that failed with an internal error").unwrap();
    pub static ref ACCEPTED: IntCounterVec = register_int_counter_vec!(
        "vitals_accepted_total",
        "Accepted metrics by name",
        &["metric"]
    )
    .unwrap();
    pub static ref ESCALATIONS: IntCounter =
        register_int_counter!("vitals_escalations_total", "Error reports queued for the monitor").unwrap();
    pub static ref ESCALATIONS_DROPPED: IntCounter =
        register_int_counter!("vitals_escalations_dropped_total", "Error reports dropped on a full or closed queue").unwrap();
    pub static ref ESCALATION_FAILURES: IntCounter =
        register_int_counter!("vitals_escalation_failures_total", "Error reports the monitor failed to deliver").unwrap();
    pub static ref RATE_LIMIT_CLIENTS: Gauge =
        register_gauge!("vitals_rate_limit_clients", "Client ids currently tracked by the rate limiter").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "vitals_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}
