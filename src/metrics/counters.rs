//! Counter metrics

/// Record the outcome of one connection attempt (`success`, `transient`, `fatal`)
pub fn connection_attempt(outcome: &'static str) {
    metrics::counter!("dbprobe_connection_attempts_total", "outcome" => outcome).increment(1);
}

/// Record a completed diagnostic query (`ok` or `error`)
pub fn query_completed(query: &str, status: &'static str) {
    metrics::counter!(
        "dbprobe_query_total",
        "query" => query.to_owned(),
        "status" => status
    )
    .increment(1);
}
