//! Metrics collection and exposition.
//!
//! # Metrics
//! - `node_agent_job_runs_total` (counter): job runs by job, outcome
//! - `node_agent_startup_total` (counter): controller starts by outcome
//! - `node_agent_users` (gauge): cohort size by tag
//! - `node_agent_limiters` (gauge): registered limiters

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_job_run(job: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    ::metrics::counter!("node_agent_job_runs_total", "job" => job, "outcome" => outcome).increment(1);
}

pub fn record_startup(step: &'static str) {
    ::metrics::counter!("node_agent_startup_total", "outcome" => step).increment(1);
}

pub fn record_users(tag: &str, count: usize) {
    ::metrics::gauge!("node_agent_users", "tag" => tag.to_string()).set(count as f64);
}

pub fn record_limiters(count: usize) {
    ::metrics::gauge!("node_agent_limiters").set(count as f64);
}
