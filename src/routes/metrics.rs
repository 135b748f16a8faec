use axum::extract::State;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the queue metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, metrics_exporter_prometheus::BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "generation_jobs_submitted_total",
        "Generation jobs accepted into the queue"
    );
    metrics::describe_counter!(
        "generation_jobs_rejected_total",
        "Generation jobs refused because the queue was full or closed"
    );
    metrics::describe_counter!(
        "generation_jobs_completed_total",
        "Generation jobs that reached the completed state"
    );
    metrics::describe_counter!(
        "generation_jobs_failed_total",
        "Generation jobs that reached the failed state"
    );
    metrics::describe_counter!(
        "generation_settlement_failures_total",
        "Completed generations whose credit charge could not be recorded"
    );
    metrics::describe_gauge!("generation_queue_depth", "Jobs currently buffered in the queue");
    metrics::describe_histogram!(
        "generation_pipeline_seconds",
        "Time a worker spends running one job"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
