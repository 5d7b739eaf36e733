//! HTTP request handlers: scrape endpoint, health check and landing page.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::{debug, error, warn};

use rbd_mirror_core::collector::MirrorCollector;
use rbd_mirror_core::config::is_valid_cluster_name;
use rbd_mirror_core::fetcher::StatusFetcher;

use crate::exposition::RegistrySink;

/// Collector shared read-only by every request.
pub(crate) type SharedState<F> = Arc<MirrorCollector<F>>;

const INDEX_HTML: &str = r#"<html>
<head><title>RBD Mirror Exporter</title></head>
<body>
<h1>RBD Mirror Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

pub(crate) fn router<F: StatusFetcher + 'static>(state: SharedState<F>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics::<F>))
        .with_state(state)
}

// ============================================================
// Landing page / health
// ============================================================

pub(crate) async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Metrics
// ============================================================

#[derive(Deserialize)]
pub(crate) struct MetricsQuery {
    /// Cluster to scrape instead of the configured default.
    cluster: Option<String>,
}

/// Runs one scrape. Collection failures still answer 200 with whatever
/// samples were emitted; only a bad `cluster` parameter is rejected.
pub(crate) async fn handle_metrics<F: StatusFetcher + 'static>(
    State(collector): State<SharedState<F>>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let cluster = query.cluster.as_deref();
    if let Some(name) = cluster
        && !is_valid_cluster_name(name)
    {
        warn!(cluster = name, "rejected scrape with invalid cluster name");
        return (StatusCode::BAD_REQUEST, "invalid cluster name\n").into_response();
    }

    let started = Instant::now();
    let mut sink = RegistrySink::new();
    let summary = collector.collect(cluster, &mut sink).await;

    debug!(
        pool = %collector.config().pool,
        cluster = ?cluster,
        outcome = ?summary.outcome,
        images = summary.images_seen,
        emitted = summary.images_emitted,
        ignored = summary.images_ignored,
        failed = summary.images_failed,
        samples = summary.samples,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scrape finished"
    );

    match sink.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
