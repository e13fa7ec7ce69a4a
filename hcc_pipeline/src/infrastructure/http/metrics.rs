//! # Gateway Metrics
//!
//! The handful of Prometheus counters that fall out naturally from request
//! handling, mirroring the teacher crate's own use of `prometheus` for
//! observability (metrics beyond this are out of scope, §1).

use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use hcc_domain::HccError;

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Arc<Registry>,
    documents_uploaded_total: IntCounter,
    documents_downloaded_total: IntCounter,
    documents_reprocessed_total: IntCounter,
    documents_deleted_total: IntCounter,
    requests_failed_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, HccError> {
        let registry = Registry::new();

        let documents_uploaded_total =
            IntCounter::with_opts(Opts::new("documents_uploaded_total", "Total documents accepted by the gateway").namespace("hcc_gateway"))
                .map_err(|e| HccError::Configuration(format!("failed to create documents_uploaded_total metric: {e}")))?;
        let documents_downloaded_total =
            IntCounter::with_opts(Opts::new("documents_downloaded_total", "Total document downloads served").namespace("hcc_gateway"))
                .map_err(|e| HccError::Configuration(format!("failed to create documents_downloaded_total metric: {e}")))?;
        let documents_reprocessed_total =
            IntCounter::with_opts(Opts::new("documents_reprocessed_total", "Total reprocess requests accepted").namespace("hcc_gateway"))
                .map_err(|e| HccError::Configuration(format!("failed to create documents_reprocessed_total metric: {e}")))?;
        let documents_deleted_total =
            IntCounter::with_opts(Opts::new("documents_deleted_total", "Total documents deleted").namespace("hcc_gateway"))
                .map_err(|e| HccError::Configuration(format!("failed to create documents_deleted_total metric: {e}")))?;
        let requests_failed_total = IntCounterVec::new(
            Opts::new("requests_failed_total", "Total gateway requests that returned an error").namespace("hcc_gateway"),
            &["route"],
        )
        .map_err(|e| HccError::Configuration(format!("failed to create requests_failed_total metric: {e}")))?;

        registry
            .register(Box::new(documents_uploaded_total.clone()))
            .map_err(|e| HccError::Configuration(format!("failed to register documents_uploaded_total metric: {e}")))?;
        registry
            .register(Box::new(documents_downloaded_total.clone()))
            .map_err(|e| HccError::Configuration(format!("failed to register documents_downloaded_total metric: {e}")))?;
        registry
            .register(Box::new(documents_reprocessed_total.clone()))
            .map_err(|e| HccError::Configuration(format!("failed to register documents_reprocessed_total metric: {e}")))?;
        registry
            .register(Box::new(documents_deleted_total.clone()))
            .map_err(|e| HccError::Configuration(format!("failed to register documents_deleted_total metric: {e}")))?;
        registry
            .register(Box::new(requests_failed_total.clone()))
            .map_err(|e| HccError::Configuration(format!("failed to register requests_failed_total metric: {e}")))?;

        Ok(Self {
            registry: Arc::new(registry),
            documents_uploaded_total,
            documents_downloaded_total,
            documents_reprocessed_total,
            documents_deleted_total,
            requests_failed_total,
        })
    }

    pub fn record_upload(&self) {
        self.documents_uploaded_total.inc();
    }

    pub fn record_download(&self) {
        self.documents_downloaded_total.inc();
    }

    pub fn record_reprocess(&self) {
        self.documents_reprocessed_total.inc();
    }

    pub fn record_delete(&self) {
        self.documents_deleted_total.inc();
    }

    pub fn record_failure(&self, route: &str) {
        self.requests_failed_total.with_label_values(&[route]).inc();
    }

    pub fn encode(&self) -> Result<String, HccError> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| HccError::Configuration(format!("failed to encode metrics: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_counters() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_upload();
        metrics.record_failure("upload");
        let text = metrics.encode().unwrap();
        assert!(text.contains("hcc_gateway_documents_uploaded_total"));
        assert!(text.contains("hcc_gateway_requests_failed_total"));
    }
}
