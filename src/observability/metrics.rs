use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    pub owners_created: IntCounter,
    pub owners_deleted: IntCounter,
    pub pets_created: IntCounter,
    pub pets_updated: IntCounter,
    pub pets_deleted: IntCounter,
    pub request_errors: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let owners_created = IntCounter::new("owners_created_total", "Owners created").unwrap();
        let owners_deleted = IntCounter::new("owners_deleted_total", "Owners deleted").unwrap();
        let pets_created = IntCounter::new("pets_created_total", "Pets created").unwrap();
        let pets_updated = IntCounter::new("pets_updated_total", "Pets updated").unwrap();
        let pets_deleted = IntCounter::new("pets_deleted_total", "Pets deleted").unwrap();
        let request_errors = IntCounterVec::new(
            Opts::new("request_errors_total", "Failed requests by error code"),
            &["code"],
        )
        .unwrap();
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "Request handling time in seconds"),
            &["method", "status"],
        )
        .unwrap();

        registry.register(Box::new(owners_created.clone())).unwrap();
        registry.register(Box::new(owners_deleted.clone())).unwrap();
        registry.register(Box::new(pets_created.clone())).unwrap();
        registry.register(Box::new(pets_updated.clone())).unwrap();
        registry.register(Box::new(pets_deleted.clone())).unwrap();
        registry.register(Box::new(request_errors.clone())).unwrap();
        registry.register(Box::new(request_duration_seconds.clone())).unwrap();

        Self {
            registry,
            owners_created,
            owners_deleted,
            pets_created,
            pets_updated,
            pets_deleted,
            request_errors,
            request_duration_seconds,
        }
    }

    pub fn record_error(&self, code: &str) {
        self.request_errors.with_label_values(&[code]).inc();
    }

    pub fn observe_request(&self, method: &str, status: u16, seconds: f64) {
        let status = status.to_string();
        self.request_duration_seconds
            .with_label_values(&[method, status.as_str()])
            .observe(seconds);
    }

    pub fn encode(&self) -> Vec<u8> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or(());
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn errors_are_counted_by_code() {
        let m = Metrics::new();
        m.record_error(ApiError::not_found("Pet not found.").code());
        m.record_error(ApiError::validation("bad").code());
        assert_eq!(m.request_errors.with_label_values(&["NOT_FOUND"]).get(), 1);
        let text = String::from_utf8(m.encode()).unwrap();
        assert!(text.contains("request_errors_total"));
    }
}
