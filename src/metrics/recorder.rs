//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording resolver metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records the terminal outcome of a resolver operation.
    fn record_operation(&self, operation: &str, result: &str);

    /// Records how long a resolver operation took end to end.
    fn record_operation_duration(&self, operation: &str, result: &str, duration_secs: f64);

    /// Records a single call to the primary or legacy provider.
    fn record_provider_attempt(&self, operation: &str, role: &str, provider_name: &str, result: &str);

    /// Records the duration of a single provider call.
    fn record_provider_duration(&self, operation: &str, role: &str, duration_secs: f64);

    /// Records that an operation fell back to the legacy provider.
    fn record_fallback(&self, operation: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    operations_total: CounterVec,
    operation_duration_seconds: HistogramVec,

    provider_attempts_total: CounterVec,
    provider_duration_seconds: HistogramVec,

    fallbacks_total: CounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let operations_total = register_counter_vec_with_registry!(
            Opts::new(
                "auth_operations_total",
                "Terminal outcomes of authentication operations"
            ),
            &["operation", "result"],
            registry.clone()
        )
        .expect("Failed to register auth_operations_total");

        let operation_duration_seconds = register_histogram_vec_with_registry!(
            "auth_operation_duration_seconds",
            "Authentication operation duration in seconds",
            &["operation", "result"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register auth_operation_duration_seconds");

        let provider_attempts_total = register_counter_vec_with_registry!(
            Opts::new(
                "auth_provider_attempts_total",
                "Calls made to each identity provider"
            ),
            &["operation", "role", "provider_name", "result"],
            registry.clone()
        )
        .expect("Failed to register auth_provider_attempts_total");

        let provider_duration_seconds = register_histogram_vec_with_registry!(
            "auth_provider_duration_seconds",
            "Identity provider call duration in seconds",
            &["operation", "role"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            registry.clone()
        )
        .expect("Failed to register auth_provider_duration_seconds");

        let fallbacks_total = register_counter_vec_with_registry!(
            Opts::new(
                "auth_fallbacks_total",
                "Operations retried on the legacy provider"
            ),
            &["operation"],
            registry.clone()
        )
        .expect("Failed to register auth_fallbacks_total");

        Metrics {
            registry,
            operations_total,
            operation_duration_seconds,
            provider_attempts_total,
            provider_duration_seconds,
            fallbacks_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl MetricsRecorder for Metrics {
    fn record_operation(&self, operation: &str, result: &str) {
        self.operations_total
            .with_label_values(&[operation, result])
            .inc();
    }

    fn record_operation_duration(&self, operation: &str, result: &str, duration_secs: f64) {
        self.operation_duration_seconds
            .with_label_values(&[operation, result])
            .observe(duration_secs);
    }

    fn record_provider_attempt(&self, operation: &str, role: &str, provider_name: &str, result: &str) {
        self.provider_attempts_total
            .with_label_values(&[operation, role, provider_name, result])
            .inc();
    }

    fn record_provider_duration(&self, operation: &str, role: &str, duration_secs: f64) {
        self.provider_duration_seconds
            .with_label_values(&[operation, role])
            .observe(duration_secs);
    }

    fn record_fallback(&self, operation: &str) {
        self.fallbacks_total.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new();
        metrics.record_provider_attempt("sign_in", "primary", "supabase", "failure");
        metrics.record_fallback("sign_in");
        metrics.record_operation("sign_in", "success");

        let text = metrics.render();
        assert!(text.contains("auth_fallbacks_total{operation=\"sign_in\"} 1"));
        assert!(text.contains("auth_provider_attempts_total"));
        assert!(text.contains("auth_operations_total"));
    }
}
