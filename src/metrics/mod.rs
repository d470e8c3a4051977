//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, Histogram, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_counter_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Turn metrics
    pub turns: CounterVec,
    pub turn_duration: HistogramVec,
    pub payload_tokens: HistogramVec,

    // Token budget metrics
    pub budget_remaining: Histogram,
    pub context_overflows: CounterVec,

    // Summarizer metrics
    pub summarizations: CounterVec,
    pub summarization_duration: Histogram,

    // Model metrics
    pub model_calls: CounterVec,
    pub model_call_duration: Histogram,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        // Turn metrics
        let turns = register_counter_vec_with_registry!(
            Opts::new("memory_turns_total", "Total conversation turns"),
            &["strategy", "status"],
            registry
        )?;

        let turn_duration = register_histogram_vec_with_registry!(
            "memory_turn_duration_seconds",
            "End-to-end turn duration in seconds",
            &["strategy"],
            registry
        )?;

        let payload_tokens = register_histogram_vec_with_registry!(
            "memory_payload_tokens",
            "Estimated tokens per context payload",
            &["strategy"],
            vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0],
            registry
        )?;

        // Token budget metrics
        let budget_remaining = register_histogram_with_registry!(
            "memory_budget_remaining_tokens",
            "Tokens left in the context budget after building a payload",
            registry
        )?;

        let context_overflows = register_counter_vec_with_registry!(
            Opts::new("memory_context_overflows_total", "Payloads exceeding the context budget"),
            &["strategy"],
            registry
        )?;

        // Summarizer metrics
        let summarizations = register_counter_vec_with_registry!(
            Opts::new("memory_summarizations_total", "Total summarizer runs"),
            &["status"],
            registry
        )?;

        let summarization_duration = register_histogram_with_registry!(
            "memory_summarization_duration_seconds",
            "Summarizer call duration in seconds",
            registry
        )?;

        // Model metrics
        let model_calls = register_counter_vec_with_registry!(
            Opts::new("memory_model_calls_total", "Total model calls"),
            &["status"],
            registry
        )?;

        let model_call_duration = register_histogram_with_registry!(
            "memory_model_call_duration_seconds",
            "Model call duration in seconds",
            registry
        )?;

        Ok(Self {
            registry,
            turns,
            turn_duration,
            payload_tokens,
            budget_remaining,
            context_overflows,
            summarizations,
            summarization_duration,
            model_calls,
            model_call_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished turn
    pub fn record_turn(&self, strategy: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.turns.with_label_values(&[strategy, status]).inc();
        self.turn_duration.with_label_values(&[strategy]).observe(seconds);
    }

    /// Record the size of a built payload against the context budget
    pub fn record_payload(&self, strategy: &str, tokens: usize, budget: usize) {
        self.payload_tokens
            .with_label_values(&[strategy])
            .observe(tokens as f64);
        self.budget_remaining
            .observe(budget.saturating_sub(tokens) as f64);
        if tokens > budget {
            self.context_overflows.with_label_values(&[strategy]).inc();
        }
    }

    /// Record a summarizer run
    pub fn record_summarization(&self, status: &str, seconds: f64) {
        self.summarizations.with_label_values(&[status]).inc();
        self.summarization_duration.observe(seconds);
    }

    /// Record a model call
    pub fn record_model_call(&self, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.model_calls.with_label_values(&[status]).inc();
        self.model_call_duration.observe(seconds);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Text exposition of the global registry
pub fn encode_text() -> String {
    METRICS.export_prometheus()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_payload_counts_overflow() {
        let metrics = Metrics::new().unwrap();
        metrics.record_payload("buffer", 50, 100);
        metrics.record_payload("buffer", 150, 100);
        assert_eq!(
            metrics.context_overflows.with_label_values(&["buffer"]).get(),
            1.0
        );
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_turn("sliding_window", true, 0.01);
        metrics.record_summarization("success", 0.2);
        let text = metrics.export_prometheus();
        assert!(text.contains("memory_turns_total"));
        assert!(text.contains("memory_summarizations_total"));
    }
}
