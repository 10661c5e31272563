// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Messages pulled from the orders channel
// - Decode outcomes by event type and failure reason
// - Dispatch outcomes and latency per event type
// - Liveness of the consumption loop
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the agent
pub struct Metrics {
    registry: Registry,

    // Consumption Metrics
    pub events_received: IntCounter,
    pub events_decoded: IntCounterVec,
    pub decode_failures: IntCounterVec,

    // Dispatch Metrics
    pub events_dispatched: IntCounterVec,
    pub dispatch_failures: IntCounterVec,
    pub dispatch_duration: HistogramVec,

    // Loop Metrics
    pub agent_running: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_received = IntCounter::new(
            "order_events_received_total",
            "Total raw messages pulled from the orders channel",
        )?;
        registry.register(Box::new(events_received.clone()))?;

        let events_decoded = IntCounterVec::new(
            Opts::new("order_events_decoded_total", "Total messages decoded into order events"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_decoded.clone()))?;

        let decode_failures = IntCounterVec::new(
            Opts::new("order_events_decode_failures_total", "Total messages that could not be decoded"),
            &["reason"],
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let events_dispatched = IntCounterVec::new(
            Opts::new("order_events_dispatched_total", "Total order events dispatched successfully"),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(events_dispatched.clone()))?;

        let dispatch_failures = IntCounterVec::new(
            Opts::new("order_events_dispatch_failures_total", "Total order events dropped by the dispatcher"),
            &["event_type", "reason"],
        )?;
        registry.register(Box::new(dispatch_failures.clone()))?;

        let dispatch_duration = HistogramVec::new(
            HistogramOpts::new("order_events_dispatch_duration_seconds", "Fetch-mutate-persist duration per event")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["event_type"],
        )?;
        registry.register(Box::new(dispatch_duration.clone()))?;

        let agent_running = IntGauge::new(
            "order_event_agent_running",
            "Consumption loop liveness (0=Stopped, 1=Running)",
        )?;
        registry.register(Box::new(agent_running.clone()))?;

        Ok(Self {
            registry,
            events_received,
            events_decoded,
            decode_failures,
            events_dispatched,
            dispatch_failures,
            dispatch_duration,
            agent_running,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_received(&self, count: usize) {
        self.events_received.inc_by(count as u64);
    }

    /// Helper to record a decode outcome
    pub fn record_decoded(&self, event_type: &str) {
        self.events_decoded.with_label_values(&[event_type]).inc();
    }

    pub fn record_decode_failure(&self, reason: &str) {
        self.decode_failures.with_label_values(&[reason]).inc();
    }

    /// Helper to record a dispatch outcome; `outcome` is the Ack label or the failure reason
    pub fn record_dispatch(&self, event_type: &str, duration_secs: f64, outcome: Result<&str, &str>) {
        match outcome {
            Ok(ack) => self.events_dispatched.with_label_values(&[event_type, ack]).inc(),
            Err(reason) => self.dispatch_failures.with_label_values(&[event_type, reason]).inc(),
        }
        self.dispatch_duration.with_label_values(&[event_type]).observe(duration_secs);
    }

    pub fn set_running(&self, running: bool) {
        self.agent_running.set(running as i64);
    }
}
