//! Prometheus metrics collection

use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Histogram,
    HistogramVec,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub struct Metrics {
    pub requests_total: CounterVec,
    pub compress_duration: Histogram,
    pub artifact_bytes: HistogramVec,
    pub housekeeping_removed: CounterVec,
    pub errors_total: CounterVec,
}

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| Metrics {
            requests_total: register_counter_vec!(
                "texture_press_requests_total",
                "Compression requests by outcome",
                &["status"]
            )
            .expect("register texture_press_requests_total"),
            compress_duration: register_histogram!(
                "texture_press_compress_duration_seconds",
                "Wall time of a compression request",
                vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]
            )
            .expect("register texture_press_compress_duration_seconds"),
            artifact_bytes: register_histogram_vec!(
                "texture_press_artifact_bytes",
                "Size of produced textures in bytes",
                &["type"],
                vec![
                    1024.0,
                    16.0 * 1024.0,
                    256.0 * 1024.0,
                    1024.0 * 1024.0,
                    16.0 * 1024.0 * 1024.0,
                    64.0 * 1024.0 * 1024.0,
                ]
            )
            .expect("register texture_press_artifact_bytes"),
            housekeeping_removed: register_counter_vec!(
                "texture_press_housekeeping_removed_total",
                "Files and directories removed by sweeps",
                &["area"]
            )
            .expect("register texture_press_housekeeping_removed_total"),
            errors_total: register_counter_vec!(
                "texture_press_errors_total",
                "Failed compression requests by error kind",
                &["kind"]
            )
            .expect("register texture_press_errors_total"),
        })
    }

    pub fn record_success(&self, duration_secs: f64) {
        self.requests_total.with_label_values(&["success"]).inc();
        self.compress_duration.observe(duration_secs);
    }

    pub fn record_failure(&self, kind: &str, duration_secs: f64) {
        self.requests_total.with_label_values(&["failed"]).inc();
        self.errors_total.with_label_values(&[kind]).inc();
        self.compress_duration.observe(duration_secs);
    }

    pub fn record_artifact(&self, texture_type: &str, bytes: u64) {
        self.artifact_bytes
            .with_label_values(&[texture_type])
            .observe(bytes as f64);
    }

    pub fn record_housekeeping(&self, area: &str, removed: usize) {
        if removed > 0 {
            self.housekeeping_removed
                .with_label_values(&[area])
                .inc_by(removed as f64);
        }
    }
}

pub fn get_metrics() -> &'static Metrics {
    Metrics::init()
}
