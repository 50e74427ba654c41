// Prometheus metrics definitions for the bingo backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Overwrite confirmations awaiting an answer.
    pub static ref PENDING_CONFIRMATIONS: IntGauge = IntGauge::new(
        "bingo_pending_confirmations",
        "Overwrite confirmations awaiting an answer",
    )
    .unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total bingo sheets created (including confirmed overwrites).
    pub static ref BOARDS_CREATED_TOTAL: IntCounter =
        IntCounter::new("bingo_boards_created_total", "Total bingo sheets created").unwrap();

    /// Total squares crossed off.
    pub static ref CELLS_MARKED_TOTAL: IntCounter =
        IntCounter::new("bingo_cells_marked_total", "Total squares crossed off").unwrap();

    /// Total squares uncrossed.
    pub static ref CELLS_UNMARKED_TOTAL: IntCounter =
        IntCounter::new("bingo_cells_unmarked_total", "Total squares uncrossed").unwrap();

    /// Total bingos announced.
    pub static ref BINGOS_DECLARED_TOTAL: IntCounter =
        IntCounter::new("bingo_bingos_declared_total", "Total bingos announced").unwrap();

    /// Total clue pool replacements (set + reset).
    pub static ref POOL_UPDATES_TOTAL: IntCounter =
        IntCounter::new("bingo_pool_updates_total", "Total clue pool replacements").unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Sheet render duration in seconds.
    pub static ref SHEET_RENDER_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("bingo_sheet_render_seconds", "Sheet render duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PENDING_CONFIRMATIONS.clone()),
        Box::new(BOARDS_CREATED_TOTAL.clone()),
        Box::new(CELLS_MARKED_TOTAL.clone()),
        Box::new(CELLS_UNMARKED_TOTAL.clone()),
        Box::new(BINGOS_DECLARED_TOTAL.clone()),
        Box::new(POOL_UPDATES_TOTAL.clone()),
        Box::new(SHEET_RENDER_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("bingo_"));
    }

    #[test]
    fn test_metric_increments() {
        BOARDS_CREATED_TOTAL.inc();
        CELLS_MARKED_TOTAL.inc();
        CELLS_UNMARKED_TOTAL.inc();
        BINGOS_DECLARED_TOTAL.inc();
        POOL_UPDATES_TOTAL.inc();
        SHEET_RENDER_SECONDS.observe(0.01);

        PENDING_CONFIRMATIONS.set(2);
        assert_eq!(PENDING_CONFIRMATIONS.get(), 2);
        PENDING_CONFIRMATIONS.set(0);
        assert_eq!(PENDING_CONFIRMATIONS.get(), 0);
    }
}
