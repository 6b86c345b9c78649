//! Metric instrument factories for cardfx.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the versioned `cardfx` scope.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for cardfx instruments.
fn meter() -> Meter {
    opentelemetry::global::meter_with_scope(super::scope())
}

/// Counter: animation events accepted by the sequencer.
/// Labels: `kind`.
pub fn events_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("cardfx.events.enqueued")
        .with_description("Number of animation events enqueued")
        .build()
}

/// Counter: animation events whose playback finished.
/// Labels: `kind`, `outcome`.
pub fn events_played() -> Counter<u64> {
    meter()
        .u64_counter("cardfx.events.played")
        .with_description("Number of animation events played to completion")
        .build()
}

/// Counter: skipped, timed-out or abandoned effects.
/// Labels: `kind`, `outcome`.
pub fn soft_failures() -> Counter<u64> {
    meter()
        .u64_counter("cardfx.events.soft_failures")
        .with_description("Effects that resolved without playing")
        .build()
}

/// Histogram: playback duration in milliseconds.
/// Labels: `kind`.
pub fn playback_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("cardfx.playback.duration_ms")
        .with_description("Time from dequeue to completion signal")
        .with_unit("ms")
        .build()
}
