/*!
 * Structured Tracing
 * Subscriber setup and per-vehicle spans using the tracing crate
 */

use crate::core::types::VehicleId;
use crate::runtime::RuntimeStats;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()
        .is_ok();

    if installed {
        info!("Structured tracing initialized");
    }
}

/// Span covering the whole life of one kernel vehicle
///
/// Events emitted by the dispatch loop and by user threads hosted on the
/// vehicle nest under it.
#[inline]
pub fn span_vehicle(vehicle: VehicleId) -> Span {
    span!(Level::DEBUG, "vehicle", vehicle)
}

/// Render a stats snapshot as a single JSON line for log shipping
pub fn stats_json(stats: &RuntimeStats) -> String {
    serde_json::to_string(stats).unwrap_or_else(|err| format!(r#"{{"error":"{}"}}"#, err))
}
