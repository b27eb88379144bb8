/*!
 * Monitoring
 * Tracing setup and spans shared by the runtime's vehicles
 */

mod tracer;

pub use tracer::{init_tracing, span_vehicle, stats_json};
