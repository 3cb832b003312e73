//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with tracing fields, never interpolated strings
//! - Request ID flows to peers with the forwarded request
//! - Metrics calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
