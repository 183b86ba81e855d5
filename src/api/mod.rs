//! API layer
//!
//! HTTP handlers for:
//! - ActivityPub (for federation)
//! - WebFinger, host-meta and NodeInfo discovery
//! - Metrics (Prometheus)

mod activitypub;
pub mod metrics;
mod wellknown;

pub use activitypub::activitypub_router;
pub use metrics::{metrics_router, track_http_requests};
pub use wellknown::wellknown_router;
