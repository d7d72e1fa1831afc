//! # genflow-router
//!
//! Task routing for Genflow.
//!
//! The [`RoutingTable`] maps (phase, task, doc type) to a primary
//! provider plus an optional fallback; it is immutable after load.
//! The [`TaskRouter`] resolves one task to a live provider, executes
//! it with a bounded timeout, and applies one level of fallback using
//! the resilience layer's decision function.

mod router;
mod table;

pub use router::TaskRouter;
pub use table::{RoutingEntry, RoutingTable};
