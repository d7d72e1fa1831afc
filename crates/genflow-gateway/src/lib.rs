//! # genflow-gateway
//!
//! Provider gateway for Genflow.
//!
//! The pipeline core talks to text-generation backends only through
//! the [`Provider`] trait: one call in, one normalized response or a
//! classified [`GatewayError`] out. Concrete transports live behind
//! the trait; the router never depends on a concrete provider type.

mod http;
mod provider;
mod registry;
mod scripted;

pub use http::HttpProvider;
pub use provider::{GatewayError, GatewayRequest, GatewayResponse, Provider};
pub use registry::ProviderRegistry;
pub use scripted::ScriptedProvider;
