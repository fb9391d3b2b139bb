//! HTTP server library for Pilotfish.
//!
//! Exposes the router, shared state, and server metrics so integration
//! tests can drive the full API surface in-process.

pub mod api;
pub mod metrics;
pub mod state;
