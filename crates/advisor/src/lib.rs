//! Fleet advisor HTTP service
//!
//! Exposes the router and configuration so integration tests can drive the
//! real API without binding a port.

pub mod api;
pub mod config;
