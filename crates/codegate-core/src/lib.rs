//! Shared plumbing for codegate services: configuration loading, listener
//! binding, health probes, request tracing and log setup.

pub mod config;
pub mod health;
pub mod listener;
pub mod middleware;
pub mod serde;
pub mod tracing;
