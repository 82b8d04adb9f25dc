//! Cluster orchestrator client.
//!
//! The scheduler never tracks workers itself — pod labels on the
//! orchestrator are the only job-tracking store. This crate owns that
//! seam: the [`ClusterClient`] trait plus the worker spec/status types
//! that cross it, an HTTP implementation for real clusters, and an
//! in-memory implementation for tests and local runs.

pub mod client;
pub mod http;
pub mod memory;
pub mod types;

pub use client::ClusterClient;
pub use http::HttpClusterClient;
pub use memory::MemoryCluster;
pub use types::{labels, selector, WorkerPhase, WorkerSpec, WorkerStatus};
