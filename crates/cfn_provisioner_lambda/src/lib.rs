//! AWS-oriented adapters and handlers for the provisioning custom resources.
//!
//! This crate owns runtime integration details (the custom-resource lifecycle,
//! HTTP delivery, and the adapter traits the Lambda binaries implement with
//! AWS SDK clients) and exposes a single runtime module boundary for the
//! contract, storage key, archive, catalog and cluster primitives.

pub mod adapters;
pub mod handlers;
pub mod runtime;
pub mod telemetry;
