//! Shared custom-resource domain primitives.
//!
//! This crate owns the CloudFormation request/response contract, typed
//! resource properties, storage keys, archive extraction and the small pieces
//! of provisioning logic that do not talk to AWS. It intentionally excludes
//! AWS SDK and Lambda runtime concerns.

pub mod archive;
pub mod catalog;
pub mod cluster;
pub mod contract;
pub mod storage_keys;
