//! Object store adapter (cAdapter)
//!
//! Submodules:
//! - `client`: the capability trait every backend implements plus its value types
//! - `s3`: S3-compatible adapter built on `aws-sdk-s3`
//! - `localfs`: directory-backed store, keys are relative file paths
//! - `memory`: in-process store with call counters, used by tests and demos
//!
//! Adapters translate backend responses into the crate's error taxonomy:
//! a missing key is `Error::NotFound`, any other non-success status is
//! `Error::BackendStatus`. No adapter retries a failed request.
pub mod client;
pub mod localfs;
pub mod memory;
pub mod s3;
