//! snapverify: snapshot/restore consistency harness for filesystem services.
//!
//! Mounts a filesystem service, drives workloads through the mount, saves and
//! restores snapshots with external tools, and checks that every restore brings
//! back exactly the signature captured at save time. Cleanup runs on every exit
//! path, interrupts included.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod interrupt;
pub mod logging;
pub mod oracle;
pub mod quiesce;
pub mod report;
pub mod snapshot;
pub mod stress;
pub mod supervisor;
pub mod types;
pub mod verifier;

pub use error::HarnessError;
pub use harness::Harness;
