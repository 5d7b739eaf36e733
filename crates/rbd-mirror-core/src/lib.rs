//! rbd-mirror-core - shared library for the RBD mirroring exporter.
//!
//! Provides:
//! - `fetcher`: invocation of the `rbd` CLI (real and mock)
//! - `collector`: per-scrape orchestration and payload parsing
//! - `schema`: the fixed table of exported gauge descriptors
//! - `sink`: the one-way channel samples are streamed into
//! - `config`: collector configuration

pub mod collector;
pub mod config;
pub mod fetcher;
pub mod schema;
pub mod sink;

/// Exporter version, shared by the binary's `--version` flag and startup log.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
