//! RBD mirroring metrics collector.
//!
//! Turns `rbd` JSON output into gauge samples, once per scrape.
//!
//! # Architecture
//!
//! ```text
//!   mirror pool status <pool>
//!            │
//!   pool::parse_pool_status ──▶ Vec<ResourceEntry>
//!            │
//!     ┌──────┴──────────────────────┐
//!     │ ModeList                    │ PeerDescription
//!     ▼                             ▼
//!   mirror image status         peer::parse_peer_stats
//!   status::parse_image_status      │
//!     └──────┬──────────────────────┘
//!            ▼
//!     StatusSnapshot ──▶ MetricSchema ──▶ MetricSink
//! ```
//!
//! # Usage
//!
//! ```
//! use rbd_mirror_core::collector::MirrorCollector;
//! use rbd_mirror_core::config::CollectorConfig;
//! use rbd_mirror_core::fetcher::MockFetcher;
//! use rbd_mirror_core::sink::MetricSample;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let fetcher = MockFetcher::new().json(
//!     ["mirror", "pool", "status", "rbd", "--verbose", "--format", "json"],
//!     r#"{"images":[]}"#,
//! );
//! let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));
//! let mut samples: Vec<MetricSample> = Vec::new();
//! let summary = collector.collect(None, &mut samples).await;
//! assert_eq!(summary.samples, 0);
//! # });
//! ```

#[allow(clippy::module_inception)]
mod collector;
mod error;
pub mod peer;
pub mod pool;
pub mod status;

pub use collector::{MirrorCollector, ScrapeOutcome, ScrapeSummary};
pub use error::CollectError;
pub use pool::{ImageMode, PeerSite, PoolStatus, ResourceEntry};
pub use status::{ReplayingStatus, SnapshotStatus, StatusSnapshot};

/// Bytes per mebibyte; byte-valued fields are exported in MiB.
pub const BYTES_PER_MIB: f64 = 1_048_576.0;
