//! Per-image status payloads.
//!
//! `rbd mirror image status <pool>/<image> --format json` reports either a
//! `replaying_status` (journal mode) or a `snapshot_status` (snapshot mode)
//! object. The image's own `mode` field decides which one is read; the other
//! is never looked at.

use serde::Deserialize;

use super::error::CollectError;
use super::pool::ImageMode;

/// Journal replay progress.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplayingStatus {
    #[serde(default)]
    pub bytes_per_second: f64,
    #[serde(default)]
    pub entries_behind_primary: f64,
    #[serde(default)]
    pub entries_per_second: f64,
    #[serde(default)]
    pub seconds_until_synced: f64,
}

/// Snapshot sync progress.
///
/// `sync_percent` and `seconds_until_synced` are only reported by the
/// per-image status call; `replication_state` and `last_update` only by the
/// peer-description layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotStatus {
    pub sync_percent: Option<f64>,
    pub seconds_until_synced: Option<f64>,
    pub bytes_per_snapshot: f64,
    pub last_snapshot_bytes: f64,
    pub last_snapshot_sync_seconds: f64,
    pub replication_state: Option<String>,
    /// Unix seconds.
    pub last_update: Option<i64>,
}

/// Status of one image, resolved once by its mode.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusSnapshot {
    Replaying(ReplayingStatus),
    Snapshot(SnapshotStatus),
    /// Mode without metrics (e.g. `disabled`); skipped.
    Unknown(String),
}

#[derive(Deserialize)]
struct SnapshotStatusDoc {
    #[serde(default, alias = "syncing_percent")]
    sync_percent: Option<f64>,
    #[serde(default)]
    seconds_until_synced: Option<f64>,
    #[serde(default)]
    bytes_per_snapshot: f64,
    #[serde(default)]
    last_snapshot_bytes: f64,
    #[serde(default)]
    last_snapshot_sync_seconds: f64,
}

impl From<SnapshotStatusDoc> for SnapshotStatus {
    fn from(doc: SnapshotStatusDoc) -> Self {
        Self {
            sync_percent: doc.sync_percent,
            seconds_until_synced: doc.seconds_until_synced,
            bytes_per_snapshot: doc.bytes_per_snapshot,
            last_snapshot_bytes: doc.last_snapshot_bytes,
            last_snapshot_sync_seconds: doc.last_snapshot_sync_seconds,
            replication_state: None,
            last_update: None,
        }
    }
}

#[derive(Deserialize)]
struct ImageStatusDoc {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    replaying_status: Option<ReplayingStatus>,
    #[serde(default)]
    snapshot_status: Option<SnapshotStatusDoc>,
}

/// Parses per-image status output.
///
/// `listed_mode` (from the pool listing) is used only when the payload
/// carries no `mode` of its own.
pub fn parse_image_status(
    raw: &[u8],
    listed_mode: Option<&ImageMode>,
) -> Result<StatusSnapshot, CollectError> {
    let doc: ImageStatusDoc =
        serde_json::from_slice(raw).map_err(|e| CollectError::decode("image status", e))?;

    let mode = match doc.mode.as_deref() {
        Some(m) => ImageMode::parse(m),
        None => listed_mode
            .cloned()
            .unwrap_or_else(|| ImageMode::Other(String::new())),
    };

    match mode {
        ImageMode::Journal => doc
            .replaying_status
            .map(StatusSnapshot::Replaying)
            .ok_or(CollectError::MissingStatus {
                mode: "journal",
                field: "replaying_status",
            }),
        ImageMode::Snapshot => doc
            .snapshot_status
            .map(|s| StatusSnapshot::Snapshot(s.into()))
            .ok_or(CollectError::MissingStatus {
                mode: "snapshot",
                field: "snapshot_status",
            }),
        other => Ok(StatusSnapshot::Unknown(other.as_str().to_string())),
    }
}
