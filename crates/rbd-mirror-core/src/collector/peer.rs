//! Stats embedded in a peer site's free-text description.
//!
//! Snapshot-mode peers describe themselves as
//! `replaying, {"bytes_per_second":0.0,"bytes_per_snapshot":...}`: a state
//! word followed by a JSON object. The object starts at the first `{`;
//! anything after the object is ignored.

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use super::error::CollectError;
use super::pool::PeerSite;
use super::status::SnapshotStatus;

/// Layout of `last_update` in peer site status.
pub const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
struct PeerStatsDoc {
    #[serde(default)]
    bytes_per_snapshot: f64,
    #[serde(default)]
    last_snapshot_bytes: f64,
    #[serde(default)]
    last_snapshot_sync_seconds: f64,
}

/// Returns the description from its first `{` onwards.
pub fn stats_fragment(description: &str) -> Option<&str> {
    description.find('{').map(|idx| &description[idx..])
}

/// Replication health heuristic: any state mentioning `replaying` is healthy.
pub fn is_replaying(state: &str) -> bool {
    state.contains("replaying")
}

/// Parses `last_update` into unix seconds, treating it as UTC.
pub fn parse_last_update(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text.trim(), LAST_UPDATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Extracts snapshot stats for one image from its first peer site.
pub fn parse_peer_stats(peer: Option<&PeerSite>) -> Result<SnapshotStatus, CollectError> {
    let peer = peer.ok_or(CollectError::NoPeerSite)?;
    let fragment = peer
        .description
        .as_deref()
        .and_then(stats_fragment)
        .ok_or(CollectError::NoStatsFragment)?;

    let stats = serde_json::Deserializer::from_str(fragment)
        .into_iter::<PeerStatsDoc>()
        .next()
        .ok_or(CollectError::NoStatsFragment)?
        .map_err(|e| CollectError::decode("peer description", e))?;

    let last_update = match peer.last_update.as_deref() {
        Some(text) => {
            let parsed = parse_last_update(text);
            if parsed.is_none() {
                debug!(last_update = text, "unparseable last_update");
            }
            parsed
        }
        None => None,
    };

    Ok(SnapshotStatus {
        sync_percent: None,
        seconds_until_synced: None,
        bytes_per_snapshot: stats.bytes_per_snapshot,
        last_snapshot_bytes: stats.last_snapshot_bytes,
        last_snapshot_sync_seconds: stats.last_snapshot_sync_seconds,
        replication_state: peer.state.clone(),
        last_update,
    })
}
