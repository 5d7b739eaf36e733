//! Fixed table of exported gauge descriptors.
//!
//! Built once when the collector is constructed and shared read-only by
//! every scrape. Which descriptors exist depends on the configured
//! [`PayloadShape`]; label names depend on whether cluster labelling is on.

use crate::config::PayloadShape;

/// Every gauge the exporter can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    JournalSpeed,
    JournalEntriesBehind,
    JournalEntriesPerSec,
    JournalSecondsUntilSynced,
    SnapshotSyncPercent,
    SnapshotSpeed,
    SnapshotSecondsUntilSynced,
    SnapshotBytesPerSnapshot,
    SnapshotLastSnapshotBytes,
    SnapshotLastSnapshotSyncSeconds,
    SnapshotReplicationState,
    SnapshotLastUpdateTimestamp,
}

impl MetricKind {
    pub const ALL: [MetricKind; 12] = [
        MetricKind::JournalSpeed,
        MetricKind::JournalEntriesBehind,
        MetricKind::JournalEntriesPerSec,
        MetricKind::JournalSecondsUntilSynced,
        MetricKind::SnapshotSyncPercent,
        MetricKind::SnapshotSpeed,
        MetricKind::SnapshotSecondsUntilSynced,
        MetricKind::SnapshotBytesPerSnapshot,
        MetricKind::SnapshotLastSnapshotBytes,
        MetricKind::SnapshotLastSnapshotSyncSeconds,
        MetricKind::SnapshotReplicationState,
        MetricKind::SnapshotLastUpdateTimestamp,
    ];

    /// Metric name without the configurable prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            MetricKind::JournalSpeed => "journal_speed_mib_per_sec",
            MetricKind::JournalEntriesBehind => "journal_entries_behind_primary",
            MetricKind::JournalEntriesPerSec => "journal_entries_per_sec",
            MetricKind::JournalSecondsUntilSynced => "journal_seconds_until_synced",
            MetricKind::SnapshotSyncPercent => "snapshot_sync_percent",
            MetricKind::SnapshotSpeed => "snapshot_speed_mib_per_sec",
            MetricKind::SnapshotSecondsUntilSynced => "snapshot_seconds_until_synced",
            MetricKind::SnapshotBytesPerSnapshot => "snapshot_bytes_per_snapshot_mib",
            MetricKind::SnapshotLastSnapshotBytes => "snapshot_last_snapshot_bytes_mib",
            MetricKind::SnapshotLastSnapshotSyncSeconds => "snapshot_last_snapshot_sync_seconds",
            MetricKind::SnapshotReplicationState => "snapshot_replication_state",
            MetricKind::SnapshotLastUpdateTimestamp => "snapshot_last_update_timestamp",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            MetricKind::JournalSpeed => "Journal replay speed (MiB/s)",
            MetricKind::JournalEntriesBehind => "Journal entries behind primary",
            MetricKind::JournalEntriesPerSec => "Journal entries replayed per second",
            MetricKind::JournalSecondsUntilSynced => "Estimated seconds until journal is synced",
            MetricKind::SnapshotSyncPercent => "Snapshot sync progress (%)",
            MetricKind::SnapshotSpeed => "Snapshot sync speed (MiB/s)",
            MetricKind::SnapshotSecondsUntilSynced => "Estimated seconds until snapshot is synced",
            MetricKind::SnapshotBytesPerSnapshot => "Bytes per snapshot (MiB)",
            MetricKind::SnapshotLastSnapshotBytes => "Last snapshot size transferred (MiB)",
            MetricKind::SnapshotLastSnapshotSyncSeconds => "Duration of last snapshot sync (s)",
            MetricKind::SnapshotReplicationState => "1 if the peer site reports replaying, else 0",
            MetricKind::SnapshotLastUpdateTimestamp => "Last peer status update (unix seconds)",
        }
    }

    /// Present when images are listed with an explicit mode.
    fn in_mode_list_family(self) -> bool {
        !matches!(
            self,
            MetricKind::SnapshotReplicationState | MetricKind::SnapshotLastUpdateTimestamp
        )
    }

    /// Present when stats come from the peer-site description.
    fn in_peer_family(self) -> bool {
        matches!(
            self,
            MetricKind::SnapshotSpeed
                | MetricKind::SnapshotBytesPerSnapshot
                | MetricKind::SnapshotLastSnapshotBytes
                | MetricKind::SnapshotLastSnapshotSyncSeconds
                | MetricKind::SnapshotReplicationState
                | MetricKind::SnapshotLastUpdateTimestamp
        )
    }
}

/// Name, help text and label names of one gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDesc {
    pub kind: MetricKind,
    pub name: String,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

/// Immutable descriptor table for one exporter configuration.
#[derive(Debug, Clone)]
pub struct MetricSchema {
    descs: Vec<MetricDesc>,
    cluster_label: bool,
}

impl MetricSchema {
    pub fn new(prefix: &str, shape: PayloadShape, cluster_label: bool) -> Self {
        let base: Vec<&'static str> = if cluster_label {
            vec!["cluster", "pool", "image"]
        } else {
            vec!["pool", "image"]
        };

        let descs = MetricKind::ALL
            .iter()
            .copied()
            .filter(|kind| {
                (shape.has_mode_list() && kind.in_mode_list_family())
                    || (shape.has_peer_description() && kind.in_peer_family())
            })
            .map(|kind| {
                let mut labels = base.clone();
                if kind == MetricKind::SnapshotReplicationState {
                    labels.push("state");
                }
                MetricDesc {
                    kind,
                    name: format!("{prefix}{}", kind.suffix()),
                    help: kind.help(),
                    labels,
                }
            })
            .collect();

        Self {
            descs,
            cluster_label,
        }
    }

    /// Looks up the descriptor for `kind`, if this configuration exports it.
    pub fn get(&self, kind: MetricKind) -> Option<&MetricDesc> {
        self.descs.iter().find(|d| d.kind == kind)
    }

    pub fn descs(&self) -> &[MetricDesc] {
        &self.descs
    }

    pub fn cluster_label(&self) -> bool {
        self.cluster_label
    }
}
