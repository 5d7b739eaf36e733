//! Per-scrape orchestration.
//!
//! One `collect` call walks `Idle → PoolFetched → {Aborted | PerResourceLoop}
//! → Done`: a pool-level failure ends the scrape with nothing emitted, a
//! per-image failure only skips that image.

use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::error::CollectError;
use super::pool::{PoolStatus, ResourceEntry, parse_pool_status};
use super::status::{ReplayingStatus, SnapshotStatus, StatusSnapshot, parse_image_status};
use super::{BYTES_PER_MIB, peer};
use crate::config::{CollectorConfig, DEFAULT_CLUSTER_NAME, PayloadShape};
use crate::fetcher::StatusFetcher;
use crate::schema::{MetricKind, MetricSchema};
use crate::sink::MetricSink;

/// How a scrape ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrapeOutcome {
    /// Every image was visited.
    #[default]
    Completed,
    /// Pool status could not be fetched or decoded; nothing was emitted.
    Aborted,
    /// The shared deadline elapsed mid-loop; earlier samples stand.
    DeadlineExceeded,
}

/// Counters describing one scrape, for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeSummary {
    pub outcome: ScrapeOutcome,
    /// Images listed in the pool status.
    pub images_seen: usize,
    /// Images that contributed a metric set.
    pub images_emitted: usize,
    /// Images without metrics by design (disabled, unknown mode).
    pub images_ignored: usize,
    /// Images skipped because of an error.
    pub images_failed: usize,
    /// Samples written to the sink.
    pub samples: usize,
}

/// Collects mirroring metrics for one pool.
///
/// Holds only immutable configuration, so one instance serves concurrent
/// scrapes without locking.
pub struct MirrorCollector<F: StatusFetcher> {
    fetcher: F,
    config: CollectorConfig,
    schema: MetricSchema,
}

impl<F: StatusFetcher> MirrorCollector<F> {
    /// Creates a collector and builds its metric descriptor table.
    pub fn new(fetcher: F, config: CollectorConfig) -> Self {
        let schema = MetricSchema::new(&config.prefix, config.shape, config.cluster_label);
        Self {
            fetcher,
            config,
            schema,
        }
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs one scrape, streaming samples into `sink` as they are computed.
    ///
    /// `cluster` scopes this scrape only; `None` falls back to the configured
    /// default cluster. All `rbd` calls share one deadline of `config.timeout`.
    pub async fn collect<S>(&self, cluster: Option<&str>, sink: &mut S) -> ScrapeSummary
    where
        S: MetricSink + Send,
    {
        let deadline = Instant::now() + self.config.timeout;
        let cluster = self.config.effective_cluster(cluster);
        let mut summary = ScrapeSummary::default();

        let pool = match self.fetch_pool(deadline, cluster).await {
            Ok(pool) => pool,
            Err(e) => {
                error!(pool = %self.config.pool, error = %e, "mirror pool status failed");
                summary.outcome = ScrapeOutcome::Aborted;
                return summary;
            }
        };
        summary.images_seen = pool.images.len();

        let shape = self.resolve_shape(&pool);
        debug!(pool = %self.config.pool, images = pool.images.len(), ?shape, "pool status fetched");

        for image in &pool.images {
            let status = match shape {
                PayloadShape::PeerDescription => {
                    peer::parse_peer_stats(image.peer.as_ref()).map(StatusSnapshot::Snapshot)
                }
                _ => self.image_status(deadline, cluster, image).await,
            };

            let status = match status {
                Ok(status) => status,
                Err(e) if e.is_deadline() => {
                    warn!(pool = %self.config.pool, image = %image.name, "scrape deadline exceeded");
                    summary.images_failed += 1;
                    summary.outcome = ScrapeOutcome::DeadlineExceeded;
                    break;
                }
                Err(e) => {
                    warn!(pool = %self.config.pool, image = %image.name, error = %e, "skipping image");
                    summary.images_failed += 1;
                    continue;
                }
            };

            let labels = self.labels(cluster, &image.name);
            let emitted = self.emit_status(sink, &labels, &status);
            if emitted == 0 {
                summary.images_ignored += 1;
            } else {
                summary.images_emitted += 1;
                summary.samples += emitted;
            }
        }

        summary
    }

    async fn fetch_pool(
        &self,
        deadline: Instant,
        cluster: Option<&str>,
    ) -> Result<PoolStatus, CollectError> {
        let args = self.rbd_args(
            cluster,
            &[
                "mirror",
                "pool",
                "status",
                self.config.pool.as_str(),
                "--verbose",
                "--format",
                "json",
            ],
        );
        let raw = self.fetcher.fetch(deadline, &args).await?;
        parse_pool_status(&raw)
    }

    /// Second call of the mode-list layout. Images whose listed mode has no
    /// status payload resolve to `Unknown` without calling `rbd`.
    async fn image_status(
        &self,
        deadline: Instant,
        cluster: Option<&str>,
        image: &ResourceEntry,
    ) -> Result<StatusSnapshot, CollectError> {
        match &image.mode {
            Some(mode) if mode.is_mirrored() => {}
            Some(mode) => return Ok(StatusSnapshot::Unknown(mode.as_str().to_string())),
            None => return Ok(StatusSnapshot::Unknown(String::new())),
        }

        let image_spec = format!("{}/{}", self.config.pool, image.name);
        let args = self.rbd_args(
            cluster,
            &["mirror", "image", "status", image_spec.as_str(), "--format", "json"],
        );
        let raw = self.fetcher.fetch(deadline, &args).await?;
        parse_image_status(&raw, image.mode.as_ref())
    }

    fn rbd_args(&self, cluster: Option<&str>, args: &[&str]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len() + 2);
        if let Some(cluster) = cluster {
            out.push("--cluster".to_string());
            out.push(cluster.to_string());
        }
        out.extend(args.iter().map(|a| a.to_string()));
        out
    }

    fn resolve_shape(&self, pool: &PoolStatus) -> PayloadShape {
        match self.config.shape {
            PayloadShape::Auto if pool.lists_modes() => PayloadShape::ModeList,
            PayloadShape::Auto => PayloadShape::PeerDescription,
            shape => shape,
        }
    }

    fn labels<'a>(&'a self, cluster: Option<&'a str>, image: &'a str) -> Vec<&'a str> {
        if self.schema.cluster_label() {
            vec![
                cluster.unwrap_or(DEFAULT_CLUSTER_NAME),
                self.config.pool.as_str(),
                image,
            ]
        } else {
            vec![self.config.pool.as_str(), image]
        }
    }

    /// Emits the metric set for one image; returns the number of samples.
    fn emit_status<S: MetricSink>(
        &self,
        sink: &mut S,
        labels: &[&str],
        status: &StatusSnapshot,
    ) -> usize {
        match status {
            StatusSnapshot::Replaying(r) => self.emit_replaying(sink, labels, r),
            StatusSnapshot::Snapshot(s) => self.emit_snapshot(sink, labels, s),
            StatusSnapshot::Unknown(mode) => {
                debug!(image = labels.last().copied().unwrap_or_default(), mode = %mode, "no metrics for mode");
                0
            }
        }
    }

    fn emit_replaying<S: MetricSink>(
        &self,
        sink: &mut S,
        labels: &[&str],
        r: &ReplayingStatus,
    ) -> usize {
        let mut gauges = Gauges::new(&self.schema, sink, labels);
        gauges.set(MetricKind::JournalSpeed, r.bytes_per_second / BYTES_PER_MIB);
        gauges.set(MetricKind::JournalEntriesBehind, r.entries_behind_primary);
        gauges.set(MetricKind::JournalEntriesPerSec, r.entries_per_second);
        gauges.set(MetricKind::JournalSecondsUntilSynced, r.seconds_until_synced);
        gauges.count
    }

    fn emit_snapshot<S: MetricSink>(
        &self,
        sink: &mut S,
        labels: &[&str],
        s: &SnapshotStatus,
    ) -> usize {
        let mut gauges = Gauges::new(&self.schema, sink, labels);
        if let Some(pct) = s.sync_percent {
            gauges.set(MetricKind::SnapshotSyncPercent, pct);
        }
        gauges.set(
            MetricKind::SnapshotSpeed,
            snapshot_speed_mib(s.last_snapshot_bytes, s.last_snapshot_sync_seconds),
        );
        if let Some(secs) = s.seconds_until_synced {
            gauges.set(MetricKind::SnapshotSecondsUntilSynced, secs);
        }
        gauges.set(
            MetricKind::SnapshotBytesPerSnapshot,
            s.bytes_per_snapshot / BYTES_PER_MIB,
        );
        gauges.set(
            MetricKind::SnapshotLastSnapshotBytes,
            s.last_snapshot_bytes / BYTES_PER_MIB,
        );
        gauges.set(
            MetricKind::SnapshotLastSnapshotSyncSeconds,
            s.last_snapshot_sync_seconds,
        );
        if let Some(state) = s.replication_state.as_deref() {
            let healthy = if peer::is_replaying(state) { 1.0 } else { 0.0 };
            gauges.set_with_extra(MetricKind::SnapshotReplicationState, state, healthy);
        }
        if let Some(ts) = s.last_update {
            gauges.set(MetricKind::SnapshotLastUpdateTimestamp, ts as f64);
        }
        gauges.count
    }
}

/// Speed of the last snapshot transfer in MiB/s; 0.0 when the duration is not positive.
pub(crate) fn snapshot_speed_mib(last_snapshot_bytes: f64, sync_seconds: f64) -> f64 {
    if sync_seconds <= 0.0 {
        return 0.0;
    }
    finite_or_zero(last_snapshot_bytes / sync_seconds / BYTES_PER_MIB)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Writes gauges for one image through the schema.
struct Gauges<'a, S: MetricSink> {
    schema: &'a MetricSchema,
    sink: &'a mut S,
    labels: &'a [&'a str],
    count: usize,
}

impl<'a, S: MetricSink> Gauges<'a, S> {
    fn new(schema: &'a MetricSchema, sink: &'a mut S, labels: &'a [&'a str]) -> Self {
        Self {
            schema,
            sink,
            labels,
            count: 0,
        }
    }

    fn set(&mut self, kind: MetricKind, value: f64) {
        if let Some(desc) = self.schema.get(kind) {
            self.sink.emit(desc, self.labels, finite_or_zero(value));
            self.count += 1;
        }
    }

    fn set_with_extra(&mut self, kind: MetricKind, extra: &str, value: f64) {
        if let Some(desc) = self.schema.get(kind) {
            let mut labels = self.labels.to_vec();
            labels.push(extra);
            self.sink.emit(desc, &labels, finite_or_zero(value));
            self.count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{MockFetcher, MockReply};
    use crate::sink::MetricSample;

    const POOL_ARGS: [&str; 7] = [
        "mirror", "pool", "status", "rbd", "--verbose", "--format", "json",
    ];

    fn image_args(name: &str) -> Vec<String> {
        vec![
            "mirror".into(),
            "image".into(),
            "status".into(),
            format!("rbd/{}", name),
            "--format".into(),
            "json".into(),
        ]
    }

    fn journal_detail(bytes_per_second: u64) -> String {
        format!(
            r#"{{"mode":"journal","replaying_status":{{"bytes_per_second":{},"entries_behind_primary":3,"entries_per_second":10,"seconds_until_synced":5}}}}"#,
            bytes_per_second
        )
    }

    fn value(samples: &[MetricSample], name: &str, image: &str) -> Option<f64> {
        samples
            .iter()
            .find(|s| s.name == name && s.label("image") == Some(image))
            .map(|s| s.value)
    }

    fn for_image<'a>(samples: &'a [MetricSample], image: &str) -> Vec<&'a MetricSample> {
        samples
            .iter()
            .filter(|s| s.label("image") == Some(image))
            .collect()
    }

    async fn scrape<F: StatusFetcher>(
        collector: &MirrorCollector<F>,
        cluster: Option<&str>,
    ) -> (ScrapeSummary, Vec<MetricSample>) {
        let mut samples = Vec::new();
        let summary = collector.collect(cluster, &mut samples).await;
        (summary, samples)
    }

    #[tokio::test]
    async fn test_journal_round_trip() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"[{"name":"vm1","mode":"journal"}]"#)
            .json(image_args("vm1"), &journal_detail(2097152));
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.outcome, ScrapeOutcome::Completed);
        assert_eq!(summary.images_emitted, 1);
        assert_eq!(samples.len(), 4);
        assert_eq!(value(&samples, "ceph_vm_journal_speed_mib_per_sec", "vm1"), Some(2.0));
        assert_eq!(value(&samples, "ceph_vm_journal_entries_behind_primary", "vm1"), Some(3.0));
        assert_eq!(value(&samples, "ceph_vm_journal_entries_per_sec", "vm1"), Some(10.0));
        assert_eq!(value(&samples, "ceph_vm_journal_seconds_until_synced", "vm1"), Some(5.0));
        for s in &samples {
            assert_eq!(s.label("pool"), Some("rbd"));
            assert_eq!(s.label("cluster"), None);
        }
    }

    #[tokio::test]
    async fn test_snapshot_full_set() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"{"images":[{"name":"vm2","mode":"snapshot"}]}"#)
            .json(
                image_args("vm2"),
                r#"{"mode":"snapshot","snapshot_status":{"sync_percent":50,"seconds_until_synced":12,
                    "bytes_per_snapshot":3145728,"last_snapshot_bytes":8388608,"last_snapshot_sync_seconds":4}}"#,
            );
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (_, samples) = scrape(&collector, None).await;

        assert_eq!(samples.len(), 6);
        assert_eq!(value(&samples, "ceph_vm_snapshot_sync_percent", "vm2"), Some(50.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_speed_mib_per_sec", "vm2"), Some(2.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_seconds_until_synced", "vm2"), Some(12.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_bytes_per_snapshot_mib", "vm2"), Some(3.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_last_snapshot_bytes_mib", "vm2"), Some(8.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_last_snapshot_sync_seconds", "vm2"), Some(4.0));
    }

    #[tokio::test]
    async fn test_snapshot_without_progress_fields() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"[{"name":"vm2","mode":"snapshot"}]"#)
            .json(
                image_args("vm2"),
                r#"{"mode":"snapshot","snapshot_status":{"bytes_per_snapshot":1048576,
                    "last_snapshot_bytes":2097152,"last_snapshot_sync_seconds":2}}"#,
            );
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.samples, 4);
        assert_eq!(samples.len(), 4);
        assert_eq!(value(&samples, "ceph_vm_snapshot_sync_percent", "vm2"), None);
        assert_eq!(value(&samples, "ceph_vm_snapshot_seconds_until_synced", "vm2"), None);
        assert_eq!(value(&samples, "ceph_vm_snapshot_speed_mib_per_sec", "vm2"), Some(1.0));
    }

    #[tokio::test]
    async fn test_snapshot_zero_duration_speed() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"[{"name":"vm2","mode":"snapshot"}]"#)
            .json(
                image_args("vm2"),
                r#"{"mode":"snapshot","snapshot_status":{"last_snapshot_bytes":8388608,"last_snapshot_sync_seconds":0}}"#,
            );
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (_, samples) = scrape(&collector, None).await;

        assert_eq!(value(&samples, "ceph_vm_snapshot_speed_mib_per_sec", "vm2"), Some(0.0));
        assert!(samples.iter().all(|s| s.value.is_finite()));
    }

    #[tokio::test]
    async fn test_unmirrored_modes_skip_detail_call() {
        let fetcher = MockFetcher::new().json(
            POOL_ARGS,
            r#"[{"name":"vm3","mode":"disabled"},{"name":"vm4","mode":"image"}]"#,
        );
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert!(samples.is_empty());
        assert_eq!(summary.outcome, ScrapeOutcome::Completed);
        assert_eq!(summary.images_ignored, 2);
        assert_eq!(summary.images_failed, 0);
        assert_eq!(collector.fetcher().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_detail_reports_unknown_mode() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"[{"name":"vm1","mode":"journal"}]"#)
            .json(image_args("vm1"), r#"{"mode":"disabled"}"#);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert!(samples.is_empty());
        assert_eq!(summary.images_ignored, 1);
    }

    #[tokio::test]
    async fn test_pool_failure_emits_nothing() {
        let fetcher = MockFetcher::new().reply(
            POOL_ARGS,
            MockReply::Fail {
                code: 2,
                stderr: "rbd: error opening pool 'rbd'".into(),
            },
        );
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert!(samples.is_empty());
        assert_eq!(summary.outcome, ScrapeOutcome::Aborted);
        assert_eq!(summary.images_seen, 0);
    }

    #[tokio::test]
    async fn test_pool_decode_failure_emits_nothing() {
        let fetcher = MockFetcher::new().json(POOL_ARGS, "not json");
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert!(samples.is_empty());
        assert_eq!(summary.outcome, ScrapeOutcome::Aborted);
    }

    #[tokio::test]
    async fn test_one_image_failure_keeps_others() {
        let fetcher = MockFetcher::new()
            .json(
                POOL_ARGS,
                r#"[{"name":"a","mode":"journal"},{"name":"b","mode":"journal"},
                    {"name":"c","mode":"journal"},{"name":"d","mode":"snapshot"}]"#,
            )
            .json(image_args("a"), &journal_detail(1048576))
            .reply(
                image_args("b"),
                MockReply::Fail {
                    code: 1,
                    stderr: "image not found".into(),
                },
            )
            .json(image_args("c"), &journal_detail(0))
            // declares snapshot but carries no snapshot_status
            .json(image_args("d"), r#"{"mode":"snapshot"}"#);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.outcome, ScrapeOutcome::Completed);
        assert_eq!(summary.images_emitted, 2);
        assert_eq!(summary.images_failed, 2);
        assert_eq!(for_image(&samples, "a").len(), 4);
        assert!(for_image(&samples, "b").is_empty());
        assert_eq!(for_image(&samples, "c").len(), 4);
        assert!(for_image(&samples, "d").is_empty());
        assert_eq!(value(&samples, "ceph_vm_journal_speed_mib_per_sec", "a"), Some(1.0));
    }

    #[tokio::test]
    async fn test_detail_calls_in_enumeration_order() {
        let fetcher = MockFetcher::new()
            .json(
                POOL_ARGS,
                r#"[{"name":"z","mode":"journal"},{"name":"a","mode":"journal"}]"#,
            )
            .json(image_args("z"), &journal_detail(0))
            .json(image_args("a"), &journal_detail(0));
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        scrape(&collector, None).await;

        let calls = collector.fetcher().calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], image_args("z"));
        assert_eq!(calls[2], image_args("a"));
    }

    #[tokio::test]
    async fn test_deadline_stops_loop_keeps_emitted() {
        let fetcher = MockFetcher::new()
            .json(
                POOL_ARGS,
                r#"[{"name":"a","mode":"journal"},{"name":"b","mode":"journal"},{"name":"c","mode":"journal"}]"#,
            )
            .json(image_args("a"), &journal_detail(0))
            .reply(image_args("b"), MockReply::Timeout)
            .json(image_args("c"), &journal_detail(0));
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.outcome, ScrapeOutcome::DeadlineExceeded);
        assert_eq!(for_image(&samples, "a").len(), 4);
        assert!(for_image(&samples, "c").is_empty());
        assert_eq!(collector.fetcher().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_peer_description_scenario() {
        let pool = r#"{"images":[{"name":"vm1","peer_sites":[{
            "state":"up+replaying",
            "description":"some text {\"bytes_per_second\":0,\"bytes_per_snapshot\":1048576,\"last_snapshot_bytes\":2097152,\"last_snapshot_sync_seconds\":2}",
            "last_update":"2024-05-02 10:22:01"}]}]}"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let config = CollectorConfig::new("rbd").with_shape(PayloadShape::PeerDescription);
        let collector = MirrorCollector::new(fetcher, config);

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.images_emitted, 1);
        assert_eq!(samples.len(), 6);
        assert_eq!(value(&samples, "ceph_vm_snapshot_speed_mib_per_sec", "vm1"), Some(1.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_bytes_per_snapshot_mib", "vm1"), Some(1.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_last_snapshot_bytes_mib", "vm1"), Some(2.0));
        assert_eq!(value(&samples, "ceph_vm_snapshot_last_snapshot_sync_seconds", "vm1"), Some(2.0));
        assert_eq!(
            value(&samples, "ceph_vm_snapshot_last_update_timestamp", "vm1"),
            Some(1_714_645_321.0)
        );
        let state = samples
            .iter()
            .find(|s| s.name == "ceph_vm_snapshot_replication_state")
            .unwrap();
        assert_eq!(state.label("state"), Some("up+replaying"));
        assert_eq!(state.value, 1.0);
        // no second call in this layout
        assert_eq!(collector.fetcher().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_peer_description_minimal_set() {
        let pool = r#"[{"name":"vm1","peer_sites":[{"description":"{\"last_snapshot_bytes\":1048576}"}]}]"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (_, samples) = scrape(&collector, None).await;

        assert_eq!(samples.len(), 4);
        assert_eq!(value(&samples, "ceph_vm_snapshot_speed_mib_per_sec", "vm1"), Some(0.0));
    }

    #[tokio::test]
    async fn test_peer_not_replaying() {
        let pool = r#"[{"name":"vm1","peer_sites":[{"state":"up+stopped","description":"stopped, {}"}]}]"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (_, samples) = scrape(&collector, None).await;

        let state = samples
            .iter()
            .find(|s| s.name == "ceph_vm_snapshot_replication_state")
            .unwrap();
        assert_eq!(state.value, 0.0);
        assert_eq!(state.label("state"), Some("up+stopped"));
    }

    #[tokio::test]
    async fn test_malformed_peer_description_skips_image_only() {
        let pool = r#"{"images":[
            {"name":"bad","peer_sites":[{"description":"replaying, entries_behind_primary=0"}]},
            {"name":"lonely","peer_sites":[]},
            {"name":"good","peer_sites":[{"description":"replaying, {\"last_snapshot_bytes\":0}"}]}
        ]}"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.outcome, ScrapeOutcome::Completed);
        assert_eq!(summary.images_failed, 2);
        assert!(for_image(&samples, "bad").is_empty());
        assert!(for_image(&samples, "lonely").is_empty());
        assert_eq!(for_image(&samples, "good").len(), 4);
    }

    #[tokio::test]
    async fn test_odd_peer_entry_skips_image_only() {
        let pool = r#"{"images":[
            {"name":"odd","peer_sites":[{"description":null,"state":5}]},
            {"name":"good","peer_sites":[{"state":"up+replaying","description":"replaying, {\"last_snapshot_bytes\":0}"}]}
        ]}"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let collector = MirrorCollector::new(fetcher, CollectorConfig::new("rbd"));

        let (summary, samples) = scrape(&collector, None).await;

        assert_eq!(summary.outcome, ScrapeOutcome::Completed);
        assert_eq!(summary.images_failed, 1);
        assert!(for_image(&samples, "odd").is_empty());
        assert_eq!(for_image(&samples, "good").len(), 5);
    }

    #[tokio::test]
    async fn test_cluster_scoping() {
        let mut pool_args = vec!["--cluster", "site-b"];
        pool_args.extend(POOL_ARGS);
        let mut detail_args = vec!["--cluster".to_string(), "site-b".to_string()];
        detail_args.extend(image_args("vm1"));

        let fetcher = MockFetcher::new()
            .json(pool_args, r#"[{"name":"vm1","mode":"journal"}]"#)
            .json(detail_args, &journal_detail(0));
        let config = CollectorConfig::new("rbd")
            .with_cluster_label(true)
            .with_default_cluster(Some("site-a".into()));
        let collector = MirrorCollector::new(fetcher, config);

        let (_, samples) = scrape(&collector, Some("site-b")).await;

        assert_eq!(samples.len(), 4);
        for s in &samples {
            assert_eq!(s.label("cluster"), Some("site-b"));
            assert_eq!(s.labels[0].0, "cluster");
        }
    }

    #[tokio::test]
    async fn test_cluster_label_defaults_to_ceph() {
        let fetcher = MockFetcher::new()
            .json(POOL_ARGS, r#"[{"name":"vm1","mode":"journal"}]"#)
            .json(image_args("vm1"), &journal_detail(0));
        let config = CollectorConfig::new("rbd").with_cluster_label(true);
        let collector = MirrorCollector::new(fetcher, config);

        let (_, samples) = scrape(&collector, None).await;

        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.label("cluster") == Some("ceph")));
    }

    #[tokio::test]
    async fn test_mode_list_shape_ignores_peer_layout() {
        let pool = r#"[{"name":"vm1","peer_sites":[{"description":"{\"last_snapshot_bytes\":1}"}]}]"#;
        let fetcher = MockFetcher::new().json(POOL_ARGS, pool);
        let config = CollectorConfig::new("rbd").with_shape(PayloadShape::ModeList);
        let collector = MirrorCollector::new(fetcher, config);

        let (summary, samples) = scrape(&collector, None).await;

        assert!(samples.is_empty());
        assert_eq!(summary.images_ignored, 1);
    }

    #[test]
    fn test_snapshot_speed() {
        assert_eq!(snapshot_speed_mib(2097152.0, 2.0), 1.0);
        assert_eq!(snapshot_speed_mib(2097152.0, 0.0), 0.0);
        assert_eq!(snapshot_speed_mib(2097152.0, -1.0), 0.0);
        assert_eq!(snapshot_speed_mib(f64::MAX, f64::MIN_POSITIVE), 0.0);
    }
}
