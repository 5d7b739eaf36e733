//! Collector configuration.

use std::time::Duration;

/// Default pool scanned for mirrored images.
pub const DEFAULT_POOL: &str = "ceph-pool1";

/// Default prefix shared by every exported metric name.
pub const DEFAULT_PREFIX: &str = "ceph_vm_";

/// Deadline shared by all `rbd` calls of one scrape.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Cluster label value used when neither the request nor the config names one.
pub const DEFAULT_CLUSTER_NAME: &str = "ceph";

/// Which pool-status payload layout the collector parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// Decide per payload: mode-list when any image carries `mode`,
    /// peer-description otherwise.
    #[default]
    Auto,
    /// Images carry an explicit `mode`; stats come from a second
    /// `mirror image status` call per image.
    ModeList,
    /// Snapshot stats are embedded as JSON in the first peer site's
    /// free-text description; no per-image call.
    PeerDescription,
}

impl PayloadShape {
    /// Whether journal/snapshot detail metrics can be produced.
    pub fn has_mode_list(self) -> bool {
        matches!(self, PayloadShape::Auto | PayloadShape::ModeList)
    }

    /// Whether peer-description metrics can be produced.
    pub fn has_peer_description(self) -> bool {
        matches!(self, PayloadShape::Auto | PayloadShape::PeerDescription)
    }
}

/// Immutable configuration of a [`crate::collector::MirrorCollector`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Pool to scan.
    pub pool: String,
    /// Metric name prefix.
    pub prefix: String,
    /// Payload parsing strategy.
    pub shape: PayloadShape,
    /// Add a `cluster` label to every sample.
    pub cluster_label: bool,
    /// Cluster passed to `rbd --cluster` when a scrape names none.
    pub default_cluster: Option<String>,
    /// Deadline for the whole scrape.
    pub timeout: Duration,
    /// Log every invocation and the diagnostic output of failures.
    pub debug: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            pool: DEFAULT_POOL.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            shape: PayloadShape::Auto,
            cluster_label: false,
            default_cluster: None,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}

impl CollectorConfig {
    /// Creates a config for `pool` with defaults for everything else.
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    /// Enables the `cluster` label dimension.
    pub fn with_cluster_label(mut self, enabled: bool) -> Self {
        self.cluster_label = enabled;
        self
    }

    pub fn with_default_cluster(mut self, cluster: Option<String>) -> Self {
        self.default_cluster = cluster;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Resolves the cluster a scrape targets: the request's, else the configured default.
    pub fn effective_cluster<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.default_cluster.as_deref())
    }
}

/// Whether `name` is safe to pass as `rbd --cluster <name>`.
pub fn is_valid_cluster_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
