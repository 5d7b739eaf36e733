//! Prometheus text exposition of collected samples.
//!
//! Each scrape gets its own `Registry`, so concurrent scrapes never share
//! gauge state and nothing survives into the next scrape.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use rbd_mirror_core::schema::{MetricDesc, MetricSchema};
use rbd_mirror_core::sink::MetricSink;

/// Sink backed by a per-request registry of gauge vectors.
pub(crate) struct RegistrySink {
    registry: Registry,
    gauges: HashMap<String, GaugeVec>,
}

impl RegistrySink {
    pub(crate) fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: HashMap::new(),
        }
    }

    fn gauge_vec(&mut self, desc: &MetricDesc) -> prometheus::Result<&GaugeVec> {
        if !self.gauges.contains_key(&desc.name) {
            let vec = new_gauge_vec(desc)?;
            self.registry.register(Box::new(vec.clone()))?;
            self.gauges.insert(desc.name.clone(), vec);
        }
        self.gauges
            .get(&desc.name)
            .ok_or_else(|| prometheus::Error::Msg(format!("gauge {} not registered", desc.name)))
    }

    /// Encodes everything emitted so far in the text format.
    pub(crate) fn encode(&self) -> prometheus::Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricSink for RegistrySink {
    fn emit(&mut self, desc: &MetricDesc, label_values: &[&str], value: f64) {
        let gauge = self
            .gauge_vec(desc)
            .and_then(|vec| vec.get_metric_with_label_values(label_values));
        match gauge {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(metric = %desc.name, error = %e, "dropping sample"),
        }
    }
}

fn new_gauge_vec(desc: &MetricDesc) -> prometheus::Result<GaugeVec> {
    GaugeVec::new(Opts::new(desc.name.clone(), desc.help), &desc.labels)
}

/// Builds every descriptor once so a bad prefix fails at startup, not per scrape.
pub(crate) fn validate_schema(schema: &MetricSchema) -> prometheus::Result<()> {
    let registry = Registry::new();
    for desc in schema.descs() {
        registry.register(Box::new(new_gauge_vec(desc)?))?;
    }
    Ok(())
}
