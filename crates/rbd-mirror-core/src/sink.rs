//! Destination for emitted gauge samples.

use crate::schema::MetricDesc;

/// One emitted gauge value with its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricSample {
    /// Returns the value of label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One-way append channel for samples.
///
/// The collector calls `emit` as soon as each value is computed; nothing
/// already emitted is ever retracted.
pub trait MetricSink {
    /// `label_values` are ordered like `desc.labels`.
    fn emit(&mut self, desc: &MetricDesc, label_values: &[&str], value: f64);
}

impl MetricSink for Vec<MetricSample> {
    fn emit(&mut self, desc: &MetricDesc, label_values: &[&str], value: f64) {
        self.push(MetricSample {
            name: desc.name.clone(),
            labels: desc
                .labels
                .iter()
                .zip(label_values)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        });
    }
}
