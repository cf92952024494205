//! Metric samples produced by collectors during one scrape.
//!
//! Collectors push [`Sample`]s into a [`SampleSink`]; the registry drains the
//! matching [`SampleStream`] once every collector has finished and turns the
//! result into Prometheus metric families. Nothing survives the scrape.

use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

/// Metric namespace shared by every collector.
pub const NAMESPACE: &str = "mysql";

/// Join non-empty name parts with `_`.
#[must_use]
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Identity of one metric family: name, help and label schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDesc {
    fq_name: String,
    help: String,
    label_names: Vec<String>,
}

impl MetricDesc {
    #[must_use]
    pub fn new(subsystem: &str, name: &str, help: &str, label_names: &[&str]) -> Self {
        Self {
            fq_name: build_fq_name(NAMESPACE, subsystem, name),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    #[must_use]
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Gauge,
    Counter,
    Untyped,
}

/// One value for one label set of a [`MetricDesc`].
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    desc: Arc<MetricDesc>,
    value_type: ValueType,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    #[must_use]
    pub fn desc(&self) -> &MetricDesc {
        &self.desc
    }

    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Value of the label `name`, if the descriptor declares it.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|l| l == name)
            .and_then(|idx| self.label_values.get(idx))
            .map(String::as_str)
    }
}

/// Sending half handed to collectors. Cheap to clone, safe to share between
/// concurrently running collectors.
#[derive(Clone, Debug)]
pub struct SampleSink {
    tx: UnboundedSender<Sample>,
}

/// Receiving half, drained by the registry after the collectors finish.
#[derive(Debug)]
pub struct SampleStream {
    rx: UnboundedReceiver<Sample>,
}

impl SampleSink {
    /// Create a connected sink and stream for one scrape.
    #[must_use]
    pub fn channel() -> (Self, SampleStream) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, SampleStream { rx })
    }

    /// Push one sample. Label values must match the descriptor's label names
    /// one to one; mismatches are dropped with a warning.
    pub fn emit(&self, desc: &Arc<MetricDesc>, value_type: ValueType, value: f64, label_values: &[&str]) {
        if label_values.len() != desc.label_names.len() {
            warn!(
                metric = %desc.fq_name,
                expected = desc.label_names.len(),
                got = label_values.len(),
                "label cardinality mismatch, dropping sample"
            );
            return;
        }

        let sample = Sample {
            desc: Arc::clone(desc),
            value_type,
            value,
            label_values: label_values.iter().map(|v| (*v).to_string()).collect(),
        };

        // The stream is gone only if the scrape was abandoned.
        if self.tx.send(sample).is_err() {
            debug!(metric = %desc.fq_name, "sample stream closed, dropping sample");
        }
    }
}

impl SampleStream {
    /// Collect everything sent so far. Call after all sinks are dropped to
    /// get the complete scrape.
    pub async fn collect(mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Some(sample) = self.rx.recv().await {
            samples.push(sample);
        }
        samples
    }
}

enum FamilyVec {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

struct Family {
    value_type: ValueType,
    label_names: Vec<String>,
    vec: FamilyVec,
}

impl Family {
    fn new(desc: &MetricDesc, value_type: ValueType, registry: &Registry) -> prometheus::Result<Self> {
        let opts = Opts::new(desc.fq_name.clone(), desc.help.clone());
        let labels: Vec<&str> = desc.label_names.iter().map(String::as_str).collect();

        // TextEncoder cannot write UNTYPED families, untyped values are exposed as gauges.
        let vec = match value_type {
            ValueType::Counter => {
                let v = CounterVec::new(opts, &labels)?;
                registry.register(Box::new(v.clone()))?;
                FamilyVec::Counter(v)
            }
            ValueType::Gauge | ValueType::Untyped => {
                let v = GaugeVec::new(opts, &labels)?;
                registry.register(Box::new(v.clone()))?;
                FamilyVec::Gauge(v)
            }
        };

        Ok(Self {
            value_type,
            label_names: desc.label_names.clone(),
            vec,
        })
    }

    fn set(&self, labels: &[&str], value: f64) -> prometheus::Result<()> {
        match &self.vec {
            FamilyVec::Gauge(v) => v.get_metric_with_label_values(labels)?.set(value),
            FamilyVec::Counter(v) => {
                if value >= 0.0 {
                    v.get_metric_with_label_values(labels)?.inc_by(value);
                }
            }
        }
        Ok(())
    }
}

/// Turn one scrape's samples into metric families.
///
/// Within a family the first sample for a label set wins. A sample whose type
/// or label names disagree with the first sample of the same name is dropped.
#[must_use]
pub fn into_metric_families(samples: Vec<Sample>) -> Vec<MetricFamily> {
    let registry = Registry::new();
    let mut families: HashMap<String, Option<Family>> = HashMap::new();
    let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();

    for sample in samples {
        let desc = sample.desc();

        let family = match families.entry(desc.fq_name.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let created = Family::new(desc, sample.value_type, &registry)
                    .map_err(|err| warn!(metric = %desc.fq_name, error = %err, "invalid metric family"))
                    .ok();
                e.insert(created)
            }
        };

        let Some(family) = family else {
            continue;
        };

        if family.value_type != sample.value_type || family.label_names != desc.label_names {
            warn!(metric = %desc.fq_name, "conflicting descriptor for metric, dropping sample");
            continue;
        }

        let key = (desc.fq_name.clone(), sample.label_values.clone());
        if !seen.insert(key) {
            debug!(metric = %desc.fq_name, labels = ?sample.label_values, "duplicate sample in scrape");
            continue;
        }

        let labels: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        if let Err(err) = family.set(&labels, sample.value) {
            warn!(metric = %desc.fq_name, error = %err, "could not set sample value");
        }
    }

    registry.gather()
}
