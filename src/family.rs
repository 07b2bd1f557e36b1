//! Metric families built fresh on every scrape.
//!
//! A [`Family`] is a named group of same-shaped samples. It is converted to
//! the prometheus crate's protobuf families for text exposition.

use prometheus::core::Collector;
use prometheus::proto;
use prometheus::{CounterVec, GaugeVec, Opts};

/// Exposition type of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    Gauge,
    Counter,
}

/// One labeled measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("{family}: expected {expected} label values, got {got}")]
    LabelMismatch {
        family: String,
        expected: usize,
        got: usize,
    },

    #[error("{family}: duplicate sample for labels {labels:?}")]
    DuplicateLabels { family: String, labels: Vec<String> },

    #[error("{0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A metric family: name, help text, label names and samples.
///
/// Every sample carries exactly as many label values as there are label names,
/// and no two samples share the same label values.
#[derive(Debug, Clone)]
pub struct Family {
    name: String,
    help: String,
    kind: FamilyKind,
    label_names: Vec<String>,
    samples: Vec<Sample>,
}

impl Family {
    pub fn new(
        kind: FamilyKind,
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            samples: Vec::new(),
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(FamilyKind::Gauge, name, help, label_names)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(FamilyKind::Counter, name, help, label_names)
    }

    /// Appends a sample; fails if the label arity does not match or the label
    /// values are already taken. The first sample for a label set wins.
    pub fn add_sample(&mut self, label_values: &[&str], value: f64) -> Result<(), FamilyError> {
        if label_values.len() != self.label_names.len() {
            return Err(FamilyError::LabelMismatch {
                family: self.name.clone(),
                expected: self.label_names.len(),
                got: label_values.len(),
            });
        }
        if self.value(label_values).is_some() {
            return Err(FamilyError::DuplicateLabels {
                family: self.name.clone(),
                labels: label_values.iter().map(|v| v.to_string()).collect(),
            });
        }
        self.samples.push(Sample {
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FamilyKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Value of the first sample with exactly these label values.
    pub fn value(&self, label_values: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| {
                s.label_values.len() == label_values.len()
                    && s.label_values.iter().zip(label_values).all(|(a, b)| a == b)
            })
            .map(|s| s.value)
    }

    /// Converts to protobuf families for the text encoder.
    ///
    /// A family without samples yields nothing: the text format cannot carry it.
    pub fn to_proto(&self) -> Result<Vec<proto::MetricFamily>, FamilyError> {
        if self.samples.is_empty() {
            return Ok(Vec::new());
        }

        let opts = Opts::new(self.name.as_str(), self.help.as_str());
        let labels: Vec<&str> = self.label_names.iter().map(String::as_str).collect();

        let families = match self.kind {
            FamilyKind::Gauge => {
                let vec = GaugeVec::new(opts, &labels)?;
                for sample in &self.samples {
                    let values: Vec<&str> =
                        sample.label_values.iter().map(String::as_str).collect();
                    vec.get_metric_with_label_values(values.as_slice())?
                        .set(sample.value);
                }
                vec.collect()
            }
            FamilyKind::Counter => {
                let vec = CounterVec::new(opts, &labels)?;
                for sample in &self.samples {
                    let values: Vec<&str> =
                        sample.label_values.iter().map(String::as_str).collect();
                    vec.get_metric_with_label_values(values.as_slice())?
                        .inc_by(sample.value.max(0.0));
                }
                vec.collect()
            }
        };
        Ok(families)
    }
}

/// Converts a batch of families, dropping (and returning) the ones that fail.
pub fn to_proto_families(
    families: &[Family],
) -> (Vec<proto::MetricFamily>, Vec<FamilyError>) {
    let mut out = Vec::with_capacity(families.len());
    let mut errors = Vec::new();
    for family in families {
        match family.to_proto() {
            Ok(protos) => out.extend(protos),
            Err(e) => errors.push(e),
        }
    }
    (out, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn encode(families: &[proto::MetricFamily]) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_add_sample_checks_label_arity() {
        let mut family = Family::gauge("mailman3_queues", "Queue length", &["queue"]);
        assert!(family.add_sample(&["out"], 5.0).is_ok());

        let err = family.add_sample(&[], 1.0).unwrap_err();
        assert!(matches!(
            err,
            FamilyError::LabelMismatch {
                expected: 1,
                got: 0,
                ..
            }
        ));
        assert_eq!(family.samples().len(), 1);
    }

    #[test]
    fn test_duplicate_labels_keep_first_sample() {
        let mut family = Family::counter("mailman3_list_members", "Members", &["list"]);
        family.add_sample(&["a@example.com"], 3.0).unwrap();

        let err = family.add_sample(&["a@example.com"], 7.0).unwrap_err();
        assert!(matches!(err, FamilyError::DuplicateLabels { .. }));
        assert_eq!(family.samples().len(), 1);

        let text = encode(&family.to_proto().unwrap());
        assert!(text.contains("mailman3_list_members{list=\"a@example.com\"} 3"));
        assert!(!text.contains("} 10"));
    }

    #[test]
    fn test_value_lookup() {
        let mut family = Family::counter("mailman3_list_members", "Members", &["list"]);
        family.add_sample(&["a@example.com"], 3.0).unwrap();
        family.add_sample(&["b@example.com"], 7.0).unwrap();

        assert_eq!(family.value(&["b@example.com"]), Some(7.0));
        assert_eq!(family.value(&["c@example.com"]), None);
        assert_eq!(family.kind(), FamilyKind::Counter);
    }

    #[test]
    fn test_empty_family_is_not_exposed() {
        let family = Family::gauge("mailman3_queues", "Queue length", &["queue"]);
        assert!(family.to_proto().unwrap().is_empty());
        assert_eq!(family.label_names(), &["queue".to_string()]);
    }

    #[test]
    fn test_gauge_text_exposition() {
        let mut family = Family::gauge("mailman3_queues", "Queue length", &["queue"]);
        family.add_sample(&["out"], 5.0).unwrap();

        let text = encode(&family.to_proto().unwrap());
        assert!(text.contains("# HELP mailman3_queues Queue length"));
        assert!(text.contains("# TYPE mailman3_queues gauge"));
        assert!(text.contains("mailman3_queues{queue=\"out\"} 5"));
    }

    #[test]
    fn test_unlabeled_counter_text_exposition() {
        let mut family = Family::counter("mailman3_users", "Users", &[]);
        family.add_sample(&[], 42.0).unwrap();

        let text = encode(&family.to_proto().unwrap());
        assert!(text.contains("# TYPE mailman3_users counter"));
        assert!(text.contains("mailman3_users 42"));
    }

    #[test]
    fn test_invalid_name_is_reported() {
        let mut bad = Family::gauge("bad-name", "Invalid", &[]);
        bad.add_sample(&[], 1.0).unwrap();
        let mut good = Family::gauge("good_name", "Valid", &[]);
        good.add_sample(&[], 1.0).unwrap();

        let (protos, errors) = to_proto_families(&[bad, good]);
        assert_eq!(protos.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
