//! Event records attached to a test's result: the sole channel by which
//! probe-observed data reaches the reporting layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One-shot categorical test outcome committed by a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Category bucket for the host's counters (defaults to the lowercased
    /// long label).
    pub category: String,
    /// Long display label, e.g. `"PASS"`.
    pub long: String,
    /// Short display code (defaults to the long label's first character).
    pub short: String,
    /// Display color name.
    pub color: String,
}

/// Row ordering for a metric's table rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A named measurement emitted by a probe. One event per recorder call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub value: Value,
    /// Row ordering when the metric is rendered as a run-end table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    /// Value template for table rendering; `{}` is replaced by the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A metric event as pushed onto the run-wide stream, tagged with the
/// emitting test's location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBroadcast {
    pub metric: String,
    pub value: Value,
    /// `"<file>::<test name>"`.
    pub location: String,
}

/// A property appended to a test's record by an active probe.
#[derive(Debug, Clone, PartialEq)]
pub enum TestProperty {
    Status(StatusEvent),
    Metric(MetricEvent),
}

/// Ordered property list for one test.
#[derive(Debug, Default)]
pub struct TestRecord {
    properties: Vec<TestProperty>,
}

impl TestRecord {
    pub(crate) fn push(&mut self, property: TestProperty) {
        self.properties.push(property);
    }

    /// First committed status event, if any.
    pub fn status(&self) -> Option<&StatusEvent> {
        self.properties.iter().find_map(|p| match p {
            TestProperty::Status(ev) => Some(ev),
            TestProperty::Metric(_) => None,
        })
    }

    /// Metric events in commit order.
    pub fn metrics(&self) -> impl Iterator<Item = &MetricEvent> {
        self.properties.iter().filter_map(|p| match p {
            TestProperty::Metric(ev) => Some(ev),
            TestProperty::Status(_) => None,
        })
    }

    pub fn properties(&self) -> &[TestProperty] {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_keeps_commit_order_and_first_status() {
        let mut record = TestRecord::default();
        record.push(TestProperty::Metric(MetricEvent {
            name: "score".into(),
            value: json!(3),
            sort: None,
            format: None,
        }));
        record.push(TestProperty::Status(StatusEvent {
            category: "pass".into(),
            long: "PASS".into(),
            short: "P".into(),
            color: "cyan".into(),
        }));
        record.push(TestProperty::Status(StatusEvent {
            category: "fail".into(),
            long: "FAIL".into(),
            short: "F".into(),
            color: "red".into(),
        }));

        assert_eq!(record.status().unwrap().category, "pass");
        assert_eq!(record.metrics().count(), 1);
        assert_eq!(record.properties().len(), 3);
    }

    #[test]
    fn sort_order_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SortOrder::Desc).unwrap(), "\"desc\"");
        assert_eq!(
            serde_json::from_str::<SortOrder>("\"asc\"").unwrap(),
            SortOrder::Asc
        );
    }
}
