//! Per-test, per-probe facade for emitting status and metric events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::errors::{ProbeError, ProbeResult};
use crate::model::{MetricBroadcast, MetricEvent, SortOrder, StatusEvent, TestProperty, TestRecord};
use crate::stream::MetricStream;

type ConditionFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Handed to a probe handler when it is instantiated for a test. Carries
/// the test's identity and the sinks events are committed to. Lifetime is
/// one test's probe activation.
#[derive(Clone)]
pub struct Reporter {
    selector: String,
    location: String,
    record: Arc<Mutex<TestRecord>>,
    stream: Option<MetricStream>,
    status_committed: Arc<AtomicBool>,
}

impl Reporter {
    pub(crate) fn new(
        selector: impl Into<String>,
        location: impl Into<String>,
        record: Arc<Mutex<TestRecord>>,
        stream: Option<MetricStream>,
    ) -> Self {
        Self {
            selector: selector.into(),
            location: location.into(),
            record,
            stream,
            status_committed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Standalone reporter with its own record and no stream. Intended for
    /// exercising handlers outside a session.
    pub fn detached(selector: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(
            selector,
            location,
            Arc::new(Mutex::new(TestRecord::default())),
            None,
        )
    }

    /// Selector this reporter was resolved for.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// `"<file>::<test name>"` of the test under instrumentation.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn record(&self) -> Arc<Mutex<TestRecord>> {
        self.record.clone()
    }

    /// Build a one-shot status recorder. The first observed value that
    /// satisfies the condition commits a single status event; every later
    /// observation is a no-op for the remainder of the test.
    pub fn status(&self, long: impl Into<String>) -> StatusRecorder {
        StatusRecorder {
            reporter: self.clone(),
            long: long.into(),
            short: None,
            color: "cyan".to_string(),
            category: None,
            condition: Arc::new(|value| !matches!(value, Value::Bool(false))),
        }
    }

    /// Build a metric recorder committing one event per observation.
    pub fn metric(&self) -> MetricRecorder {
        MetricRecorder {
            reporter: self.clone(),
            name: None,
            sort: None,
            format: None,
        }
    }

    fn commit_status(&self, event: StatusEvent) {
        self.record
            .lock()
            .expect("test record lock")
            .push(TestProperty::Status(event));
    }

    fn commit_metric(&self, name: String, value: Value, sort: Option<SortOrder>, format: Option<String>) {
        if let Some(stream) = &self.stream {
            stream.push(MetricBroadcast {
                metric: name.clone(),
                value: value.clone(),
                location: self.location.clone(),
            });
        }
        self.record
            .lock()
            .expect("test record lock")
            .push(TestProperty::Metric(MetricEvent {
                name,
                value,
                sort,
                format,
            }));
    }
}

/// One-shot status recorder: first qualifying value wins.
pub struct StatusRecorder {
    reporter: Reporter,
    long: String,
    short: Option<String>,
    color: String,
    category: Option<String>,
    condition: Arc<ConditionFn>,
}

impl StatusRecorder {
    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Replace the default condition ("not the boolean false").
    pub fn when(mut self, condition: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Arc::new(condition);
        self
    }

    /// Feed a candidate value. Commits on the first value satisfying the
    /// condition; no-op once a status has been committed for this test's
    /// reporter.
    pub fn observe(&self, value: impl Into<Value>) {
        let value = value.into();
        if self.reporter.status_committed.load(Ordering::SeqCst) || !(self.condition)(&value) {
            return;
        }
        self.reporter.status_committed.store(true, Ordering::SeqCst);
        self.reporter.commit_status(StatusEvent {
            category: self
                .category
                .clone()
                .unwrap_or_else(|| self.long.to_lowercase()),
            long: self.long.clone(),
            short: self
                .short
                .clone()
                .unwrap_or_else(|| self.long.chars().take(1).collect()),
            color: self.color.clone(),
        });
    }
}

/// Metric recorder: one event per call, no deduplication.
pub struct MetricRecorder {
    reporter: Reporter,
    name: Option<String>,
    sort: Option<SortOrder>,
    format: Option<String>,
}

impl MetricRecorder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Value template for table rendering; `{}` is replaced by the value.
    pub fn format(mut self, template: impl Into<String>) -> Self {
        self.format = Some(template.into());
        self
    }

    /// Commit one metric event. Without an explicit name the value must be
    /// a single-entry mapping whose key is taken as the metric name.
    pub fn observe(&self, value: impl Into<Value>) -> ProbeResult<()> {
        let value = value.into();
        match &self.name {
            Some(name) => {
                self.reporter
                    .commit_metric(name.clone(), value, self.sort, self.format.clone());
                Ok(())
            }
            None => {
                let (name, value) = single_entry(value)?;
                self.reporter
                    .commit_metric(name, value, self.sort, self.format.clone());
                Ok(())
            }
        }
    }

    /// Commit a named payload directly. Rejected when an explicit name was
    /// also set: the name would be ambiguous.
    pub fn emit(&self, entries: impl Into<Value>) -> ProbeResult<()> {
        if let Some(name) = &self.name {
            return Err(ProbeError::AmbiguousMetric { name: name.clone() });
        }
        let (name, value) = single_entry(entries.into())?;
        self.reporter
            .commit_metric(name, value, self.sort, self.format.clone());
        Ok(())
    }
}

fn single_entry(value: Value) -> ProbeResult<(String, Value)> {
    match value {
        Value::Object(map) if map.len() == 1 => {
            let (name, value) = map.into_iter().next().expect("single entry");
            Ok((name, value))
        }
        other => Err(ProbeError::UnnamedMetric {
            got: other.to_string(),
        }),
    }
}
