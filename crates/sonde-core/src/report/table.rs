//! Post-hoc metric tables: the rendering mode used when summaries are
//! derived from metric events accumulated off test records rather than
//! from a live stream subscription.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{MetricEvent, SortOrder};
use crate::report::summary::Summary;

#[derive(Default)]
struct MetricColumn {
    sort: Option<SortOrder>,
    format: Option<String>,
    /// One row per test location, in first-observation order; a later
    /// value for the same location overwrites.
    rows: Vec<(String, Value)>,
}

impl MetricColumn {
    fn record(&mut self, location: &str, event: &MetricEvent) {
        if self.sort.is_none() {
            self.sort = event.sort;
        }
        if self.format.is_none() {
            self.format = event.format.clone();
        }
        match self.rows.iter_mut().find(|(loc, _)| loc == location) {
            Some((_, value)) => *value = event.value.clone(),
            None => self.rows.push((location.to_string(), event.value.clone())),
        }
    }

    fn ordered_rows(&self) -> Vec<(String, Value)> {
        let mut rows = self.rows.clone();
        match self.sort {
            Some(SortOrder::Desc) => rows.sort_by(|a, b| cmp_values(&b.1, &a.1)),
            Some(SortOrder::Asc) => rows.sort_by(|a, b| cmp_values(&a.1, &b.1)),
            None => {}
        }
        rows
    }
}

/// Run-wide accumulation of metric events, grouped by metric name and then
/// by test location. Rendered as one titled block per metric at run end.
#[derive(Default)]
pub struct MetricTable {
    columns: BTreeMap<String, MetricColumn>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, location: &str, event: &MetricEvent) {
        self.columns
            .entry(event.name.clone())
            .or_default()
            .record(location, event);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// One framed block per metric name (lexicographic order). Rows are
    /// ordered per the metric's declared sort and left-justified to the
    /// longest location plus two columns.
    pub fn render(&self, width: usize) -> Vec<String> {
        let mut out = Vec::new();
        for (name, column) in &self.columns {
            let mut block = Summary::new(width);
            block.title(name.clone());
            let rows = column.ordered_rows();
            let col = rows.iter().map(|(loc, _)| loc.len()).max().unwrap_or(0) + 2;
            for (location, value) in rows {
                let value = apply_format(column.format.as_deref(), &value);
                block.log(format!("{location:<col$}{value}"));
            }
            out.extend(block.render());
        }
        out
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply_format(template: Option<&str>, value: &Value) -> String {
    let rendered = display_value(value);
    match template {
        Some(template) if template.contains("{}") => template.replace("{}", &rendered),
        Some(template) => format!("{template}{rendered}"),
        None => rendered,
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => display_value(a).cmp(&display_value(b)),
    }
}
