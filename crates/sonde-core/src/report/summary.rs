//! Deduplicated, run-scoped summaries.
//!
//! A summary builder runs at most once per run, keyed by the identity of
//! its underlying function. Two-phase builders split into a setup part
//! (run at require time: subscribe to the stream, write headers) and a
//! retained finalizer (run once at dump time).

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::errors::ProbeResult;
use crate::stream::MetricStream;

/// A body line: plain text, or a location/value pair rendered right-aligned
/// to the terminal width.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SummaryLine {
    Text(String),
    Entry { location: String, value: String },
}

/// Mutable header/body/footer line buffers, finalized and printed exactly
/// once at run end.
pub struct Summary {
    width: usize,
    header: Vec<String>,
    lines: Vec<SummaryLine>,
    footer: Vec<String>,
}

impl Summary {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            width,
            header: Vec::new(),
            lines: Vec::new(),
            footer: Vec::new(),
        }
    }

    /// Configured terminal width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame the block with full-width rules around a title, plus a
    /// closing footer rule.
    pub fn title(&mut self, title: impl Into<String>) {
        let rule = "~".repeat(self.width);
        self.header(rule.clone());
        self.header(title);
        self.header(rule.clone());
        self.footer(rule);
    }

    pub fn header(&mut self, line: impl Into<String>) {
        self.header.push(line.into());
    }

    /// Append a plain body line.
    pub fn log(&mut self, line: impl Into<String>) {
        self.lines.push(SummaryLine::Text(line.into()));
    }

    /// Append a location/value body line: the value ends at the terminal
    /// width, the location is left-padded to fill the remaining columns.
    pub fn entry(&mut self, location: impl Into<String>, value: impl ToString) {
        self.lines.push(SummaryLine::Entry {
            location: location.into(),
            value: value.to_string(),
        });
    }

    pub fn footer(&mut self, line: impl Into<String>) {
        self.footer.push(line.into());
    }

    /// Rendered lines: header, then body, then footer.
    pub fn render(&self) -> Vec<String> {
        let mut out = self.header.clone();
        out.extend(self.lines.iter().map(|line| match line {
            SummaryLine::Text(text) => text.clone(),
            SummaryLine::Entry { location, value } => {
                let pad = self.width.saturating_sub(value.len());
                format!("{location:<pad$}{value}")
            }
        }));
        out.extend(self.footer.iter().cloned());
        out
    }

    pub(crate) fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for line in self.render() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

type SetupFn =
    dyn Fn(&MetricStream, &mut Summary) -> ProbeResult<Option<FinalizeFn>> + Send + Sync;

/// Retained part of a two-phase builder, run once at dump time.
pub type FinalizeFn = Box<dyn FnOnce(&mut Summary) -> ProbeResult<()> + Send>;

/// A run-scoped summary builder. Identity (for per-run deduplication) is
/// the allocation of the underlying function: clones share it, separately
/// constructed builders do not.
#[derive(Clone)]
pub struct SummaryBuilder {
    setup: Arc<SetupFn>,
}

impl SummaryBuilder {
    /// Two-phase builder: the closure runs at require time and may return
    /// a finalizer to run at dump time.
    pub fn new(
        setup: impl Fn(&MetricStream, &mut Summary) -> ProbeResult<Option<FinalizeFn>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            setup: Arc::new(setup),
        }
    }

    /// One-phase builder with no finalizer.
    pub fn simple(
        setup: impl Fn(&MetricStream, &mut Summary) -> ProbeResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |stream, summary| {
            setup(stream, summary)?;
            Ok(None)
        })
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.setup) as *const () as usize
    }
}

struct RetainedSummary {
    summary: Summary,
    finalize: Option<FinalizeFn>,
}

/// The live summary set for one run: at most one summary per builder
/// identity, rendered in require order.
pub struct SummarySet {
    width: usize,
    seen: HashSet<usize>,
    retained: Vec<RetainedSummary>,
}

impl SummarySet {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            width,
            seen: HashSet::new(),
            retained: Vec::new(),
        }
    }

    /// Ensure a builder has run; repeated requests for the same builder
    /// identity are no-ops.
    pub fn require(&mut self, stream: &MetricStream, builder: &SummaryBuilder) -> ProbeResult<()> {
        let key = builder.key();
        if !self.seen.insert(key) {
            debug!(key, "summary builder already retained");
            return Ok(());
        }
        let mut summary = Summary::new(self.width);
        let finalize = (builder.setup)(stream, &mut summary)?;
        self.retained.push(RetainedSummary { summary, finalize });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Finalize and print every retained summary, in require order. Each
    /// summary is finalized at most once.
    pub(crate) fn dump<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        for retained in &mut self.retained {
            if let Some(finalize) = retained.finalize.take() {
                finalize(&mut retained.summary)?;
            }
            retained.summary.dump(out)?;
        }
        Ok(())
    }
}
