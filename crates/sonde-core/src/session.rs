//! Run-scoped session state and the per-test activation flow.
//!
//! One `Session` exists per test-run invocation. It owns the handler
//! registry snapshot, the selector finders and their caches, the run-wide
//! metric stream, the retained summary set and the post-hoc metric table.
//! The host runner drives it through five lifecycle points: start, per-test
//! setup, the wrapped test call, finish, and the terminal summary.

use std::io::Write;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::{detect_terminal_width, SessionOptions};
use crate::errors::{ProbeError, ProbeResult};
use crate::lifecycle::ProbeSet;
use crate::model::{MetricEvent, StatusEvent, TestRecord};
use crate::probe::{Handler, ProbeScope};
use crate::registry::HandlerRegistry;
use crate::report::summary::{SummaryBuilder, SummarySet};
use crate::report::table::MetricTable;
use crate::reporter::Reporter;
use crate::resolver::{Finder, ResolutionTable};
use crate::selector::{module_path_of, ScopePath, Selector};
use crate::stream::MetricStream;

/// One test, as the host runner presents it: identity, location and any
/// per-test selectors declared on it (the marker mechanism).
pub struct TestItem {
    file: String,
    name: String,
    module: String,
    selectors: Vec<Selector>,
    record: Arc<Mutex<TestRecord>>,
}

impl TestItem {
    /// `file` is the test's source path, `name` its display name, `module`
    /// its dotted qualified module name.
    pub fn new(
        file: impl Into<String>,
        name: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
            module: module.into(),
            selectors: Vec::new(),
            record: Arc::new(Mutex::new(TestRecord::default())),
        }
    }

    /// Declare additional selectors for this test, appended after the
    /// run-wide defaults.
    pub fn use_probes(mut self, selectors: impl IntoIterator<Item = Selector>) -> Self {
        self.selectors.extend(selectors);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"<file>::<test name>"`, the identity metrics are tagged with.
    pub fn location(&self) -> String {
        format!("{}::{}", self.file, self.name)
    }

    pub fn module_path(&self) -> ScopePath {
        module_path_of(&self.module)
    }

    /// First committed status event, if any probe set one.
    pub fn status(&self) -> Option<StatusEvent> {
        self.record.lock().expect("test record lock").status().cloned()
    }

    /// Snapshot of the metric events committed so far.
    pub fn metrics(&self) -> Vec<MetricEvent> {
        self.record
            .lock()
            .expect("test record lock")
            .metrics()
            .cloned()
            .collect()
    }

    /// Reporter bound to this test's record, with no stream attached.
    /// For hosts emitting events outside a session-managed activation.
    pub fn reporter(&self, selector: impl Into<String>) -> Reporter {
        Reporter::new(selector, self.location(), self.record.clone(), None)
    }

    fn record_handle(&self) -> Arc<Mutex<TestRecord>> {
        self.record.clone()
    }
}

/// Process-wide state for one run. Opened at run start, closed at run end;
/// nested or concurrent runs are not supported.
pub struct Session {
    registry: HandlerRegistry,
    probe_finder: Finder<Handler>,
    summary_finder: Finder<SummaryBuilder>,
    defaults: Vec<Selector>,
    stream: MetricStream,
    streaming: bool,
    summaries: SummarySet,
    table: MetricTable,
    width: usize,
}

impl Session {
    /// Capture configuration and the handler-registry snapshot, and open
    /// the run-wide metric stream.
    pub fn start(options: SessionOptions, registry: HandlerRegistry) -> Self {
        let width = options.terminal_width.unwrap_or_else(detect_terminal_width);
        let defaults: Vec<Selector> = options.probes.iter().map(Selector::name).collect();

        let probe_finder = match options.instrument {
            Some(instrument) => {
                Finder::new(|unit, name| unit.probe_handler(name)).with_default(move |target| {
                    let instrument = instrument.clone();
                    let target = target.to_string();
                    Handler::new(move |reporter| instrument.display_probe(&target, reporter))
                })
            }
            None => Finder::new(|unit, name| unit.probe_handler(name)),
        };
        let summary_finder = Finder::new(|unit, name| unit.summary_builder(name));

        info!(
            units = registry.len(),
            probes = defaults.len(),
            "probe session started"
        );
        Self {
            registry,
            probe_finder,
            summary_finder,
            defaults,
            stream: MetricStream::open(),
            streaming: options.streaming,
            summaries: SummarySet::new(width),
            table: MetricTable::new(),
            width,
        }
    }

    /// Run-wide metric stream handle.
    pub fn stream(&self) -> &MetricStream {
        &self.stream
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Effective selectors for a test: run-wide defaults extended by the
    /// test's own, de-duplicated preserving first occurrence.
    fn effective_selectors(&self, item: &TestItem) -> Vec<Selector> {
        let mut seen = std::collections::HashSet::new();
        self.defaults
            .iter()
            .chain(item.selectors.iter())
            .filter(|sel| seen.insert(sel.dedup_key()))
            .cloned()
            .collect()
    }

    /// Resolve and enter this test's probes. Fails before the test body
    /// runs when a selector resolves to nothing at all, or when a probe
    /// cannot be constructed or entered.
    pub fn setup(&mut self, item: &TestItem) -> ProbeResult<ProbeSet> {
        let module_path = item.module_path();
        let location = item.location();
        let mut resolved: Vec<(String, Box<dyn ProbeScope>)> = Vec::new();

        for selector in self.effective_selectors(item) {
            let display = selector.display_name();
            let (handler, summary) = match &selector {
                Selector::Name(name) => (
                    self.probe_finder.resolve(&self.registry, name, &module_path),
                    self.summary_finder.resolve(&self.registry, name, &module_path),
                ),
                Selector::Object(probe) => (
                    ResolutionTable::single(Handler::for_object(probe.clone()))
                        .most_specific(&module_path)
                        .cloned(),
                    None,
                ),
            };

            if handler.is_none() && summary.is_none() {
                return Err(ProbeError::unresolved(display));
            }
            if let Some(builder) = summary {
                self.summaries.require(&self.stream, &builder)?;
            }
            if let Some(handler) = handler {
                let reporter = Reporter::new(
                    display.clone(),
                    location.clone(),
                    item.record_handle(),
                    self.streaming.then(|| self.stream.clone()),
                );
                let scope = handler.invoke(reporter)?;
                resolved.push((display, scope));
            }
        }

        debug!(test = %location, probes = resolved.len(), "probes resolved");
        let mut probes = ProbeSet::new(resolved);
        probes.enter_all()?;
        Ok(probes)
    }

    /// Drive the test body with unconditional teardown: probes exit in
    /// entry order whether the body returns or panics, and a body panic is
    /// resumed after teardown.
    pub fn call<R>(&self, probes: ProbeSet, body: impl FnOnce() -> R) -> ProbeResult<R> {
        let outcome = catch_unwind(AssertUnwindSafe(body));
        let teardown = probes.teardown();
        match outcome {
            Ok(value) => {
                teardown?;
                Ok(value)
            }
            Err(panic) => {
                if let Err(err) = teardown {
                    warn!(error = %err, "probe teardown failed after test body panic");
                }
                resume_unwind(panic)
            }
        }
    }

    /// Status classification for the host's pass/fail/category display.
    pub fn test_status(&self, item: &TestItem) -> Option<StatusEvent> {
        item.status()
    }

    /// Fold the test's committed metric events into the run-wide metric
    /// table.
    pub fn collect(&mut self, item: &TestItem) {
        let location = item.location();
        for event in item.metrics() {
            self.table.record(&location, &event);
        }
    }

    /// Close the run-wide stream. Pushes after this point are dropped.
    pub fn finish(&mut self) {
        self.stream.close();
        info!("probe session finished");
    }

    /// Finalize and print every retained summary, then one table per
    /// accumulated metric. Output order is deterministic: summaries in
    /// require order, metrics in name order.
    pub fn terminal_summary<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        self.summaries.dump(out)?;
        for line in self.table.render(self.width) {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SharedProbe;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options() -> SessionOptions {
        SessionOptions::new().terminal_width(40)
    }

    #[test]
    fn defaults_and_markers_dedup_preserving_first_occurrence() {
        let registry = HandlerRegistry::new().unit(
            RegistryUnitFixture::unit(&["foo", "bar"]),
        );
        let session = Session::start(options().probe("foo").probe("bar"), registry);
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod")
            .use_probes([Selector::name("bar"), Selector::name("foo")]);

        let effective = session.effective_selectors(&item);
        let names: Vec<_> = effective.iter().map(Selector::display_name).collect();
        assert_eq!(names, ["foo", "bar"]);
    }

    #[test]
    fn unresolved_selector_fails_setup_before_the_body() {
        let mut session = Session::start(options().probe("missing"), HandlerRegistry::new());
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod");
        let err = session.setup(&item).unwrap_err();
        assert!(matches!(err, ProbeError::UnresolvedSelector { selector } if selector == "missing"));
    }

    #[test]
    fn object_selectors_activate_without_the_registry() {
        struct Marking(Arc<AtomicUsize>);
        impl ProbeScope for Marking {
            fn enter(&mut self) -> ProbeResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn exit(&mut self) -> ProbeResult<()> {
                Ok(())
            }
        }

        let entered = Arc::new(AtomicUsize::new(0));
        let shared = SharedProbe::new(Marking(entered.clone()));
        let mut session = Session::start(options(), HandlerRegistry::new());
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod")
            .use_probes([Selector::object(shared)]);

        let probes = session.setup(&item).unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(entered.load(Ordering::SeqCst), 1);
        session.call(probes, || {}).unwrap();
    }

    #[test]
    fn statuses_flow_to_the_host_classification() {
        let registry = HandlerRegistry::new().unit(
            crate::registry::RegistryUnit::new("pkg.conftest").probe(
                "outcome",
                Handler::two_phase(
                    |reporter: &Reporter| {
                        reporter.status("PASS").observe(true);
                        Ok(())
                    },
                    |_state, _reporter| Ok(()),
                ),
            ),
        );
        let mut session = Session::start(options().probe("outcome"), registry);
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod");

        let probes = session.setup(&item).unwrap();
        session.call(probes, || {}).unwrap();

        let status = session.test_status(&item).unwrap();
        assert_eq!(status.category, "pass");
        assert_eq!(status.short, "P");
        assert!(item.metrics().is_empty());
    }

    #[test]
    fn collected_metrics_render_as_tables() {
        let mut session = Session::start(options(), HandlerRegistry::new());
        let item = TestItem::new("tests/a.rs", "t1", "pkg.mod");
        {
            let reporter = Reporter::new(
                "probe",
                item.location(),
                item.record_handle(),
                None,
            );
            reporter.metric().name("score").observe(json!(7)).unwrap();
        }
        session.collect(&item);
        session.finish();

        let mut out = Vec::new();
        session.terminal_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("score"));
        assert!(text.contains("tests/a.rs::t1  7"));
    }

    /// Helper building a unit that supplies inert probes for the given
    /// names under the root scope.
    struct RegistryUnitFixture;

    impl RegistryUnitFixture {
        fn unit(names: &[&str]) -> crate::registry::RegistryUnit {
            let mut unit = crate::registry::RegistryUnit::new("conftest");
            for name in names {
                unit = unit.probe(*name, Handler::two_phase(|_r| Ok(()), |_s, _r| Ok(())));
            }
            unit
        }
    }
}
