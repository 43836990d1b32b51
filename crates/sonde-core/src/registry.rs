//! Handler registry: the run-start snapshot of handler-providing units.
//!
//! Each unit is the explicit equivalent of a per-directory local-config
//! module: it names its own qualified module and supplies probe handlers
//! and summary builders keyed by plain selector name. A unit's handlers
//! apply to every test whose module path sits under the unit's scope.

use std::collections::HashMap;

use crate::probe::Handler;
use crate::report::summary::SummaryBuilder;
use crate::selector::{scope_of, ScopePath};

/// One handler-providing unit, scoped to its own module path minus its
/// leaf segment.
pub struct RegistryUnit {
    qualified: String,
    scope: ScopePath,
    probes: HashMap<String, Handler>,
    summaries: HashMap<String, SummaryBuilder>,
}

impl RegistryUnit {
    /// `qualified` is the unit's dotted module name, e.g. `"pkg.sub.conftest"`;
    /// the unit then supplies handlers for tests under `pkg.sub`.
    pub fn new(qualified: impl Into<String>) -> Self {
        let qualified = qualified.into();
        let scope = scope_of(&qualified);
        Self {
            qualified,
            scope,
            probes: HashMap::new(),
            summaries: HashMap::new(),
        }
    }

    /// Register a probe handler under a selector name.
    pub fn probe(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.probes.insert(name.into(), handler);
        self
    }

    /// Register a summary builder under a selector name.
    pub fn summary(mut self, name: impl Into<String>, builder: SummaryBuilder) -> Self {
        self.summaries.insert(name.into(), builder);
        self
    }

    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub(crate) fn probe_handler(&self, name: &str) -> Option<Handler> {
        self.probes.get(name).cloned()
    }

    pub(crate) fn summary_builder(&self, name: &str) -> Option<SummaryBuilder> {
        self.summaries.get(name).cloned()
    }
}

/// All units discovered for one run. Populated before the session starts
/// and never mutated afterwards; resolution tables are memoized against it.
#[derive(Default)]
pub struct HandlerRegistry {
    units: Vec<RegistryUnit>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(mut self, unit: RegistryUnit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn push(&mut self, unit: RegistryUnit) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[RegistryUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}
