//! Selector resolution.
//!
//! Builds a resolution table per selector with the following shapes:
//! 1. Pre-built probe object: trivial table at the empty prefix.
//! 2. Name containing `.` or `/`: a direct instrumentation-target
//!    reference, resolved through the finder's default constructor (empty
//!    table when no default is configured).
//! 3. Name containing `,`: union of the constituent names' tables, later
//!    entries winning on prefix collision.
//! 4. Plain name: registry scan, one entry per unit that supplies the
//!    name, keyed by the unit's scope.
//!
//! Tables for name selectors are memoized for the remainder of the run;
//! the registry is assumed frozen after session start.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::registry::{HandlerRegistry, RegistryUnit};
use crate::selector::ScopePath;

/// Mapping from module-path prefix to handler for one selector. Never
/// mutated after first construction.
pub(crate) struct ResolutionTable<H> {
    entries: HashMap<ScopePath, H>,
}

impl<H: Clone> ResolutionTable<H> {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Trivial table: one handler at the empty prefix.
    pub(crate) fn single(handler: H) -> Self {
        let mut entries = HashMap::new();
        entries.insert(Vec::new(), handler);
        Self { entries }
    }

    fn insert(&mut self, prefix: ScopePath, handler: H) {
        self.entries.insert(prefix, handler);
    }

    fn merge(&mut self, other: &Self) {
        for (prefix, handler) in &other.entries {
            self.entries.insert(prefix.clone(), handler.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most-specific applicable entry for a test's module path. Candidate
    /// prefixes are strictly ancestor scopes: the path with its last 1..=N
    /// trailing segments dropped, in that order. The full path itself is
    /// never a candidate, and an empty module path has no candidates.
    pub(crate) fn most_specific(&self, module_path: &[String]) -> Option<&H> {
        for dropped in 1..=module_path.len() {
            let prefix = &module_path[..module_path.len() - dropped];
            if let Some(handler) = self.entries.get(prefix) {
                return Some(handler);
            }
        }
        None
    }
}

type LookupFn<H> = dyn Fn(&RegistryUnit, &str) -> Option<H> + Send + Sync;
type DefaultFn<H> = dyn Fn(&str) -> H + Send + Sync;

/// Name-selector resolver with a per-selector memoization cache. One
/// finder exists per handler kind (probe handlers, summary builders).
pub(crate) struct Finder<H> {
    lookup: Box<LookupFn<H>>,
    default: Option<Box<DefaultFn<H>>>,
    cache: Mutex<HashMap<String, Arc<ResolutionTable<H>>>>,
}

impl<H: Clone> Finder<H> {
    pub(crate) fn new(lookup: impl Fn(&RegistryUnit, &str) -> Option<H> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
            default: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_default(mut self, default: impl Fn(&str) -> H + Send + Sync + 'static) -> Self {
        self.default = Some(Box::new(default));
        self
    }

    /// Resolution table for a name selector, memoized per raw selector
    /// string.
    pub(crate) fn find(&self, registry: &HandlerRegistry, name: &str) -> Arc<ResolutionTable<H>> {
        if let Some(table) = self.cache.lock().expect("selector cache lock").get(name) {
            return table.clone();
        }
        let table = Arc::new(self.build(registry, name));
        debug!(selector = name, entries = table.len(), "built resolution table");
        self.cache
            .lock()
            .expect("selector cache lock")
            .entry(name.to_string())
            .or_insert(table)
            .clone()
    }

    fn build(&self, registry: &HandlerRegistry, name: &str) -> ResolutionTable<H> {
        if name.contains('.') || name.contains('/') {
            return match &self.default {
                Some(default) => ResolutionTable::single(default(name)),
                None => ResolutionTable::empty(),
            };
        }
        if name.contains(',') {
            let mut merged = ResolutionTable::empty();
            for part in name.split(',') {
                merged.merge(&self.find(registry, part));
            }
            return merged;
        }
        let mut table = ResolutionTable::empty();
        for unit in registry.units() {
            if let Some(handler) = (self.lookup)(unit, name) {
                table.insert(unit.scope().to_vec(), handler);
            }
        }
        table
    }

    /// Most-specific handler for a name selector against a test's module
    /// path, or `None` when nothing applies.
    pub(crate) fn resolve(
        &self,
        registry: &HandlerRegistry,
        name: &str,
        module_path: &[String],
    ) -> Option<H> {
        self.find(registry, name).most_specific(module_path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(units: Vec<RegistryUnit>) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        for unit in units {
            registry.push(unit);
        }
        registry
    }

    /// Finder over plain strings: a unit "supplies" any name, tagged with
    /// its qualified module, so tests can see which unit won.
    fn tagging_finder() -> Finder<String> {
        Finder::new(|unit: &RegistryUnit, name: &str| Some(format!("{}:{}", unit.qualified(), name)))
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn most_specific_prefix_wins() {
        let registry = registry(vec![
            RegistryUnit::new("a.b.conftest"),
            RegistryUnit::new("conftest"),
        ]);
        let finder = tagging_finder();

        let hit = finder.resolve(&registry, "probe", &path(&["a", "b", "c"])).unwrap();
        assert_eq!(hit, "a.b.conftest:probe");

        let hit = finder.resolve(&registry, "probe", &path(&["x"])).unwrap();
        assert_eq!(hit, "conftest:probe");
    }

    #[test]
    fn the_full_module_path_is_not_a_candidate_prefix() {
        // Handler scoped at ("a","b") must not apply to a test whose module
        // path is exactly ("a","b"): only strict ancestors are tried.
        let mut table = ResolutionTable::empty();
        table.insert(path(&["a", "b"]), "deep");
        assert!(table.most_specific(&path(&["a", "b"])).is_none());
        assert_eq!(table.most_specific(&path(&["a", "b", "c"])), Some(&"deep"));
    }

    #[test]
    fn empty_module_path_resolves_to_nothing() {
        let table = ResolutionTable::single("root");
        assert!(table.most_specific(&[]).is_none());
        assert_eq!(table.most_specific(&path(&["m"])), Some(&"root"));
    }

    #[test]
    fn resolution_tables_are_memoized_per_selector() {
        let scans = Arc::new(AtomicUsize::new(0));
        let counter = scans.clone();
        let finder = Finder::new(move |_unit: &RegistryUnit, name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(name.to_string())
        });
        let registry = registry(vec![RegistryUnit::new("pkg.conftest")]);

        let first = finder.find(&registry, "foo");
        let second = finder.find(&registry, "foo");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(scans.load(Ordering::SeqCst), 1);

        finder.find(&registry, "bar");
        assert_eq!(scans.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn direct_reference_never_consults_the_registry() {
        let scans = Arc::new(AtomicUsize::new(0));
        let counter = scans.clone();
        let finder = Finder::new(move |_unit: &RegistryUnit, name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(name.to_string())
        })
        .with_default(|target| format!("display:{}", target));
        let registry = registry(vec![RegistryUnit::new("pkg.conftest")]);

        let table = finder.find(&registry, "my_mod.my_fn");
        assert_eq!(table.len(), 1);
        assert_eq!(scans.load(Ordering::SeqCst), 0);

        let hit = finder
            .resolve(&registry, "path/to/fn", &path(&["pkg", "mod"]))
            .unwrap();
        assert_eq!(hit, "display:path/to/fn");
    }

    #[test]
    fn direct_reference_without_a_default_is_empty() {
        let finder: Finder<String> = Finder::new(|_unit, _name| None);
        let registry = registry(vec![]);
        assert!(finder.find(&registry, "a.b").is_empty());
    }

    #[test]
    fn comma_union_merges_constituent_tables() {
        let registry = registry(vec![RegistryUnit::new("pkg.conftest")]);
        let finder = Finder::new(|unit: &RegistryUnit, name: &str| match name {
            "x" | "y" => Some(format!("{}:{}", unit.qualified(), name)),
            _ => None,
        });

        // "x" and "y" land on the same prefix key; the later entry wins.
        let table = finder.find(&registry, "x,y");
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.most_specific(&path(&["pkg", "mod"])),
            Some(&"pkg.conftest:y".to_string())
        );

        // Constituents are resolved independently and cached under their
        // own raw names too.
        assert!(!finder.find(&registry, "x").is_empty());
    }
}
