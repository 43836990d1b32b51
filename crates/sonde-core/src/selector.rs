//! Selectors: the external vocabulary by which a test or a run-wide option
//! requests instrumentation, and the module-path derivation used to match
//! them against handler scopes.

use crate::probe::SharedProbe;

/// A user-supplied request for instrumentation.
///
/// A name may be a plain convention name looked up in the handler registry,
/// a dotted/slashed direct reference to an instrumentation target, or a
/// comma-separated union of names.
#[derive(Clone)]
pub enum Selector {
    Name(String),
    /// An already-constructed probe, re-entered for every test it applies to.
    Object(SharedProbe),
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn object(probe: SharedProbe) -> Self {
        Self::Object(probe)
    }

    /// Display form used in error messages and reporter identity.
    pub fn display_name(&self) -> String {
        match self {
            Self::Name(n) => n.clone(),
            Self::Object(_) => "<probe object>".to_string(),
        }
    }

    /// De-duplication key: the raw name, or the object's allocation.
    pub(crate) fn dedup_key(&self) -> SelectorKey {
        match self {
            Self::Name(n) => SelectorKey::Name(n.clone()),
            Self::Object(p) => SelectorKey::Object(p.key()),
        }
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(n) => f.debug_tuple("Name").field(n).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SelectorKey {
    Name(String),
    Object(usize),
}

/// Ordered scope segments locating a test or a registry unit in the test
/// hierarchy.
pub type ScopePath = Vec<String>;

/// Module path of a test, derived from its dotted qualified module name.
pub fn module_path_of(qualified: &str) -> ScopePath {
    if qualified.is_empty() {
        return Vec::new();
    }
    qualified.split('.').map(str::to_string).collect()
}

/// Scope under which a registry unit supplies handlers: its own qualified
/// name minus its leaf segment.
pub fn scope_of(qualified: &str) -> ScopePath {
    let mut path = module_path_of(qualified);
    path.pop();
    path
}
