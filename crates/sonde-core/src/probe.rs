//! The probe capability contract and the handler kinds that produce it.
//!
//! A handler is a factory `Reporter -> ProbeScope`. Heterogeneous handler
//! shapes (plain factories, two-phase enter/exit pairs, hook bridges to an
//! external instrumentation layer, pre-built shared probes) are normalized
//! to the scoped contract at registration time.

use std::sync::{Arc, Mutex};

use crate::errors::{ProbeError, ProbeResult};
use crate::reporter::Reporter;

/// Scoped probe lifecycle for one test: an explicit enter and an explicit
/// exit. Exit receives no information about the test body's outcome.
pub trait ProbeScope: Send {
    fn enter(&mut self) -> ProbeResult<()>;
    fn exit(&mut self) -> ProbeResult<()>;
}

type FactoryFn = dyn Fn(Reporter) -> ProbeResult<Box<dyn ProbeScope>> + Send + Sync;

/// Enter or exit half of a hook-bridged probe.
pub type Hook = Arc<dyn Fn(&Reporter) -> ProbeResult<()> + Send + Sync>;

/// A registered probe handler: given a per-test [`Reporter`], produces a
/// fresh activatable probe.
#[derive(Clone)]
pub struct Handler {
    factory: Arc<FactoryFn>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

impl Handler {
    /// Fallible factory returning a boxed scope.
    pub fn new(
        factory: impl Fn(Reporter) -> ProbeResult<Box<dyn ProbeScope>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Plain activatable factory.
    pub fn scoped<P: ProbeScope + 'static>(
        factory: impl Fn(Reporter) -> P + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |reporter| Ok(Box::new(factory(reporter)) as Box<dyn ProbeScope>))
    }

    /// Two-phase factory: `enter` runs before the test body and produces
    /// state, `exit` consumes it afterwards. This is the adapted form of a
    /// handler written as a single-suspension routine.
    pub fn two_phase<T: Send + 'static>(
        enter: impl Fn(&Reporter) -> ProbeResult<T> + Send + Sync + 'static,
        exit: impl Fn(T, &Reporter) -> ProbeResult<()> + Send + Sync + 'static,
    ) -> Self {
        let enter = Arc::new(enter);
        let exit = Arc::new(exit);
        Self::new(move |reporter| {
            Ok(Box::new(TwoPhaseScope {
                reporter,
                enter: enter.clone(),
                exit: exit.clone(),
                state: None,
            }) as Box<dyn ProbeScope>)
        })
    }

    /// Bridge a probe whose halves come from an external instrumentation
    /// layer. Both halves are required; a missing one is rejected here,
    /// at registration.
    pub fn from_hooks(name: &str, enter: Option<Hook>, exit: Option<Hook>) -> ProbeResult<Self> {
        let (Some(enter), Some(exit)) = (enter, exit) else {
            return Err(ProbeError::MalformedHandler {
                name: name.to_string(),
            });
        };
        Ok(Self::new(move |reporter| {
            Ok(Box::new(HookScope {
                reporter,
                enter: enter.clone(),
                exit: exit.clone(),
            }) as Box<dyn ProbeScope>)
        }))
    }

    /// Handler that re-enters an already-constructed shared probe.
    pub(crate) fn for_object(probe: SharedProbe) -> Self {
        Self::new(move |_reporter| Ok(Box::new(probe.clone()) as Box<dyn ProbeScope>))
    }

    /// Instantiate the handler's probe for one test.
    pub fn invoke(&self, reporter: Reporter) -> ProbeResult<Box<dyn ProbeScope>> {
        (self.factory)(reporter)
    }
}

struct TwoPhaseScope<T> {
    reporter: Reporter,
    enter: Arc<dyn Fn(&Reporter) -> ProbeResult<T> + Send + Sync>,
    exit: Arc<dyn Fn(T, &Reporter) -> ProbeResult<()> + Send + Sync>,
    state: Option<T>,
}

impl<T: Send> ProbeScope for TwoPhaseScope<T> {
    fn enter(&mut self) -> ProbeResult<()> {
        self.state = Some((self.enter)(&self.reporter)?);
        Ok(())
    }

    fn exit(&mut self) -> ProbeResult<()> {
        match self.state.take() {
            Some(state) => (self.exit)(state, &self.reporter),
            // exit without a successful enter is a no-op
            None => Ok(()),
        }
    }
}

struct HookScope {
    reporter: Reporter,
    enter: Hook,
    exit: Hook,
}

impl ProbeScope for HookScope {
    fn enter(&mut self) -> ProbeResult<()> {
        (self.enter)(&self.reporter)
    }

    fn exit(&mut self) -> ProbeResult<()> {
        (self.exit)(&self.reporter)
    }
}

/// A pre-built probe usable as a [`Selector::Object`]. The same underlying
/// probe is re-entered for every test it applies to.
///
/// [`Selector::Object`]: crate::selector::Selector::Object
#[derive(Clone)]
pub struct SharedProbe {
    inner: Arc<Mutex<dyn ProbeScope>>,
}

impl SharedProbe {
    pub fn new(probe: impl ProbeScope + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(probe)),
        }
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl ProbeScope for SharedProbe {
    fn enter(&mut self) -> ProbeResult<()> {
        self.inner.lock().expect("shared probe lock").enter()
    }

    fn exit(&mut self) -> ProbeResult<()> {
        self.inner.lock().expect("shared probe lock").exit()
    }
}

/// The opaque instrumentation layer: turns a dotted target reference into a
/// displayable/inspectable probe satisfying the scoped contract. Direct
/// target-reference selectors are built through this.
pub trait Instrument: Send + Sync {
    fn display_probe(&self, target: &str, reporter: Reporter) -> ProbeResult<Box<dyn ProbeScope>>;
}
