//! Scoped activation of a test's probes: symmetric enter/exit around the
//! test body, with teardown guaranteed regardless of the body's outcome.

use tracing::{debug, warn};

use crate::errors::{ProbeError, ProbeResult};
use crate::probe::ProbeScope;

struct ActiveProbe {
    selector: String,
    scope: Box<dyn ProbeScope>,
    entered: bool,
}

/// The per-test set of activated probes. State machine per probe:
/// resolved, entered, exited; probes are never re-entered and never shared
/// across tests.
pub struct ProbeSet {
    probes: Vec<ActiveProbe>,
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSet")
            .field("len", &self.probes.len())
            .finish()
    }
}

impl ProbeSet {
    pub(crate) fn new(probes: Vec<(String, Box<dyn ProbeScope>)>) -> Self {
        Self {
            probes: probes
                .into_iter()
                .map(|(selector, scope)| ActiveProbe {
                    selector,
                    scope,
                    entered: false,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Enter every probe in resolution order. When an enter fails, probes
    /// already entered are exited before the error propagates.
    pub(crate) fn enter_all(&mut self) -> ProbeResult<()> {
        for index in 0..self.probes.len() {
            let probe = &mut self.probes[index];
            debug!(selector = %probe.selector, "entering probe");
            if let Err(err) = probe.scope.enter() {
                self.unwind(index);
                return Err(err);
            }
            self.probes[index].entered = true;
        }
        Ok(())
    }

    fn unwind(&mut self, failed: usize) {
        for probe in self.probes[..failed].iter_mut() {
            if !probe.entered {
                continue;
            }
            probe.entered = false;
            if let Err(err) = probe.scope.exit() {
                warn!(selector = %probe.selector, error = %err, "probe exit failed during unwind");
            }
        }
    }

    /// Exit every entered probe in the same order they were entered,
    /// treating the test body's outcome as opaque. An empty-reduction exit
    /// failure is downgraded to a warning; any other failure propagates.
    pub fn teardown(mut self) -> ProbeResult<()> {
        for probe in &mut self.probes {
            if !probe.entered {
                continue;
            }
            probe.entered = false;
            debug!(selector = %probe.selector, "exiting probe");
            match probe.scope.exit() {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(
                        selector = %probe.selector,
                        error = %err,
                        "probe attempted a reduction with no elements"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_enter: bool,
        exit_error: Option<fn() -> ProbeError>,
    }

    impl Scripted {
        fn probe(
            name: &'static str,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> (String, Box<dyn ProbeScope>) {
            (
                name.to_string(),
                Box::new(Self {
                    name,
                    log: log.clone(),
                    fail_enter: false,
                    exit_error: None,
                }),
            )
        }
    }

    impl ProbeScope for Scripted {
        fn enter(&mut self) -> ProbeResult<()> {
            if self.fail_enter {
                return Err(ProbeError::failure("enter failed"));
            }
            self.log.lock().unwrap().push(format!("enter {}", self.name));
            Ok(())
        }

        fn exit(&mut self) -> ProbeResult<()> {
            self.log.lock().unwrap().push(format!("exit {}", self.name));
            match self.exit_error {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn probes_enter_and_exit_in_resolution_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = ProbeSet::new(vec![
            Scripted::probe("a", &log),
            Scripted::probe("b", &log),
        ]);
        set.enter_all().unwrap();
        set.teardown().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter a", "enter b", "exit a", "exit b"]
        );
    }

    #[test]
    fn failed_enter_unwinds_already_entered_probes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (first_name, first) = Scripted::probe("a", &log);
        let failing = Box::new(Scripted {
            name: "b",
            log: log.clone(),
            fail_enter: true,
            exit_error: None,
        });

        let mut set = ProbeSet::new(vec![(first_name, first), ("b".to_string(), failing)]);
        let err = set.enter_all().unwrap_err();
        assert!(matches!(err, ProbeError::Failure { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["enter a", "exit a"]);
    }

    #[test]
    fn empty_reduction_during_teardown_is_downgraded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let degenerate = Box::new(Scripted {
            name: "a",
            log: log.clone(),
            fail_enter: false,
            exit_error: Some(|| ProbeError::empty_reduction("min over samples")),
        });
        let (second_name, second) = Scripted::probe("b", &log);

        let mut set = ProbeSet::new(vec![("a".to_string(), degenerate), (second_name, second)]);
        set.enter_all().unwrap();
        // The degenerate exit is recovered and teardown continues.
        set.teardown().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter a", "enter b", "exit a", "exit b"]
        );
    }

    #[test]
    fn other_teardown_failures_propagate() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = Box::new(Scripted {
            name: "a",
            log: log.clone(),
            fail_enter: false,
            exit_error: Some(|| ProbeError::failure("teardown broke")),
        });

        let mut set = ProbeSet::new(vec![("a".to_string(), failing)]);
        set.enter_all().unwrap();
        assert!(set.teardown().is_err());
    }

    #[test]
    fn teardown_counts_are_observable() {
        let exits = Arc::new(AtomicUsize::new(0));
        struct CountingExit(Arc<AtomicUsize>);
        impl ProbeScope for CountingExit {
            fn enter(&mut self) -> ProbeResult<()> {
                Ok(())
            }
            fn exit(&mut self) -> ProbeResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let mut set = ProbeSet::new(vec![(
            "counter".to_string(),
            Box::new(CountingExit(exits.clone())),
        )]);
        set.enter_all().unwrap();
        set.teardown().unwrap();
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }
}
