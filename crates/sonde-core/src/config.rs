//! Session options: the run-wide configuration captured at session start.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::cli::ProbeArgs;
use crate::probe::Instrument;

/// Options for one probe session. Deserializable from the host's config
/// file; the instrumentation layer handle is wired programmatically.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
    /// Selector strings activated for every test (the `-P/--probe` values).
    pub probes: Vec<String>,

    /// Whether metric events are also pushed onto the run-wide stream.
    pub streaming: bool,

    /// Report width override; detected from the environment when unset.
    pub terminal_width: Option<usize>,

    /// Instrumentation layer used to build probes for direct
    /// target-reference selectors.
    #[serde(skip)]
    pub instrument: Option<Arc<dyn Instrument>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            streaming: true,
            terminal_width: None,
            instrument: None,
        }
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("probes", &self.probes)
            .field("streaming", &self.streaming)
            .field("terminal_width", &self.terminal_width)
            .field("instrument", &self.instrument.as_ref().map(|_| ".."))
            .finish()
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed options from parsed CLI arguments.
    pub fn from_cli(args: &ProbeArgs) -> Self {
        Self {
            probes: args.probe.clone(),
            ..Self::default()
        }
    }

    /// Parse options from a YAML snippet of the host's config.
    pub fn from_yaml(source: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(source).context("failed to parse probe options")
    }

    pub fn probe(mut self, selector: impl Into<String>) -> Self {
        self.probes.push(selector.into());
        self
    }

    pub fn streaming(mut self, on: bool) -> Self {
        self.streaming = on;
        self
    }

    pub fn terminal_width(mut self, width: usize) -> Self {
        self.terminal_width = Some(width);
        self
    }

    pub fn instrument(mut self, instrument: Arc<dyn Instrument>) -> Self {
        self.instrument = Some(instrument);
        self
    }
}

/// Report width: `COLUMNS` when set and sane, 80 otherwise.
pub(crate) fn detect_terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|w| *w > 0)
        .unwrap_or(80)
}
