//! Error types for probe resolution, activation and event recording.

/// Probe instrumentation errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// No probe handler or summary builder was registered anywhere for the
    /// selector. Raised during test setup, before the body runs.
    #[error("could not find probe '{selector}'")]
    UnresolvedSelector { selector: String },

    /// A handler bridged from an external instrumentation layer is missing
    /// its enter or exit half. Raised at registration, not at use.
    #[error("probe handler '{name}' must provide both an enter and an exit hook")]
    MalformedHandler { name: String },

    /// A metric recorder with an explicit name was fed a named payload.
    #[error("metric '{name}' should not be given a named payload")]
    AmbiguousMetric { name: String },

    /// A metric recorder without a name was fed a payload that is not a
    /// single-entry mapping.
    #[error("metric payload must be a single-entry mapping, got {got}")]
    UnnamedMetric { got: String },

    /// A reduction ran over zero observed elements. Downgraded to a warning
    /// when it surfaces from probe teardown.
    #[error("reduction over an empty sample set: {context}")]
    EmptyReduction { context: String },

    /// Probe-specific failure during enter, exit or observation.
    #[error("probe failure: {message}")]
    Failure { message: String },

    /// Summary builder failed during setup or finalization.
    #[error("summary failure: {message}")]
    Summary { message: String },
}

impl ProbeError {
    pub fn unresolved(selector: impl Into<String>) -> Self {
        Self::UnresolvedSelector {
            selector: selector.into(),
        }
    }

    pub fn empty_reduction(context: impl Into<String>) -> Self {
        Self::EmptyReduction {
            context: context.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Whether the error is recovered from during teardown instead of
    /// failing the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyReduction { .. })
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
