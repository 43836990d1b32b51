//! Test-run probe instrumentation.
//!
//! For each test, resolves named probe selectors against the test's module
//! location, activates the resulting probes around the test body, and
//! aggregates the status and metric events they emit into a run-wide
//! summary report.

pub mod cli;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod model;
pub mod probe;
pub mod registry;
pub mod report;
pub mod reporter;
mod resolver;
pub mod selector;
pub mod session;
pub mod stream;

pub use cli::ProbeArgs;
pub use config::SessionOptions;
pub use errors::{ProbeError, ProbeResult};
pub use lifecycle::ProbeSet;
pub use model::{MetricBroadcast, MetricEvent, SortOrder, StatusEvent};
pub use probe::{Handler, Instrument, ProbeScope, SharedProbe};
pub use registry::{HandlerRegistry, RegistryUnit};
pub use report::{FinalizeFn, Summary, SummaryBuilder};
pub use reporter::Reporter;
pub use selector::Selector;
pub use session::{Session, TestItem};
pub use stream::MetricStream;
