//! Built-in probe handlers and summary builders.

use sonde_core::RegistryUnit;

mod samples;
mod slowest;
mod wall_time;

pub use samples::Samples;
pub use slowest::slowest_tests;
pub use wall_time::wall_time;

/// Registry unit exposing the built-ins under a root scope: the
/// `wall_time` probe plus a `slowest` summary over its broadcasts.
pub fn default_unit(qualified: &str) -> RegistryUnit {
    RegistryUnit::new(qualified)
        .probe("wall_time", wall_time())
        .summary("slowest", slowest_tests(10))
}
