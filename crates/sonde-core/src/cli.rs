//! Probe options for the host runner's command line. The host embeds
//! [`ProbeArgs`] into its own parser (clap flatten) and feeds the values
//! to [`SessionOptions`](crate::config::SessionOptions).

/// Repeatable probe selector option.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProbeArgs {
    /// Probe selector to activate for every test. Repeatable; accepts
    /// comma-separated unions and dotted/slashed target references.
    #[arg(short = 'P', long = "probe", value_name = "NAME")]
    pub probe: Vec<String>,
}
