use tracing_subscriber::EnvFilter;

/// How chatty stderr logging should be when `PB_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (_, true) => Self::Quiet,
            (true, false) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    fn default_directive(self, service: bool) -> &'static str {
        match (self, service) {
            (Self::Quiet, _) => "error",
            (Self::Verbose, _) => "debug",
            (Self::Normal, true) => "info",
            (Self::Normal, false) => "warn",
        }
    }
}

/// Installs the global stderr subscriber. `service` raises the default level
/// for the long-running bot.
pub fn init(verbosity: Verbosity, service: bool) {
    let filter = EnvFilter::try_from_env("PB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive(service)));

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
