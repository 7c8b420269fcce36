//! Tracing initialisation

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "CONCORD_LOG";

/// Install the global subscriber; later calls are no-ops
///
/// Reads `CONCORD_LOG` (e.g. `CONCORD_LOG=concord::network=debug`) and falls
/// back to `concord=info`, or `concord=debug` when `verbose` is set. Logs go
/// to stderr so result tables can be piped.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose { "concord=debug" } else { "concord=info" };
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .with(filter)
            .init();
    });
}
