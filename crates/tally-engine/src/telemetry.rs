//! Tracing setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,tally=debug,sqlx=warn";

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default directives. The `tally` directive is a
/// target prefix, so it covers `tally_core`, `tally_db` and `tally_engine`.
/// Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
