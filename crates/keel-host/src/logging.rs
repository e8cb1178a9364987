//! Tracing subscriber setup for host binaries, tests and benches.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"warn,keel::script=info"`) when it is unset or
/// invalid.
///
/// Safe to call more than once: only the first call installs anything.
/// Returns whether this call installed the subscriber.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_a_no_op() {
        init_tracing("warn");
        assert!(!init_tracing("debug"));
    }
}
