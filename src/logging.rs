//! Structured logging setup using `tracing-subscriber`.
//!
//! Console-only, on stderr, so log lines never interleave with the shell's
//! stdout conversation. Controlled by `RUST_LOG` (default: `info`). Log
//! values are lengths, counts, ids and timings; raw customer text and
//! decrypted replies are never logged.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Call once, before any other work.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
