//! Tracing setup for the binary and for tests.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs a formatting subscriber filtered by `RUST_LOG`.
///
/// Defaults to `nbtls=info` when `RUST_LOG` is unset or invalid. Calling it a
/// second time is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nbtls=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
