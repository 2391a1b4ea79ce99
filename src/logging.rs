//=====================================================
// File: logging.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup for the solvra_interp binary
// Objective: Install one fmt subscriber whose default level follows the
//            CLI verbosity while still honouring RUST_LOG
//=====================================================

use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

static INIT: OnceLock<()> = OnceLock::new();

fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize tracing once; later calls are no-ops.
pub fn init(verbosity: u8) {
    INIT.get_or_init(|| {
        SubscriberBuilder::default()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(level_for(verbosity).into()),
            )
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    });
    tracing::debug!(verbosity, "tracing initialised");
}
