//! Ctrl-C handling
//!
//! An interrupted run exits with status 130. Any migration still in flight is
//! rolled back by the server when the connection drops.

use std::process;

/// Exit status of a run stopped by SIGINT (128 + 2)
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Install the process-wide Ctrl-C handler
pub fn install_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        eprintln!("\n🛑 Interrupted by user");
        process::exit(INTERRUPTED_EXIT_CODE);
    })
}
