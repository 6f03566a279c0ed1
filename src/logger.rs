//! Status messages on stderr.

use log::LevelFilter;
use redox_log::{OutputBuilder, RedoxLogger};

/// Install the stderr logger, showing messages up to `level`.
pub fn init(level: LevelFilter) {
    let logger = RedoxLogger::new().with_output(
        OutputBuilder::stderr()
            .with_filter(level)
            .flush_on_newline(true)
            .build(),
    );
    if let Err(error) = logger.enable() {
        eprintln!("Failed to set up logging: {error}");
    }
}
