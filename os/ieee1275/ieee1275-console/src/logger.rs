use alloc::boxed::Box;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Receives one fully formatted log line.
pub type Sink = fn(fmt::Arguments<'_>);

pub struct ConsoleLogger {
    max_level: LevelFilter,
    sink: Sink,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, sink: Sink) -> Self {
        Self { max_level, sink }
    }

    /// Call this once during early init.
    ///
    /// # Errors
    /// Fails if a logger was already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message\n"
        (self.sink)(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {
        // the firmware console is unbuffered
    }
}
