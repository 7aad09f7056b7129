//! Messages recorded while the boot device is being resolved.
//!
//! Boot path resolution runs before the console is in a state where
//! printing is safe, so its findings are kept here and only printed when
//! asked for.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};
use log::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EarlyLog {
    messages: Vec<String>,
}

impl EarlyLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends a formatted message. Formatting failures drop the message.
    pub fn push(&mut self, args: fmt::Arguments<'_>) {
        let mut message = String::new();
        if message.write_fmt(args).is_ok() {
            debug!(target: "ofdisk", "early: {message}");
            self.messages.push(message);
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Writes every message on its own line.
    ///
    /// # Errors
    /// Propagates failures of `out`.
    pub fn print<W: Write + ?Sized>(&self, out: &mut W) -> fmt::Result {
        if self.messages.is_empty() {
            return out.write_str("no early log is available\n");
        }
        for message in &self.messages {
            writeln!(out, "{message}")?;
        }
        Ok(())
    }
}

/// Appends a `format!`-style message to an [`EarlyLog`].
macro_rules! early_log {
    ($log:expr, $($arg:tt)*) => {
        $log.push(::core::format_args!($($arg)*))
    };
}

pub(crate) use early_log;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_says_so() {
        let mut out = String::new();
        EarlyLog::new().print(&mut out).unwrap();
        assert_eq!(out, "no early log is available\n");
    }

    #[test]
    fn messages_are_kept_in_order() {
        let mut log = EarlyLog::new();
        early_log!(log, "bootpath: {}", "disk:2");
        early_log!(log, "the boot device type is unknown");

        let mut out = String::new();
        log.print(&mut out).unwrap();
        assert_eq!(out, "bootpath: disk:2\nthe boot device type is unknown\n");
        assert_eq!(log.messages().len(), 2);
    }
}
