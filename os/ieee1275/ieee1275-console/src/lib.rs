//! # Open Firmware Console Output
//!
//! Boot-time text output through the firmware `stdout` instance.
//!
//! ```text
//! log::info!(..) ──► ConsoleLogger ──► sink(fmt::Arguments)
//!                                          │
//! early log flush ─────────────────► ConsoleWriter (fmt::Write)
//!                                          ↓
//!                           Firmware::write(/chosen stdout)
//! ```
//!
//! [`ConsoleWriter`] looks up the `stdout` instance handle stored in
//! `/chosen` and implements [`core::fmt::Write`] on top of it.
//! [`ConsoleLogger`] is a [`log::Log`] backend that formats records as
//! `[LEVEL] target: message` and forwards them to a platform sink, usually a
//! function that wraps a `ConsoleWriter` around the global firmware instance.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ieee1275_console::ConsoleLogger;
//! use log::{LevelFilter, info};
//!
//! fn sink(args: core::fmt::Arguments) {
//!     // forward to the firmware console
//! #   let _ = args;
//! }
//!
//! ConsoleLogger::new(LevelFilter::Debug, sink)
//!     .init()
//!     .expect("logger initialization");
//! info!("disk subsystem up");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod logger;
mod writer;

pub use logger::{ConsoleLogger, Sink};
pub use writer::ConsoleWriter;
