//! # IEEE 1275 (Open Firmware) Client Interface
//!
//! This crate describes the contract between boot-time code and an Open
//! Firmware implementation. Everything above it (disk discovery, console
//! output) talks to the firmware exclusively through the [`Firmware`] trait.
//!
//! ## Overview
//!
//! Open Firmware exposes a device tree and a synchronous client interface.
//! Devices are addressed by textual paths such as
//! `/pci@800000020000015/fibre-channel@0/disk@5005076802232ade,0`, opened into
//! *instances* ([`IHandle`]) and inspected as *packages* ([`PHandle`]).
//! Vendor drivers extend the interface with `call-method` entry points that
//! return tables living in firmware-owned memory.
//!
//! ```text
//! Disk subsystem / console
//!         ↓
//! Firmware trait (this crate)
//!         ↓
//! ┌───────────────────────────────────────────┐
//! │ open / close / read / write / seek        │
//! │ finddevice / getprop / canon              │
//! │ call-method + firmware memory views       │
//! │ aliases / children / milliseconds         │
//! └───────────────────────────────────────────┘
//!         ↓
//! Platform firmware (or `sim::SimFirmware` in tests)
//! ```
//!
//! ## Firmware-owned memory
//!
//! A vendor method hands back `(count, address)` cells. The bytes behind the
//! address are only valid while the issuing instance is open, unless the
//! vendor binding says otherwise. [`Firmware::memory`] borrows the firmware,
//! so a view can never be held across [`Firmware::close`].
//!
//! ## Features
//!
//! * `sim` — an in-memory firmware with a scriptable device tree, vendor
//!   method replies, backing media and a virtual clock. Used by tests.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod error;
mod firmware;
mod handles;
mod quirks;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use error::FirmwareError;
pub use firmware::{CHOSEN, DevAlias, Firmware, MethodArg, property_string};
pub use handles::{Cell, IHandle, PHandle};
pub use quirks::FirmwareQuirks;
