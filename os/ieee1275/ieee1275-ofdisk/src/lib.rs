//! # Open Firmware Disks
//!
//! Disk discovery and access on IEEE 1275 (Open Firmware) machines, most
//! notably IBM Power systems with virtual SCSI, SAS, Fibre Channel and
//! NVMe-over-Fibre-Channel storage.
//!
//! ## Overview
//!
//! ```text
//!            block layer
//!                 ↓
//! ┌─────────────────────────────────────────────┐
//! │ OfDisk: iterate / open / read / write       │
//! │   ├─ RetryPolicy   (Fibre Channel links)    │
//! │   ├─ HandleCache   (one open instance)      │
//! │   └─ block_size    (sector size probing)    │
//! │ Scanner ──► Registry ◄── boot::resolve      │
//! │   └─ vscsi / sas / fcp / nvme-of            │
//! └─────────────────────────────────────────────┘
//!                 ↓
//!        ieee1275_client::Firmware
//! ```
//!
//! ### Naming
//! A disk is exposed as `ieee1275/<firmware path>` with every comma of the
//! path escaped as `\,`. Several firmware paths may name the same disk (an
//! alias and the full path, say); the [`Registry`] groups them and exposes
//! the shortest.
//!
//! ### Discovery
//! [`OfDisk::new`] reads `/chosen/bootpath` and registers the boot disk. A
//! [`DiskPull::Removable`] iteration additionally walks the device tree and
//! asks each storage adapter for its disks through vendor methods.
//!
//! ### I/O
//! All reads and writes go through a single cached firmware instance.
//! Opening another disk closes the previous one. Opens and reads of disks
//! behind Fibre Channel are retried for `ofdisk_retry_timeout` seconds
//! (default 15) while the link comes up.
//!
//! ## Usage
//!
//! ```rust
//! use ieee1275_client::sim::SimFirmware;
//! use ieee1275_ofdisk::{DiskPull, OfDisk};
//!
//! let mut fw = SimFirmware::new();
//! fw.add_node("/pci@0/scsi@1/disk@0", Some("block"));
//! fw.set_media("/pci@0/scsi@1/disk@0", vec![0; 4096]);
//!
//! let mut disks = OfDisk::new(fw);
//! let mut names = Vec::new();
//! disks.iterate(DiskPull::Removable, |name| {
//!     names.push(name.to_string());
//!     false
//! });
//! assert_eq!(names, ["ieee1275/pci@0/scsi@1/disk@0"]);
//!
//! let disk = disks.open(&names[0]).unwrap();
//! let sector = disks.read(&disk, 1, 1).unwrap();
//! assert_eq!(sector.len(), 512);
//! disks.close(disk);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod block_size;
pub mod boot;
pub mod config;
mod disk;
pub mod early_log;
mod error;
pub mod handle_cache;
pub mod path;
pub mod registry;
pub mod retry;
pub mod scan;

pub use boot::BootContext;
pub use config::{Environment, NoEnvironment};
pub use disk::{DiskHandle, DiskPull, OfDisk};
pub use early_log::EarlyLog;
pub use error::DiskError;
pub use handle_cache::{DeviceUnavailable, HandleCache};
pub use registry::{DeviceEntry, EntryId, Registry, RegistryError};
pub use retry::{Clock, RetryPolicy};
pub use scan::Scanner;
