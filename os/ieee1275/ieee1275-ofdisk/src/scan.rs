//! Disk discovery.
//!
//! A scan first registers every `/aliases` entry of type `block`, then walks
//! the device tree from the root. Adapters are dispatched on their
//! `device_type`:
//!
//! | type      | action                                               | children |
//! |-----------|------------------------------------------------------|----------|
//! | `block`   | register the node                                    | no       |
//! | `vscsi`   | `vscsi-report-luns`                                  | no       |
//! | `sas_ioa` | `get-sas-children`                                   | yes      |
//! | `fcp`     | NVMe-oF discovery and/or `fcp-targets`/`fcp-luns`    | yes      |
//! | other     |                                                      | yes      |
//!
//! Failures are contained to the node that caused them.

mod fcp;
mod node;
mod nvmeof;
mod sas;
mod tables;
mod vscsi;

use crate::boot::BootContext;
use crate::error::DiskError;
use crate::registry::Registry;
use ieee1275_client::{DevAlias, Firmware, FirmwareQuirks};
use log::{debug, warn};

pub use sas::MAX_SAS_CHILDREN;
pub use tables::{MAX_LIST_ENTRIES, MAX_NVME_ENTRIES};

/// Walks the device tree and feeds discovered disks into a [`Registry`].
pub struct Scanner<'a, F: Firmware + ?Sized> {
    firmware: &'a mut F,
    registry: &'a mut Registry,
    boot: Option<&'a BootContext>,
    quirks: FirmwareQuirks,
}

impl<'a, F: Firmware + ?Sized> Scanner<'a, F> {
    #[must_use]
    pub fn new(
        firmware: &'a mut F,
        registry: &'a mut Registry,
        boot: Option<&'a BootContext>,
    ) -> Self {
        let quirks = firmware.quirks();
        Self {
            firmware,
            registry,
            boot,
            quirks,
        }
    }

    pub fn scan(&mut self) {
        match self.firmware.aliases() {
            Ok(aliases) => {
                for alias in aliases.iter().filter(|a| a.is_type("block")) {
                    self.registry.register(&alias.name, &alias.path);
                }
            }
            Err(e) => warn!(target: "ofdisk", "cannot list aliases: {e}"),
        }
        self.walk("/");
    }

    fn walk(&mut self, path: &str) {
        match self.firmware.children(path) {
            Ok(children) => {
                for child in &children {
                    self.visit(child);
                }
            }
            Err(e) => debug!(target: "ofdisk", "cannot list children of {path}: {e}"),
        }
    }

    fn visit(&mut self, node: &DevAlias) {
        match node.device_type.as_deref() {
            Some("fcp") => self.visit_fcp(node),
            Some("vscsi") => {
                self.check_boot_type(node);
                self.enumerate(node, "vscsi", vscsi::enumerate);
                return;
            }
            Some("sas_ioa") => {
                self.check_boot_type(node);
                self.enumerate(node, "sas", sas::enumerate);
            }
            Some("block") if !self.quirks.no_tree_scanning_for_disks() => {
                self.registry.register(&node.path, &node.path);
                return;
            }
            _ => {}
        }
        self.walk(&node.path);
    }

    fn visit_fcp(&mut self, node: &DevAlias) {
        let scope = self.boot.and_then(BootContext::parent);
        if let Some(scope) = scope
            && scope != node.path
        {
            debug!(
                target: "ofdisk",
                "Skipped device: {}, doesn't match boot_parent {scope}",
                node.path
            );
            return;
        }

        match self.boot.and_then(BootContext::over_fabric) {
            None => {
                debug!(target: "ofdisk", "iterate {}", node.path);
                self.enumerate(node, "nvme-of", nvmeof::enumerate);
                self.enumerate(node, "fcp", fcp::enumerate);
            }
            Some(true) => {
                debug!(target: "ofdisk", "iterate nvmeof: {}", node.path);
                self.enumerate(node, "nvme-of", nvmeof::enumerate);
            }
            Some(false) => {
                debug!(target: "ofdisk", "iterate fcp: {}", node.path);
                self.enumerate(node, "fcp", fcp::enumerate);
            }
        }
    }

    /// Runs one enumerator; its failure only affects this node.
    fn enumerate(
        &mut self,
        node: &DevAlias,
        kind: &str,
        enumerator: fn(&mut F, &mut Registry, &str) -> Result<usize, DiskError>,
    ) {
        match enumerator(self.firmware, self.registry, &node.path) {
            Ok(found) => debug!(target: "ofdisk", "{}: {found} {kind} disks", node.path),
            Err(e) => warn!(target: "ofdisk", "{}: {kind} enumeration failed: {e}", node.path),
        }
    }

    /// Adapters of a different type than the boot adapter are still scanned,
    /// but noted, since they are the usual source of slow boots.
    fn check_boot_type(&self, node: &DevAlias) {
        if let Some(boot_type) = self.boot.and_then(BootContext::bus_type)
            && node.device_type.as_deref() != Some(boot_type)
        {
            warn!(target: "ofdisk",
                "device: {}, type {} not match boot_type {boot_type}",
                node.path,
                node.device_type.as_deref().unwrap_or_default()
            );
        }
    }
}
