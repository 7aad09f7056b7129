//! Boot device resolution.
//!
//! The firmware names the device it loaded us from in `/chosen/bootpath`.
//! That device is registered up front so that it can be listed without a
//! scan, and its parent adapter limits which Fibre Channel adapters a later
//! scan has to visit.

use crate::early_log::{EarlyLog, early_log};
use crate::path::{DISK_MARKER, NVMEOF_MARKER, is_canonical, last_component, split_parent};
use crate::registry::{EntryId, Registry};
use alloc::format;
use alloc::string::{String, ToString};
use ieee1275_client::{CHOSEN, Firmware};
use log::{info, warn};

/// What is known about the boot device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootContext {
    boot_path: String,
    device: String,
    entry: EntryId,
    parent: Option<String>,
    bus_type: Option<String>,
    over_fabric: bool,
}

impl BootContext {
    /// The raw `/chosen/bootpath`.
    #[must_use]
    pub fn boot_path(&self) -> &str {
        &self.boot_path
    }

    /// The registered boot device path.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub const fn entry(&self) -> EntryId {
        self.entry
    }

    /// The adapter the boot disk hangs off, if the boot path could be
    /// canonicalised.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The `device_type` of the parent adapter.
    #[must_use]
    pub fn bus_type(&self) -> Option<&str> {
        self.bus_type.as_deref()
    }

    /// Whether the boot disk is an NVMe-oF namespace. Unknown without a
    /// parent.
    #[must_use]
    pub fn over_fabric(&self) -> Option<bool> {
        self.parent.as_ref().map(|_| self.over_fabric)
    }
}

/// One-line description of the boot device.
#[must_use]
pub fn summary(boot: Option<&BootContext>) -> String {
    let parent = boot.and_then(BootContext::parent).unwrap_or("(none)");
    let bus_type = boot.and_then(BootContext::bus_type).unwrap_or("unknown");
    let over_fabric = boot.and_then(BootContext::over_fabric).unwrap_or(false);
    format!(
        "boot: {parent} type: {bus_type} is_nvmeof? {}",
        u8::from(over_fabric)
    )
}

/// Registers the boot device and works out its parent adapter.
///
/// Returns `None` for network boots and when `/chosen/bootpath` is missing.
pub fn resolve<F: Firmware + ?Sized>(
    firmware: &F,
    registry: &mut Registry,
    log: &mut EarlyLog,
) -> Option<BootContext> {
    let boot_path = match firmware
        .find_device(CHOSEN)
        .and_then(|chosen| firmware.get_string_property(chosen, "bootpath"))
    {
        Ok(path) if !path.is_empty() => path,
        _ => {
            warn!(target: "ofdisk", "/chosen/bootpath property missing!");
            return None;
        }
    };

    if firmware
        .device_type(&boot_path)
        .is_ok_and(|t| t == "network")
    {
        info!(target: "ofdisk", "booted from the network ({boot_path})");
        return None;
    }

    let device = devname(firmware, &boot_path);
    let entry = match registry.add_alias(&device, None) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(target: "ofdisk", "cannot register boot device {device}: {e}");
            return None;
        }
    };
    registry.mark_boot(entry);

    let (parent, over_fabric) = boot_device_parent(firmware, &boot_path, log)
        .map_or((None, false), |(p, f)| (Some(p), f));
    let bus_type = parent
        .as_deref()
        .and_then(|p| firmware.device_type(p).ok());
    match &bus_type {
        Some(t) => early_log!(log, "the boot device type: {t}"),
        None => early_log!(log, "the boot device type is unknown"),
    }

    Some(BootContext {
        boot_path,
        device,
        entry,
        parent,
        bus_type,
        over_fabric,
    })
}

/// Replaces a leading alias name with the path it stands for.
#[must_use]
pub fn expand_alias<F: Firmware + ?Sized>(firmware: &F, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let end = path.find(['/', ':']).unwrap_or(path.len());
    let (name, rest) = path.split_at(end);
    firmware
        .aliases()
        .ok()
        .and_then(|aliases| aliases.into_iter().find(|a| a.name == name))
        .map_or_else(|| path.to_string(), |a| format!("{}{rest}", a.path))
}

/// The device a boot path refers to: aliases expanded, partition and file
/// arguments of the last component removed.
///
/// NVMe-oF `nqn=` arguments are part of the device address and are kept.
#[must_use]
pub fn devname<F: Firmware + ?Sized>(firmware: &F, boot_path: &str) -> String {
    let mut path = expand_alias(firmware, boot_path);
    let last = path.len() - last_component(&path).len();
    if let Some(colon) = path[last..].find(':')
        && !path[last + colon + 1..].starts_with("nqn=")
    {
        path.truncate(last + colon);
    }
    path
}

/// Canonicalises the boot path and strips the disk or controller component.
///
/// Returns the parent path and whether the boot disk sits behind an NVMe-oF
/// controller.
pub fn boot_device_parent<F: Firmware + ?Sized>(
    firmware: &F,
    boot_path: &str,
    log: &mut EarlyLog,
) -> Option<(String, bool)> {
    let canonical = if is_canonical(boot_path) {
        early_log!(log, "Use {boot_path} as canonical");
        boot_path.to_string()
    } else {
        let alias = expand_alias(firmware, boot_path);
        early_log!(log, "bootpath: {boot_path}");
        early_log!(log, "alias: {alias}");
        match firmware.canonicalise(&alias) {
            Ok(canonical) => {
                early_log!(log, "canonical: {canonical}");
                canonical
            }
            Err(e) => {
                early_log!(log, "canonical: {e}");
                warn!(target: "ofdisk", "canonicalise devname failed: {e}");
                return None;
            }
        }
    };

    let (parent, over_fabric) = split_parent(&canonical);
    if !canonical.contains(DISK_MARKER) && !canonical.contains(NVMEOF_MARKER) {
        warn!(target: "ofdisk", "{canonical} names neither a disk nor a controller");
    }
    early_log!(log, "{parent} is parent of {canonical}");
    Some((parent.to_string(), over_fabric))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ieee1275_client::FirmwareQuirks;
    use ieee1275_client::sim::SimFirmware;

    const FC: &str = "/pci@800000020000015/fibre-channel@0";

    fn firmware() -> SimFirmware {
        let mut fw = SimFirmware::new();
        fw.add_node(FC, Some("fcp"));
        fw.add_device(&format!("{FC}/disk@500507680b215660,0"), Some("block"));
        fw.add_alias("disk", &format!("{FC}/disk@500507680b215660,0"));
        fw
    }

    #[test]
    fn devname_strips_partition_arguments() {
        let fw = firmware();
        assert_eq!(devname(&fw, "disk:2,\\ppc\\grub"), format!("{FC}/disk@500507680b215660,0"));
        assert_eq!(devname(&fw, "/pci@0/scsi@1/disk@0:2"), "/pci@0/scsi@1/disk@0");
        assert_eq!(
            devname(&fw, "/fc@0/nvme-of/controller@a,ffff:nqn=nqn.x"),
            "/fc@0/nvme-of/controller@a,ffff:nqn=nqn.x"
        );
        assert_eq!(
            devname(&fw, "/fc@0/nvme-of/controller@a,ffff:nqn=nqn.x/namespace@1:3"),
            "/fc@0/nvme-of/controller@a,ffff:nqn=nqn.x/namespace@1"
        );
    }

    #[test]
    fn aliased_boot_path_is_canonicalised() {
        let mut fw = firmware();
        fw.set_boot_path("disk:2");
        let mut registry = Registry::new(FirmwareQuirks::new());
        let mut log = EarlyLog::new();

        let boot = resolve(&fw, &mut registry, &mut log).unwrap();
        assert_eq!(boot.parent(), Some(FC));
        assert_eq!(boot.bus_type(), Some("fcp"));
        assert_eq!(boot.over_fabric(), Some(false));
        assert!(registry.entry(boot.entry()).is_boot());
        assert_eq!(
            log.messages(),
            [
                "bootpath: disk:2".to_string(),
                format!("alias: {FC}/disk@500507680b215660,0:2"),
                format!("canonical: {FC}/disk@500507680b215660,0:2"),
                format!("{FC} is parent of {FC}/disk@500507680b215660,0:2"),
                "the boot device type: fcp".to_string(),
            ]
        );
        assert_eq!(summary(Some(&boot)), format!("boot: {FC} type: fcp is_nvmeof? 0"));
    }

    #[test]
    fn missing_boot_path_leaves_no_context() {
        let fw = SimFirmware::new();
        let mut registry = Registry::new(FirmwareQuirks::new());
        let mut log = EarlyLog::new();
        assert_eq!(resolve(&fw, &mut registry, &mut log), None);
        assert!(registry.is_empty());
        assert_eq!(summary(None), "boot: (none) type: unknown is_nvmeof? 0");
    }
}
