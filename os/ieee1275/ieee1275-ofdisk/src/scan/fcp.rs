use super::node::OpenNode;
use crate::error::DiskError;
use crate::path::DevicePath;
use crate::registry::Registry;
use alloc::string::ToString;
use ieee1275_client::{Firmware, MethodArg};
use log::debug;

pub const FCP_TARGETS: &str = "fcp-targets";
pub const FCP_LUNS: &str = "fcp-luns";

/// Registers the SCSI disks of a Fibre Channel adapter.
///
/// `fcp-targets` lists the remote port WWPNs; `fcp-luns`, called with a
/// WWPN split into high and low cells, lists the LUNs behind it. Disks are
/// named `disk@<wwpn>,<lun>`.
///
/// A failing `fcp-luns` ends the enumeration; disks found up to then stay
/// registered.
pub fn enumerate<F: Firmware + ?Sized>(
    firmware: &mut F,
    registry: &mut Registry,
    path: &str,
) -> Result<usize, DiskError> {
    let mut node = OpenNode::open(firmware, path)?;
    let mut rets = [0; 2];
    node.call(FCP_TARGETS, &mut [], &mut rets)?;
    let wwpns = node.id_lists(FCP_TARGETS, rets[0], rets[1])?;
    debug!(target: "ofdisk", "{path}: {} fcp targets", wwpns.len());

    let mut found = 0;
    for wwpn in wwpns {
        let mut rets = [0; 2];
        node.call(
            FCP_LUNS,
            &mut [MethodArg::Cell(wwpn >> 32), MethodArg::Cell(wwpn & 0xffff_ffff)],
            &mut rets,
        )?;
        for lun in node.id_lists(FCP_LUNS, rets[0], rets[1])? {
            let disk = DevicePath::new(path)
                .child("disk", format_args!("{wwpn:x},{lun:x}"))
                .to_string();
            registry.register(&disk, &disk);
            found += 1;
        }
    }
    Ok(found)
}
