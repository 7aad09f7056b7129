use super::node::OpenNode;
use super::tables::{MAX_LIST_ENTRIES, be_u32};
use crate::error::DiskError;
use crate::path::DevicePath;
use crate::registry::Registry;
use alloc::string::ToString;
use ieee1275_client::{Cell, Firmware};

pub const REPORT_LUNS: &str = "vscsi-report-luns";

/// Registers the disks behind a virtual SCSI adapter.
///
/// `vscsi-report-luns` returns one `{u32 target, u32 run}` record per target;
/// each run is a zero-terminated list of LUNs. The firmware keeps the table
/// alive for the rest of the boot.
pub fn enumerate<F: Firmware + ?Sized>(
    firmware: &mut F,
    registry: &mut Registry,
    path: &str,
) -> Result<usize, DiskError> {
    let mut node = OpenNode::open(firmware, path)?;
    let mut rets = [0; 2];
    node.call(REPORT_LUNS, &mut [], &mut rets)?;
    let [count, table] = rets;

    let mut found = 0;
    let records = node.table(REPORT_LUNS, count, table, 8, MAX_LIST_ENTRIES)?;
    for record in records.chunks_exact(8) {
        let run = Cell::from(be_u32(&record[4..]));
        for lun in node.zero_terminated(REPORT_LUNS, run)? {
            let disk = DevicePath::new(path).child("disk", format_args!("{lun:x}")).to_string();
            registry.register(&disk, &disk);
            found += 1;
        }
    }
    Ok(found)
}
