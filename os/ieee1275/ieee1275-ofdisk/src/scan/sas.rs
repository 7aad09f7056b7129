use super::node::OpenNode;
use super::tables::{be_u64s, table_len};
use crate::error::DiskError;
use crate::path::DevicePath;
use crate::registry::Registry;
use alloc::string::ToString;
use alloc::vec::Vec;
use ieee1275_client::{Cell, Firmware, MethodArg};

pub const GET_SAS_CHILDREN: &str = "get-sas-children";

/// Largest number of disks one adapter may report. Power systems document
/// 672; this leaves some headroom.
pub const MAX_SAS_CHILDREN: usize = 768;

/// Registers the disks behind a SAS adapter.
///
/// `get-sas-children` fills a caller-provided buffer with 64-bit SAS
/// addresses and returns how many it wrote.
pub fn enumerate<F: Firmware + ?Sized>(
    firmware: &mut F,
    registry: &mut Registry,
    path: &str,
) -> Result<usize, DiskError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(MAX_SAS_CHILDREN * 8)
        .map_err(|_| DiskError::OutOfMemory)?;
    buffer.resize(MAX_SAS_CHILDREN * 8, 0u8);

    let count = {
        let mut node = OpenNode::open(firmware, path)?;
        let mut rets = [0; 1];
        node.call(
            GET_SAS_CHILDREN,
            &mut [
                MethodArg::Cell(MAX_SAS_CHILDREN as Cell),
                MethodArg::Buffer(buffer.as_mut_slice()),
            ],
            &mut rets,
        )?;
        rets[0]
    };

    let len = table_len(GET_SAS_CHILDREN, count, 8, MAX_SAS_CHILDREN)?;
    let mut found = 0;
    for id in be_u64s(&buffer[..len]) {
        let disk = DevicePath::new(path).child("disk", format_args!("{id:x}")).to_string();
        registry.register(&disk, &disk);
        found += 1;
    }
    Ok(found)
}
