//! Decoding of vendor method result tables.
//!
//! Tables are big-endian. Entry counts come straight from the firmware and
//! are checked against a ceiling before any memory is touched.

use super::node::OpenNode;
use crate::error::DiskError;
use alloc::string::String;
use alloc::vec::Vec;
use ieee1275_client::{Cell, Firmware, property_string};

/// Ceiling for id lists and LUN runs.
pub const MAX_LIST_ENTRIES: usize = 4096;

/// Ceiling for NVMe-oF tables.
pub const MAX_NVME_ENTRIES: usize = 256;

/// Length of the transport address and NQN fields of a controller record.
pub const NVME_STRING_LEN: usize = 256;

/// `{u16 id, [u8; 256] transport address, [u8; 256] nqn}`.
pub const NVME_CONTROLLER_RECORD_LEN: usize = 2 + 2 * NVME_STRING_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmeController {
    pub id: u16,
    pub transport_address: String,
    pub nqn: String,
}

/// Validates `count` and returns the number of bytes the table spans.
pub fn table_len(
    method: &'static str,
    count: Cell,
    record_len: usize,
    max: usize,
) -> Result<usize, DiskError> {
    usize::try_from(count)
        .ok()
        .filter(|&n| n <= max)
        .and_then(|n| n.checked_mul(record_len))
        .ok_or(DiskError::MalformedTable {
            method,
            reason: "too many entries",
        })
}

impl<F: Firmware + ?Sized> OpenNode<'_, F> {
    /// Borrows a table of `count` fixed-size records.
    pub fn table(
        &self,
        method: &'static str,
        count: Cell,
        addr: Cell,
        record_len: usize,
        max: usize,
    ) -> Result<&[u8], DiskError> {
        let len = table_len(method, count, record_len, max)?;
        if len == 0 {
            return Ok(&[]);
        }
        self.memory(addr, len)
    }

    /// Collects the ids behind a table of `{u64 address, u64 count}`
    /// descriptors.
    pub fn id_lists(
        &self,
        method: &'static str,
        count: Cell,
        addr: Cell,
    ) -> Result<Vec<u64>, DiskError> {
        let descriptors = self.table(method, count, addr, 16, MAX_LIST_ENTRIES)?;
        let mut ids = Vec::new();
        for descriptor in descriptors.chunks_exact(16) {
            let address = be_u64(&descriptor[..8]);
            let len = be_u64(&descriptor[8..]);
            ids.extend(be_u64s(self.table(method, len, address, 8, MAX_LIST_ENTRIES)?));
        }
        Ok(ids)
    }

    /// Reads a zero-terminated list of u64 ids.
    pub fn zero_terminated(&self, method: &'static str, addr: Cell) -> Result<Vec<u64>, DiskError> {
        let mut ids = Vec::new();
        let mut at = addr;
        while ids.len() < MAX_LIST_ENTRIES {
            let id = be_u64(self.memory(at, 8)?);
            if id == 0 {
                return Ok(ids);
            }
            ids.push(id);
            at = at.checked_add(8).ok_or(DiskError::MalformedTable {
                method,
                reason: "list wraps around",
            })?;
        }
        Err(DiskError::MalformedTable {
            method,
            reason: "unterminated list",
        })
    }
}

pub fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(raw)
}

pub fn be_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(raw)
}

pub fn be_u64s(bytes: &[u8]) -> impl Iterator<Item = u64> + '_ {
    bytes.chunks_exact(8).map(be_u64)
}

pub fn be_u32s(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes.chunks_exact(4).map(be_u32)
}

pub fn nvme_controllers(bytes: &[u8]) -> Vec<NvmeController> {
    bytes
        .chunks_exact(NVME_CONTROLLER_RECORD_LEN)
        .map(|record| NvmeController {
            id: u16::from_be_bytes([record[0], record[1]]),
            transport_address: property_string(&record[2..2 + NVME_STRING_LEN]),
            nqn: property_string(&record[2 + NVME_STRING_LEN..]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_above_the_ceiling_are_rejected() {
        assert_eq!(table_len("m", 3, 8, 4), Ok(24));
        assert_eq!(
            table_len("m", 5, 8, 4),
            Err(DiskError::MalformedTable {
                method: "m",
                reason: "too many entries"
            })
        );
        assert!(table_len("m", u64::MAX, 8, usize::MAX).is_err());
    }

    #[test]
    fn controller_records_decode() {
        let mut record = alloc::vec![0u8; NVME_CONTROLLER_RECORD_LEN];
        record[1] = 7;
        record[2..6].copy_from_slice(b"abcd");
        record[2 + NVME_STRING_LEN..2 + NVME_STRING_LEN + 8].copy_from_slice(b"nqn.test");

        let controllers = nvme_controllers(&record);
        assert_eq!(
            controllers,
            [NvmeController {
                id: 7,
                transport_address: "abcd".into(),
                nqn: "nqn.test".into(),
            }]
        );
    }

    #[test]
    fn big_endian_ids() {
        let bytes = [0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 3];
        assert_eq!(be_u64s(&bytes).collect::<Vec<_>>(), [0x102, 3]);
        assert_eq!(be_u32s(&bytes[4..8]).collect::<Vec<_>>(), [0x102]);
    }
}
