//! Native sector size detection.
//!
//! Disks report their sector size through the vendor `block-size` method.
//! Some controllers answer with garbage or not at all; after
//! [`MAX_QUERY_FAILURES`] consecutive bad answers an entry is no longer
//! queried and uses 512-byte sectors.

use crate::registry::DeviceEntry;
use ieee1275_client::{Cell, Firmware, IHandle};
use log::{debug, warn};

pub const MIN_BLOCK_SIZE: u32 = 512;
pub const MAX_BLOCK_SIZE: u32 = 16384;
pub const MAX_QUERY_FAILURES: u8 = 2;

/// log2 of the sector size assumed when no query succeeded.
pub const DEFAULT_LOG_SECTOR_SIZE: u32 = 9;

const METHOD: &str = "block-size";

#[must_use]
pub fn is_valid_block_size(size: Cell) -> bool {
    size.is_power_of_two()
        && (Cell::from(MIN_BLOCK_SIZE)..=Cell::from(MAX_BLOCK_SIZE)).contains(&size)
}

/// Asks the open instance for its sector size.
///
/// Returns `None` without calling the firmware once the entry has failed
/// too often. Any failure (call error, invalid size) bumps the entry's
/// failure count; a valid size resets it.
pub fn query<F: Firmware + ?Sized>(
    firmware: &mut F,
    ihandle: IHandle,
    entry: &mut DeviceEntry,
) -> Option<u32> {
    if entry.block_size_failures >= MAX_QUERY_FAILURES {
        debug!(target: "ofdisk", "{}: not probing block size after {} failures",
            entry.devpath(), entry.block_size_failures);
        return None;
    }

    let mut rets = [0; 1];
    let size = match firmware.call_method(ihandle, METHOD, &mut [], &mut rets) {
        Ok(()) if is_valid_block_size(rets[0]) => u32::try_from(rets[0]).ok(),
        Ok(()) => {
            warn!(target: "ofdisk", "{}: invalid block size {:#x}", entry.devpath(), rets[0]);
            None
        }
        Err(e) => {
            debug!(target: "ofdisk", "{}: {METHOD} failed: {e}", entry.devpath());
            None
        }
    };

    if size.is_some() {
        entry.block_size_failures = 0;
    } else {
        entry.block_size_failures = entry.block_size_failures.saturating_add(1);
    }
    size
}

/// log2 of the sector size, falling back to 512-byte sectors.
#[must_use]
pub fn log_sector_size(size: Option<u32>) -> u32 {
    size.map_or(DEFAULT_LOG_SECTOR_SIZE, u32::trailing_zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use ieee1275_client::FirmwareQuirks;
    use ieee1275_client::sim::{SimFirmware, SimReply};

    const DISK: &str = "/pci@0/scsi@1/disk@0";

    fn setup(reply: SimReply) -> (SimFirmware, IHandle, Registry) {
        let mut fw = SimFirmware::new();
        fw.add_device(DISK, Some("block"));
        fw.on_method(DISK, METHOD, &[], reply);
        let ihandle = fw.open(DISK).unwrap();
        let mut registry = Registry::new(FirmwareQuirks::new());
        registry.add_alias(DISK, None).unwrap();
        (fw, ihandle, registry)
    }

    #[test]
    fn valid_sizes() {
        assert!(is_valid_block_size(512));
        assert!(is_valid_block_size(4096));
        assert!(is_valid_block_size(16384));
        assert!(!is_valid_block_size(256));
        assert!(!is_valid_block_size(32768));
        assert!(!is_valid_block_size(520));
        assert!(!is_valid_block_size(0));
    }

    #[test]
    fn accepted_size_resets_failures() {
        let (mut fw, ihandle, mut registry) = setup(SimReply::Cells(vec![4096]));
        let id = registry.find(DISK).unwrap();
        registry.entry_mut(id).block_size_failures = 1;

        let size = query(&mut fw, ihandle, registry.entry_mut(id));
        assert_eq!(size, Some(4096));
        assert_eq!(log_sector_size(size), 12);
        assert_eq!(registry.entry(id).block_size_failures(), 0);
    }

    #[test]
    fn two_bad_answers_stop_probing() {
        let (mut fw, ihandle, mut registry) = setup(SimReply::Cells(vec![520]));
        let entry = registry.entry_mut(registry.find(DISK).unwrap());

        assert_eq!(query(&mut fw, ihandle, entry), None);
        assert_eq!(query(&mut fw, ihandle, entry), None);
        assert_eq!(fw.method_calls(METHOD), 2);

        assert_eq!(query(&mut fw, ihandle, entry), None);
        assert_eq!(fw.method_calls(METHOD), 2);
        assert_eq!(log_sector_size(None), DEFAULT_LOG_SECTOR_SIZE);
    }

    #[test]
    fn call_failures_count_too() {
        let (mut fw, ihandle, mut registry) = setup(SimReply::Throw(-21));
        let id = registry.find(DISK).unwrap();
        assert_eq!(query(&mut fw, ihandle, registry.entry_mut(id)), None);
        assert_eq!(registry.entry(id).block_size_failures(), 1);
    }
}
