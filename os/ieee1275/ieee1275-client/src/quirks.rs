use bitfield_struct::bitfield;

/// Capability flags describing deviations of a concrete firmware from the
/// IEEE 1275 baseline.
///
/// Platform code fills these in once, after identifying the firmware.
#[bitfield(u8, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct FirmwareQuirks {
    /// Bit 0 — the firmware rejects the `:0` "whole disk" partition argument.
    ///
    /// When clear, disks are opened as `<path>:0`.
    pub no_partition_0: bool,

    /// Bit 1 — nodes of type `block` found while walking the device tree must
    /// not be registered as disks. Flat `/aliases` entries still are.
    pub no_tree_scanning_for_disks: bool,

    /// Bit 2 — only SD cards (`iconname` = `sdmmc`) are exposed as disks.
    pub sdcard_only: bool,

    /// Bits 3–7 — Reserved.
    #[bits(5)]
    __: u8,
}
