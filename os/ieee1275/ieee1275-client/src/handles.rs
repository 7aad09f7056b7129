/// A single client interface cell.
///
/// Cells are 32 bits wide on the wire for 32-bit firmware; they are widened to
/// 64 bits here so that 64-bit identifiers (WWPNs, SAS addresses) fit in one.
pub type Cell = u64;

/// An open device *instance*, as returned by the firmware `open` service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct IHandle(u32);

impl IHandle {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// A device tree *package*, as returned by `finddevice`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PHandle(u32);

impl PHandle {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}
