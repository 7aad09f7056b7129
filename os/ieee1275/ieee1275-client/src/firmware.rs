use crate::{Cell, FirmwareError, FirmwareQuirks, IHandle, PHandle};
use alloc::string::String;
use alloc::vec::Vec;

/// Path of the `/chosen` node holding boot-time parameters.
pub const CHOSEN: &str = "/chosen";

/// A named device tree entry: either a flat `/aliases` property or a child
/// node yielded by [`Firmware::children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevAlias {
    /// The alias name, or the last path component for tree children.
    pub name: String,
    /// The fully qualified device path.
    pub path: String,
    /// The node's `device_type` property, if it declares one.
    pub device_type: Option<String>,
}

impl DevAlias {
    /// Whether the node declares the given `device_type`.
    #[must_use]
    pub fn is_type(&self, device_type: &str) -> bool {
        self.device_type.as_deref() == Some(device_type)
    }
}

/// An input argument to a vendor `call-method`.
#[derive(Debug)]
pub enum MethodArg<'a> {
    /// A plain value.
    Cell(Cell),
    /// A caller-owned buffer the method may fill in.
    Buffer(&'a mut [u8]),
}

/// The IEEE 1275 client interface, as consumed by boot-time code.
///
/// All calls are synchronous. A `catch-result` raised by a firmware method is
/// reported as [`FirmwareError::MethodThrew`].
#[allow(clippy::missing_errors_doc)]
pub trait Firmware {
    /// Opens a device instance by path (aliases and `:args` are accepted).
    fn open(&mut self, path: &str) -> Result<IHandle, FirmwareError>;

    /// Closes an instance. Firmware memory issued to it becomes invalid.
    fn close(&mut self, ihandle: IHandle);

    /// Reads from the current position; returns the number of bytes read.
    fn read(&mut self, ihandle: IHandle, buf: &mut [u8]) -> Result<usize, FirmwareError>;

    /// Writes at the current position; returns the number of bytes written.
    fn write(&mut self, ihandle: IHandle, buf: &[u8]) -> Result<usize, FirmwareError>;

    /// Moves the instance's position to an absolute byte offset.
    fn seek(&mut self, ihandle: IHandle, offset: u64) -> Result<(), FirmwareError>;

    /// Resolves a path to its package.
    fn find_device(&self, path: &str) -> Result<PHandle, FirmwareError>;

    /// Returns the raw bytes of a package property.
    fn get_property(&self, node: PHandle, name: &str) -> Result<Vec<u8>, FirmwareError>;

    /// Invokes a method of an open instance.
    ///
    /// Return cells are written to `rets` in the order the method defines.
    fn call_method(
        &mut self,
        ihandle: IHandle,
        method: &str,
        args: &mut [MethodArg<'_>],
        rets: &mut [Cell],
    ) -> Result<(), FirmwareError>;

    /// Borrows `len` bytes of firmware-owned memory at `addr`.
    fn memory(&self, addr: Cell, len: usize) -> Result<&[u8], FirmwareError>;

    /// Lists the entries of the `/aliases` node.
    fn aliases(&self) -> Result<Vec<DevAlias>, FirmwareError>;

    /// Lists the direct children of the node at `path`.
    fn children(&self, path: &str) -> Result<Vec<DevAlias>, FirmwareError>;

    /// Expands aliases and unit addresses into a fully qualified path.
    fn canonicalise(&self, path: &str) -> Result<String, FirmwareError>;

    /// Monotonic millisecond counter.
    fn milliseconds(&self) -> u64;

    /// Blocks for the given number of milliseconds.
    fn sleep_ms(&mut self, ms: u64);

    /// Deviations of this firmware from the standard.
    fn quirks(&self) -> FirmwareQuirks;

    /// Reads a NUL-terminated string property.
    fn get_string_property(&self, node: PHandle, name: &str) -> Result<String, FirmwareError> {
        self.get_property(node, name)
            .map(|bytes| property_string(&bytes))
    }

    /// Reads the `device_type` of the node at `path`.
    fn device_type(&self, path: &str) -> Result<String, FirmwareError> {
        let node = self.find_device(path)?;
        self.get_string_property(node, "device_type")
    }
}

/// Decodes a property value as a string, stopping at the first NUL.
#[must_use]
pub fn property_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_string_stops_at_nul() {
        assert_eq!(property_string(b"block\0junk"), "block");
        assert_eq!(property_string(b"vscsi"), "vscsi");
        assert_eq!(property_string(b""), "");
    }

    #[test]
    fn dev_alias_type_match() {
        let alias = DevAlias {
            name: "disk".into(),
            path: "/vdevice/v-scsi@2000/disk@8000000000000000".into(),
            device_type: Some("block".into()),
        };
        assert!(alias.is_type("block"));
        assert!(!alias.is_type("network"));
    }
}
