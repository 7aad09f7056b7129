use crate::error::DiskError;
use ieee1275_client::{Cell, Firmware, IHandle, MethodArg};
use log::trace;

/// An open device tree node, closed when dropped.
///
/// Firmware memory handed out by the node's methods is borrowed from the
/// guard, so it has to be copied out before the node goes away.
pub struct OpenNode<'f, F: Firmware + ?Sized> {
    firmware: &'f mut F,
    ihandle: IHandle,
}

impl<'f, F: Firmware + ?Sized> OpenNode<'f, F> {
    pub fn open(firmware: &'f mut F, path: &str) -> Result<Self, DiskError> {
        let ihandle = firmware.open(path)?;
        trace!(target: "ofdisk", "opened {path} as {:#x}", ihandle.as_u32());
        Ok(Self { firmware, ihandle })
    }

    pub fn call(
        &mut self,
        method: &str,
        args: &mut [MethodArg<'_>],
        rets: &mut [Cell],
    ) -> Result<(), DiskError> {
        self.firmware
            .call_method(self.ihandle, method, args, rets)
            .map_err(DiskError::from)
    }

    pub fn memory(&self, addr: Cell, len: usize) -> Result<&[u8], DiskError> {
        self.firmware.memory(addr, len).map_err(DiskError::from)
    }
}

impl<F: Firmware + ?Sized> Drop for OpenNode<'_, F> {
    fn drop(&mut self) {
        trace!(target: "ofdisk", "closing {:#x}", self.ihandle.as_u32());
        self.firmware.close(self.ihandle);
    }
}
