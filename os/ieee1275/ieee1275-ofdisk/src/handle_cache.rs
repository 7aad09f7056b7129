//! The single open firmware instance shared by all disk I/O.
//!
//! Firmware instances are expensive to open and some firmwares limit how
//! many may be open at once, so the data path keeps exactly one: switching
//! to another disk closes the previous instance first.

use crate::error::DiskError;
use alloc::format;
use alloc::string::{String, ToString};
use ieee1275_client::{Firmware, FirmwareError, IHandle};
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("can't open device `{target}`")]
pub struct DeviceUnavailable {
    pub target: String,
    #[source]
    pub source: FirmwareError,
}

impl From<DeviceUnavailable> for DiskError {
    fn from(value: DeviceUnavailable) -> Self {
        Self::UnknownDevice(format!("{value}"))
    }
}

#[derive(Debug)]
struct Active {
    target: String,
    ihandle: IHandle,
}

#[derive(Debug, Default)]
pub struct HandleCache {
    active: Option<Active>,
}

impl HandleCache {
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Makes `target` the open instance.
    ///
    /// Returns `true` if the instance had to be opened, `false` if it was
    /// already cached. On failure the cache is left empty.
    ///
    /// # Errors
    /// [`DeviceUnavailable`] if the firmware refuses to open `target`.
    pub fn ensure<F: Firmware + ?Sized>(
        &mut self,
        firmware: &mut F,
        target: &str,
    ) -> Result<bool, DeviceUnavailable> {
        if self.active.as_ref().is_some_and(|a| a.target == target) {
            return Ok(false);
        }

        if let Some(previous) = self.active.take() {
            debug!(target: "ofdisk", "closing {}", previous.target);
            firmware.close(previous.ihandle);
        }

        debug!(target: "ofdisk", "opening {target}");
        match firmware.open(target) {
            Ok(ihandle) => {
                self.active = Some(Active {
                    target: target.to_string(),
                    ihandle,
                });
                Ok(true)
            }
            Err(source) => Err(DeviceUnavailable {
                target: target.to_string(),
                source,
            }),
        }
    }

    /// The open instance; only meaningful right after a successful
    /// [`ensure`](Self::ensure).
    #[must_use]
    pub fn current(&self) -> Option<IHandle> {
        self.active.as_ref().map(|a| a.ihandle)
    }

    #[must_use]
    pub fn active_target(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.target.as_str())
    }

    /// Closes the cached instance, if any.
    pub fn reset<F: Firmware + ?Sized>(&mut self, firmware: &mut F) {
        if let Some(active) = self.active.take() {
            debug!(target: "ofdisk", "closing {}", active.target);
            firmware.close(active.ihandle);
        }
    }
}
