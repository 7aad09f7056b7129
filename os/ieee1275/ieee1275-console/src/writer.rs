use core::fmt;
use ieee1275_client::{CHOSEN, Firmware, FirmwareError, IHandle};

/// A [`fmt::Write`] sink over the firmware console.
pub struct ConsoleWriter<'f, F: Firmware + ?Sized> {
    firmware: &'f mut F,
    stdout: IHandle,
}

impl<'f, F: Firmware + ?Sized> ConsoleWriter<'f, F> {
    /// Binds to the instance named by `/chosen/stdout`.
    ///
    /// # Errors
    /// Fails if `/chosen` or its `stdout` property is missing or malformed.
    pub fn new(firmware: &'f mut F) -> Result<Self, FirmwareError> {
        let chosen = firmware.find_device(CHOSEN)?;
        let stdout = firmware.get_property(chosen, "stdout")?;
        let raw: [u8; 4] = stdout
            .as_slice()
            .try_into()
            .map_err(|_| FirmwareError::NoSuchProperty("stdout".into()))?;
        Ok(Self {
            firmware,
            stdout: IHandle::new(u32::from_be_bytes(raw)),
        })
    }

    #[must_use]
    pub const fn stdout(&self) -> IHandle {
        self.stdout
    }
}

impl<F: Firmware + ?Sized> fmt::Write for ConsoleWriter<'_, F> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            match self.firmware.write(self.stdout, bytes) {
                Ok(0) | Err(_) => return Err(fmt::Error),
                Ok(n) => bytes = &bytes[n.min(bytes.len())..],
            }
        }
        Ok(())
    }
}
