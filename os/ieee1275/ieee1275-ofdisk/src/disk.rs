//! The disk device exposed to the block layer.

use crate::block_size::{self, log_sector_size};
use crate::boot::{self, BootContext};
use crate::config::{Environment, NoEnvironment, retry_timeout_secs};
use crate::early_log::EarlyLog;
use crate::error::DiskError;
use crate::handle_cache::HandleCache;
use crate::path::{alias_of, devpath_from_name};
use crate::registry::{EntryId, Registry};
use crate::retry::{Clock, RetryPolicy};
use crate::scan::Scanner;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ieee1275_client::{Firmware, IHandle};
use ieee1275_console::ConsoleWriter;
use log::{debug, info};

/// How hard [`OfDisk::iterate`] should look for disks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiskPull {
    /// Only the boot disk, without touching the device tree.
    None,
    /// Scan the device tree and list every other fixed disk.
    Removable,
    /// Slow rescans; nothing is listed for these.
    Rescan,
}

/// An open disk, as handed to the block layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskHandle {
    name: String,
    entry: EntryId,
    open_path: String,
    log_sector_size: u32,
}

impl DiskHandle {
    /// The name the disk was opened by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn entry(&self) -> EntryId {
        self.entry
    }

    #[must_use]
    pub fn open_path(&self) -> &str {
        &self.open_path
    }

    #[must_use]
    pub const fn log_sector_size(&self) -> u32 {
        self.log_sector_size
    }

    #[must_use]
    pub const fn sector_size(&self) -> u64 {
        1 << self.log_sector_size
    }

    /// Open Firmware has no property for the size of a disk.
    #[must_use]
    pub const fn total_sectors(&self) -> Option<u64> {
        None
    }

    fn byte_len(&self, count: u64) -> Result<usize, DiskError> {
        count
            .checked_mul(self.sector_size())
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| DiskError::BadArgument(format!("{count} sectors is too large")))
    }
}

/// Open Firmware disk access.
///
/// Owns the device registry, the cached firmware instance and the boot
/// context. All operations run on the caller's thread; the only blocking
/// point is the one second pause between retries of network disks.
pub struct OfDisk<F: Firmware, E: Environment = NoEnvironment> {
    firmware: F,
    env: E,
    registry: Registry,
    cache: HandleCache,
    boot: Option<BootContext>,
    boot_type: String,
    early_log: EarlyLog,
}

impl<F: Firmware> OfDisk<F> {
    #[must_use]
    pub fn new(firmware: F) -> Self {
        Self::with_environment(firmware, NoEnvironment)
    }
}

impl<F: Firmware, E: Environment> OfDisk<F, E> {
    #[must_use]
    pub fn with_environment(firmware: F, env: E) -> Self {
        let registry = Registry::new(firmware.quirks());
        Self::with_registry(firmware, env, registry)
    }

    /// Starts from a preconfigured registry and resolves the boot device.
    #[must_use]
    pub fn with_registry(firmware: F, env: E, mut registry: Registry) -> Self {
        let mut early_log = EarlyLog::new();
        let boot = boot::resolve(&firmware, &mut registry, &mut early_log);
        let boot_type = boot::summary(boot.as_ref());
        info!(target: "ofdisk", "{boot_type}");
        Self {
            firmware,
            env,
            registry,
            cache: HandleCache::new(),
            boot,
            boot_type,
            early_log,
        }
    }

    /// Walks the device tree and registers every disk found.
    pub fn scan(&mut self) {
        Scanner::new(&mut self.firmware, &mut self.registry, self.boot.as_ref()).scan();
    }

    /// Lists disk names for the given pull class.
    ///
    /// `visit` receives the exposed name of each disk and returns `true` to
    /// stop. Returns whether the visitor stopped the iteration.
    pub fn iterate<V: FnMut(&str) -> bool>(&mut self, pull: DiskPull, mut visit: V) -> bool {
        if pull > DiskPull::Removable {
            return false;
        }
        if pull == DiskPull::Removable {
            self.scan();
        }

        let sdcard_only = self.firmware.quirks().sdcard_only();
        for (_, entry) in self.registry.entries() {
            let Some(designee) = entry.shortest() else {
                continue;
            };
            if sdcard_only && !self.is_sdcard(entry.devpath()) {
                continue;
            }
            if !entry.is_boot() && entry.is_removable() {
                continue;
            }
            if pull == DiskPull::None && !entry.is_boot() {
                continue;
            }
            if pull == DiskPull::Removable && entry.is_boot() {
                continue;
            }
            if visit(self.registry.entry(designee).exposed_name()) {
                return true;
            }
        }
        false
    }

    /// Opens a disk by its exposed name.
    ///
    /// Disks behind Fibre Channel links are retried until the configured
    /// timeout passes.
    ///
    /// # Errors
    /// [`DiskError::UnknownDevice`] if the name is not an `ieee1275/` name or
    /// the device cannot be opened or is not a block device.
    pub fn open(&mut self, name: &str) -> Result<DiskHandle, DiskError> {
        let Some(devpath) = devpath_from_name(name) else {
            return Err(DiskError::UnknownDevice(String::from(
                "not IEEE1275 device",
            )));
        };
        debug!(target: "ofdisk", "Opening `{devpath}'.");

        let known = self.registry.find(&devpath).or_else(|| {
            alias_of(&devpath).and_then(|alias| self.registry.find(alias))
        });
        let entry = match known {
            Some(entry) => entry,
            None => self.registry.add_alias(&devpath, None)?,
        };

        let policy = RetryPolicy::for_target(name, retry_timeout_secs(&self.env));
        policy.run(self, "open disk", |disk| disk.open_once(name, entry))
    }

    fn open_once(&mut self, name: &str, entry: EntryId) -> Result<DiskHandle, DiskError> {
        let open_path = self.registry.entry(entry).open_path().to_string();
        if self.cache.ensure(&mut self.firmware, &open_path)?
            && let Err(e) = self.validate_block_device(entry)
        {
            self.cache.reset(&mut self.firmware);
            return Err(e);
        }

        let ihandle = self.current_instance()?;
        let size = block_size::query(&mut self.firmware, ihandle, self.registry.entry_mut(entry));
        Ok(DiskHandle {
            name: name.to_string(),
            entry,
            open_path,
            log_sector_size: log_sector_size(size),
        })
    }

    fn validate_block_device(&self, entry: EntryId) -> Result<(), DiskError> {
        let devpath = self.registry.entry(entry).devpath();
        let node = self.firmware.find_device(devpath).map_err(|_| {
            DiskError::UnknownDevice(String::from("can't read device properties"))
        })?;
        let device_type = self
            .firmware
            .get_string_property(node, "device_type")
            .map_err(|_| DiskError::UnknownDevice(String::from("can't read the device type")))?;
        if device_type != "block" {
            return Err(DiskError::UnknownDevice(String::from("not a block device")));
        }
        Ok(())
    }

    /// Releases a disk handle. The firmware instance stays open for the next
    /// access.
    #[allow(clippy::unused_self)]
    pub fn close(&mut self, disk: DiskHandle) {
        debug!(target: "ofdisk", "closing {}", disk.name);
        drop(disk);
    }

    /// Reads `count` sectors starting at `sector`.
    ///
    /// # Errors
    /// [`DiskError::ReadError`] on seek failures and short reads,
    /// [`DiskError::UnknownDevice`] if the disk cannot be reopened.
    pub fn read(
        &mut self,
        disk: &DiskHandle,
        sector: u64,
        count: u64,
    ) -> Result<Vec<u8>, DiskError> {
        let policy = RetryPolicy::for_target(&disk.name, retry_timeout_secs(&self.env));
        policy.run(self, "read disk", |this| this.read_once(disk, sector, count))
    }

    fn read_once(
        &mut self,
        disk: &DiskHandle,
        sector: u64,
        count: u64,
    ) -> Result<Vec<u8>, DiskError> {
        let len = disk.byte_len(count)?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| DiskError::OutOfMemory)?;
        buffer.resize(len, 0);

        let ihandle = self.prepare(disk, sector)?;
        let short_read = || {
            DiskError::ReadError(format!(
                "failure reading sector {sector:#x} from `{}'",
                disk.name
            ))
        };
        let actual = self
            .firmware
            .read(ihandle, &mut buffer)
            .map_err(|_| short_read())?;
        if actual != len {
            return Err(short_read());
        }
        Ok(buffer)
    }

    /// Writes `count` sectors starting at `sector`. Never retried.
    ///
    /// # Errors
    /// [`DiskError::BadArgument`] if `bytes` does not span exactly `count`
    /// sectors, [`DiskError::ReadError`] if the seek fails and
    /// [`DiskError::WriteError`] on short writes.
    pub fn write(
        &mut self,
        disk: &DiskHandle,
        sector: u64,
        count: u64,
        bytes: &[u8],
    ) -> Result<(), DiskError> {
        let len = disk.byte_len(count)?;
        if bytes.len() != len {
            return Err(DiskError::BadArgument(format!(
                "{} bytes do not fill {count} sectors",
                bytes.len()
            )));
        }

        let ihandle = self.prepare(disk, sector)?;
        let short_write = || {
            DiskError::WriteError(format!(
                "failure writing sector {sector:#x} to `{}'",
                disk.name
            ))
        };
        let actual = self
            .firmware
            .write(ihandle, bytes)
            .map_err(|_| short_write())?;
        if actual != len {
            return Err(short_write());
        }
        Ok(())
    }

    /// Makes the disk the cached instance and seeks to `sector`.
    fn prepare(&mut self, disk: &DiskHandle, sector: u64) -> Result<IHandle, DiskError> {
        self.cache.ensure(&mut self.firmware, &disk.open_path)?;
        let ihandle = self.current_instance()?;

        let seek_error = || DiskError::ReadError(format!("seek error, can't seek block {sector}"));
        let offset = sector.checked_mul(disk.sector_size()).ok_or_else(seek_error)?;
        self.firmware
            .seek(ihandle, offset)
            .map_err(|_| seek_error())?;
        Ok(ihandle)
    }

    fn current_instance(&self) -> Result<IHandle, DiskError> {
        self.cache
            .current()
            .ok_or_else(|| DiskError::UnknownDevice(String::from("can't open device")))
    }

    fn is_sdcard(&self, devpath: &str) -> bool {
        let Ok(node) = self.firmware.find_device(devpath) else {
            debug!(target: "ofdisk", "finddevice ({devpath}) failed");
            return false;
        };
        match self.firmware.get_string_property(node, "iconname") {
            Ok(icon) if icon == "sdmmc" => true,
            Ok(_) => {
                debug!(target: "ofdisk", "{devpath} is not an SD card");
                false
            }
            Err(_) => {
                debug!(target: "ofdisk", "get iconname failed");
                false
            }
        }
    }

    /// Closes the cached firmware instance.
    pub fn fini(&mut self) {
        self.cache.reset(&mut self.firmware);
    }

    /// Closes the cached instance and hands back the firmware.
    #[must_use]
    pub fn into_firmware(mut self) -> F {
        self.fini();
        self.firmware
    }

    /// Prints the boot resolution messages to the firmware console.
    ///
    /// # Errors
    /// Fails if the console cannot be found or written to.
    pub fn print_early_log(&mut self) -> Result<(), DiskError> {
        let mut console = ConsoleWriter::new(&mut self.firmware)?;
        self.early_log
            .print(&mut console)
            .map_err(|_| DiskError::WriteError(String::from("console write failed")))
    }

    /// `boot: <parent> type: <bus type> is_nvmeof? <0|1>`
    #[must_use]
    pub fn boot_type(&self) -> &str {
        &self.boot_type
    }

    #[must_use]
    pub const fn boot_context(&self) -> Option<&BootContext> {
        self.boot.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn early_log(&self) -> &EarlyLog {
        &self.early_log
    }

    /// The firmware instance currently cached for I/O.
    #[must_use]
    pub fn active_target(&self) -> Option<&str> {
        self.cache.active_target()
    }

    #[must_use]
    pub const fn firmware(&self) -> &F {
        &self.firmware
    }

    pub const fn firmware_mut(&mut self) -> &mut F {
        &mut self.firmware
    }

    pub const fn environment_mut(&mut self) -> &mut E {
        &mut self.env
    }
}

impl<F: Firmware, E: Environment> Clock for OfDisk<F, E> {
    fn now_ms(&self) -> u64 {
        self.firmware.milliseconds()
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.firmware.sleep_ms(ms);
    }
}
