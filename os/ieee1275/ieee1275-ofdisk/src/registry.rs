//! The device path registry.
//!
//! Every firmware path the subsystem learns about (from the boot path, the
//! device tree scan or an `open` by name) gets exactly one [`DeviceEntry`].
//! Paths that name the same device are grouped under a *canonical* entry,
//! the group head, which designates the shortest known path of the group as
//! the name exposed to the block layer.
//!
//! Entries are never removed. They live in an arena and refer to each other
//! through [`EntryId`]s.

use crate::path::{NAMESPACE, is_removable, name_tail, push_escaped};
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use ieee1275_client::FirmwareQuirks;
use log::{debug, warn};

/// Index of an entry in the [`Registry`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("out of memory")]
    OutOfMemory,
}

/// One known firmware device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    devpath: String,
    open_path: String,
    exposed_name: String,
    canonical: EntryId,
    shortest: Option<EntryId>,
    pub(crate) is_boot: bool,
    is_removable: bool,
    pub(crate) block_size_failures: u8,
}

impl DeviceEntry {
    /// The raw firmware path; unique within the registry.
    #[must_use]
    pub fn devpath(&self) -> &str {
        &self.devpath
    }

    /// The path handed to the firmware `open` service for I/O.
    #[must_use]
    pub fn open_path(&self) -> &str {
        &self.open_path
    }

    /// The `ieee1275/…` name of this path.
    #[must_use]
    pub fn exposed_name(&self) -> &str {
        &self.exposed_name
    }

    /// The head of this entry's group.
    #[must_use]
    pub const fn canonical(&self) -> EntryId {
        self.canonical
    }

    /// The designated entry of the group, if this entry is a group head.
    #[must_use]
    pub const fn shortest(&self) -> Option<EntryId> {
        self.shortest
    }

    #[must_use]
    pub const fn is_boot(&self) -> bool {
        self.is_boot
    }

    #[must_use]
    pub const fn is_removable(&self) -> bool {
        self.is_removable
    }

    /// Consecutive failed block size queries.
    #[must_use]
    pub const fn block_size_failures(&self) -> u8 {
        self.block_size_failures
    }
}

/// A path either already known or staged for insertion.
enum Slot {
    Existing(EntryId),
    New { key: String, entry: DeviceEntry },
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<DeviceEntry>,
    index: HashMap<String, EntryId>,
    no_partition_0: bool,
    limit: Option<usize>,
}

impl Registry {
    #[must_use]
    pub fn new(quirks: FirmwareQuirks) -> Self {
        Self {
            no_partition_0: quirks.no_partition_0(),
            ..Self::default()
        }
    }

    /// Caps the number of entries; adds beyond it fail with
    /// [`RegistryError::OutOfMemory`].
    #[must_use]
    pub const fn with_entry_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find(&self, devpath: &str) -> Option<EntryId> {
        self.index.get(devpath).copied()
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> &DeviceEntry {
        &self.entries[id.0]
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> &mut DeviceEntry {
        &mut self.entries[id.0]
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &DeviceEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (EntryId(i), e))
    }

    /// The entry whose name the group of `id` is exposed under.
    #[must_use]
    pub fn designated(&self, id: EntryId) -> Option<&DeviceEntry> {
        let head = self.entry(id).canonical;
        self.entry(head).shortest.map(|s| self.entry(s))
    }

    /// Records `devpath`, optionally as another name of `canonical`.
    ///
    /// Without a canonical path the entry heads its own group. With one, the
    /// canonical entry is looked up or created and its designee becomes the
    /// strictly shortest of the current designee, `devpath` and the canonical
    /// path itself, in that order.
    ///
    /// # Errors
    /// [`RegistryError::OutOfMemory`] if the entries cannot be allocated, in
    /// which case the registry is left unchanged.
    pub fn add_alias(
        &mut self,
        devpath: &str,
        canonical: Option<&str>,
    ) -> Result<EntryId, RegistryError> {
        debug!(target: "ofdisk", "devpath = {devpath}, canonical = {canonical:?}");
        let canonical = canonical.filter(|c| *c != devpath);

        let needed = usize::from(self.find(devpath).is_none())
            + canonical.map_or(0, |c| usize::from(self.find(c).is_none()));
        self.reserve(needed)?;

        let slot = self.stage(devpath)?;
        let head_slot = canonical.map(|c| self.stage(c)).transpose()?;

        let id = self.commit(slot);
        let Some(head_slot) = head_slot else {
            let entry = &mut self.entries[id.0];
            if entry.shortest.is_none() {
                entry.canonical = id;
                entry.shortest = Some(id);
            }
            entry.is_removable |= is_removable(devpath);
            return Ok(id);
        };

        let head = self.commit(head_slot);
        let entry = &mut self.entries[id.0];
        if entry.shortest.is_none() {
            entry.canonical = head;
        }
        let head_entry = &mut self.entries[head.0];
        if is_removable(devpath) || is_removable(&head_entry.devpath) {
            head_entry.is_removable = true;
        }
        self.offer(head, id);
        self.offer(head, head);
        Ok(id)
    }

    /// Records a discovered device path under the given name.
    ///
    /// Known paths are left alone. Allocation failures are logged and
    /// dropped, as discovery is best effort.
    pub fn register(&mut self, name: &str, path: &str) {
        if self.find(path).is_some() {
            return;
        }
        if let Err(e) = self.add_alias(name, Some(path)) {
            warn!(target: "ofdisk", "dropping {path}: {e}");
        }
    }

    pub(crate) fn mark_boot(&mut self, id: EntryId) {
        self.entries[id.0].is_boot = true;
    }

    fn offer(&mut self, head: EntryId, candidate: EntryId) {
        let len = self.entries[candidate.0].devpath.len();
        let replace = self.entries[head.0]
            .shortest
            .is_none_or(|s| self.entries[s.0].devpath.len() > len);
        if replace {
            self.entries[head.0].shortest = Some(candidate);
        }
    }

    fn reserve(&mut self, needed: usize) -> Result<(), RegistryError> {
        if needed == 0 {
            return Ok(());
        }
        if let Some(limit) = self.limit
            && self.entries.len() + needed > limit
        {
            return Err(RegistryError::OutOfMemory);
        }
        self.entries
            .try_reserve(needed)
            .map_err(|_| RegistryError::OutOfMemory)?;
        self.index
            .try_reserve(needed)
            .map_err(|_| RegistryError::OutOfMemory)
    }

    fn stage(&self, devpath: &str) -> Result<Slot, RegistryError> {
        if let Some(id) = self.find(devpath) {
            return Ok(Slot::Existing(id));
        }

        let open_path = if self.no_partition_0 {
            try_concat(&[devpath])?
        } else {
            try_concat(&[devpath, ":0"])?
        };
        let mut name = String::new();
        name.try_reserve(NAMESPACE.len() + 2 * devpath.len())
            .map_err(|_| RegistryError::OutOfMemory)?;
        name.push_str(NAMESPACE);
        push_escaped(&mut name, name_tail(devpath));

        Ok(Slot::New {
            key: try_concat(&[devpath])?,
            entry: DeviceEntry {
                devpath: try_concat(&[devpath])?,
                open_path,
                exposed_name: name,
                canonical: EntryId(usize::MAX),
                shortest: None,
                is_boot: false,
                is_removable: false,
                block_size_failures: 0,
            },
        })
    }

    fn commit(&mut self, slot: Slot) -> EntryId {
        match slot {
            Slot::Existing(id) => id,
            Slot::New { key, mut entry } => {
                let id = EntryId(self.entries.len());
                entry.canonical = id;
                self.entries.push(entry);
                self.index.insert(key, id);
                id
            }
        }
    }
}

fn try_concat(parts: &[&str]) -> Result<String, RegistryError> {
    let mut s = String::new();
    s.try_reserve(parts.iter().map(|p| p.len()).sum())
        .map_err(|_| RegistryError::OutOfMemory)?;
    for part in parts {
        s.push_str(part);
    }
    Ok(s)
}
