//! An in-memory Open Firmware.
//!
//! [`SimFirmware`] models just enough of a real client interface to drive
//! device discovery and disk I/O from tests: a device tree with properties,
//! aliases, scripted vendor methods whose result tables live in simulated
//! firmware memory, per-node backing media, a virtual clock, and a journal of
//! every call that mutates instance state.

use crate::{Cell, DevAlias, Firmware, FirmwareError, FirmwareQuirks, IHandle, MethodArg, PHandle};
use crate::{CHOSEN, property_string};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use log::{trace, warn};

/// First address handed out for simulated firmware memory.
const MEMORY_BASE: u64 = 0x1000_0000;

/// Instance handle of the console.
const CONSOLE: IHandle = IHandle::new(1);

/// Length of a transport address or NQN field in an NVMe controller record.
pub const NVME_STRING_LEN: usize = 256;

/// A controller record returned by `nvme-controllers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNvmeController {
    pub id: u16,
    pub transport_address: String,
    pub nqn: String,
}

/// A scripted result of a vendor method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimReply {
    /// Return the given cells verbatim.
    Cells(Vec<Cell>),
    /// `vscsi-report-luns` layout: `(count, table)` with one
    /// `{u32 target, u32 run}` record per target. Runs are zero-terminated
    /// lists of u64 LUN ids. The memory outlives the instance.
    LunRuns(Vec<(u32, Vec<u64>)>),
    /// `(count, table)` where each `{u64 address, u64 count}` descriptor points
    /// at a list of u64 ids.
    Descriptors(Vec<Vec<u64>>),
    /// `(count, table)` of u64 ids.
    Ids64(Vec<u64>),
    /// `(count, table)` of u32 ids.
    Ids32(Vec<u32>),
    /// `(count, table)` of 514-byte controller records.
    NvmeControllers(Vec<SimNvmeController>),
    /// Writes u64 ids into the first buffer argument and returns the count.
    FillBuffer(Vec<u64>),
    /// The method raises a `catch-result`.
    Throw(i64),
    /// The client interface call itself fails.
    Fail,
}

/// A call recorded by [`SimFirmware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Open { path: String, ihandle: IHandle },
    OpenFailed { path: String },
    Close { ihandle: IHandle },
    Method { path: String, method: String },
    Seek { ihandle: IHandle, offset: u64 },
    Read { ihandle: IHandle, len: usize },
    Write { ihandle: IHandle, len: usize },
    Sleep { ms: u64 },
}

#[derive(Debug, Clone)]
struct ScriptedMethod {
    method: String,
    args: Vec<Cell>,
    reply: SimReply,
}

#[derive(Debug)]
struct SimNode {
    phandle: PHandle,
    listed: bool,
    properties: BTreeMap<String, Vec<u8>>,
    methods: Vec<ScriptedMethod>,
    media: Option<Vec<u8>>,
}

#[derive(Debug)]
struct Instance {
    node: String,
    position: u64,
}

#[derive(Debug)]
struct Region {
    bytes: Vec<u8>,
    owner: Option<IHandle>,
}

/// A scriptable in-memory firmware.
#[derive(Debug)]
pub struct SimFirmware {
    nodes: BTreeMap<String, SimNode>,
    phandles: Vec<String>,
    aliases: BTreeMap<String, String>,
    canonical: BTreeMap<String, String>,
    quirks: FirmwareQuirks,
    instances: BTreeMap<u32, Instance>,
    next_ihandle: u32,
    regions: BTreeMap<u64, Region>,
    next_address: u64,
    open_failures: BTreeMap<String, u32>,
    clock_ms: u64,
    journal: Vec<SimEvent>,
    console: String,
}

impl Default for SimFirmware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFirmware {
    /// Creates a firmware with an empty tree, a `/chosen` node and a console.
    #[must_use]
    pub fn new() -> Self {
        let mut fw = Self {
            nodes: BTreeMap::new(),
            phandles: Vec::new(),
            aliases: BTreeMap::new(),
            canonical: BTreeMap::new(),
            quirks: FirmwareQuirks::new(),
            instances: BTreeMap::new(),
            next_ihandle: CONSOLE.as_u32() + 1,
            regions: BTreeMap::new(),
            next_address: MEMORY_BASE,
            open_failures: BTreeMap::new(),
            clock_ms: 0,
            journal: Vec::new(),
            console: String::new(),
        };
        fw.insert_node("/", true);
        fw.insert_node(CHOSEN, false);
        fw.set_property(CHOSEN, "stdout", &CONSOLE.as_u32().to_be_bytes());
        fw
    }

    #[must_use]
    pub fn with_quirks(mut self, quirks: FirmwareQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Adds a node that is visible to [`Firmware::children`], creating any
    /// missing ancestors.
    pub fn add_node(&mut self, path: &str, device_type: Option<&str>) -> &mut Self {
        self.add(path, device_type, true)
    }

    /// Adds a node that can be found and opened but is not listed as a child
    /// of its parent, like the synthesized disks behind a vendor method.
    pub fn add_device(&mut self, path: &str, device_type: Option<&str>) -> &mut Self {
        self.add(path, device_type, false)
    }

    fn add(&mut self, path: &str, device_type: Option<&str>, listed: bool) -> &mut Self {
        let mut end = 0;
        while let Some(offset) = path[end + 1..].find('/') {
            end += offset + 1;
            self.insert_node(&path[..end], true);
        }
        self.insert_node(path, listed);
        if let Some(device_type) = device_type {
            self.set_string_property(path, "device_type", device_type);
        }
        self
    }

    fn insert_node(&mut self, path: &str, listed: bool) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.listed |= listed;
            return;
        }
        self.phandles.push(path.to_string());
        let phandle = PHandle::new(u32::try_from(self.phandles.len()).unwrap_or(u32::MAX));
        self.nodes.insert(
            path.to_string(),
            SimNode {
                phandle,
                listed,
                properties: BTreeMap::new(),
                methods: Vec::new(),
                media: None,
            },
        );
    }

    /// Sets a raw property, creating an unlisted node if needed.
    pub fn set_property(&mut self, path: &str, name: &str, value: &[u8]) -> &mut Self {
        if !self.nodes.contains_key(path) {
            self.add_device(path, None);
        }
        if let Some(node) = self.nodes.get_mut(path) {
            node.properties.insert(name.to_string(), value.to_vec());
        }
        self
    }

    /// Sets a NUL-terminated string property.
    pub fn set_string_property(&mut self, path: &str, name: &str, value: &str) -> &mut Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.set_property(path, name, &bytes)
    }

    pub fn add_alias(&mut self, name: &str, path: &str) -> &mut Self {
        self.aliases.insert(name.to_string(), path.to_string());
        self
    }

    /// Scripts the result of `canonicalise(path)`.
    pub fn set_canonical(&mut self, path: &str, canonical: &str) -> &mut Self {
        self.canonical.insert(path.to_string(), canonical.to_string());
        self
    }

    /// Sets `/chosen/bootpath`.
    pub fn set_boot_path(&mut self, path: &str) -> &mut Self {
        self.set_string_property(CHOSEN, "bootpath", path)
    }

    /// Scripts a vendor method on the node at `path`.
    ///
    /// A call matches when the method name and all plain cell arguments are
    /// equal; buffer arguments are not compared.
    pub fn on_method(
        &mut self,
        path: &str,
        method: &str,
        args: &[Cell],
        reply: SimReply,
    ) -> &mut Self {
        if !self.nodes.contains_key(path) {
            self.add_device(path, None);
        }
        if let Some(node) = self.nodes.get_mut(path) {
            node.methods.push(ScriptedMethod {
                method: method.to_string(),
                args: args.to_vec(),
                reply,
            });
        }
        self
    }

    /// Attaches backing media to the node at `path`.
    pub fn set_media(&mut self, path: &str, bytes: Vec<u8>) -> &mut Self {
        if !self.nodes.contains_key(path) {
            self.add_device(path, None);
        }
        if let Some(node) = self.nodes.get_mut(path) {
            node.media = Some(bytes);
        }
        self
    }

    /// Makes the next `count` opens of the node at `path` fail.
    pub fn fail_opens(&mut self, path: &str, count: u32) -> &mut Self {
        self.open_failures.insert(path.to_string(), count);
        self
    }

    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    #[must_use]
    pub fn journal(&self) -> &[SimEvent] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Number of successful opens recorded in the journal.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.journal
            .iter()
            .filter(|e| matches!(e, SimEvent::Open { .. }))
            .count()
    }

    /// Number of failed opens recorded in the journal.
    #[must_use]
    pub fn failed_opens(&self) -> usize {
        self.journal
            .iter()
            .filter(|e| matches!(e, SimEvent::OpenFailed { .. }))
            .count()
    }

    /// Number of closes recorded in the journal.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.journal
            .iter()
            .filter(|e| matches!(e, SimEvent::Close { .. }))
            .count()
    }

    /// Number of calls to `method` recorded in the journal.
    #[must_use]
    pub fn method_calls(&self, method: &str) -> usize {
        self.journal
            .iter()
            .filter(|e| matches!(e, SimEvent::Method { method: m, .. } if m == method))
            .count()
    }

    /// Number of device instances currently open, not counting the console.
    #[must_use]
    pub fn open_instances(&self) -> usize {
        self.instances.len()
    }

    /// Everything written to the console instance.
    #[must_use]
    pub fn console_output(&self) -> &str {
        &self.console
    }

    /// The backing media of the node at `path`.
    #[must_use]
    pub fn media(&self, path: &str) -> Option<&[u8]> {
        self.nodes.get(path).and_then(|n| n.media.as_deref())
    }

    /// Resolves a leading alias and strips the `:args` of the last component.
    fn resolve(&self, path: &str) -> Option<String> {
        let mut path = self.expand_alias(path);
        if !self.nodes.contains_key(&path) {
            let last = path.rfind('/').unwrap_or(0);
            if let Some(colon) = path[last..].find(':') {
                path.truncate(last + colon);
            }
        }
        self.nodes.contains_key(&path).then_some(path)
    }

    fn expand_alias(&self, path: &str) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }
        let end = path.find(['/', ':']).unwrap_or(path.len());
        match self.aliases.get(&path[..end]) {
            Some(target) => format!("{target}{}", &path[end..]),
            None => path.to_string(),
        }
    }

    fn instance(&self, ihandle: IHandle) -> Result<&Instance, FirmwareError> {
        self.instances
            .get(&ihandle.as_u32())
            .ok_or(FirmwareError::InvalidHandle(ihandle.as_u32()))
    }

    fn allocate(&mut self, bytes: Vec<u8>, owner: Option<IHandle>) -> u64 {
        let address = self.next_address;
        let len = bytes.len() as u64;
        self.next_address += len.next_multiple_of(16) + 16;
        self.regions.insert(address, Region { bytes, owner });
        address
    }

    fn reply(
        &mut self,
        ihandle: IHandle,
        method: &str,
        reply: SimReply,
        args: &mut [MethodArg<'_>],
        rets: &mut [Cell],
    ) -> Result<(), FirmwareError> {
        let cells = match reply {
            SimReply::Cells(cells) => cells,
            SimReply::LunRuns(targets) => {
                let mut table = Vec::with_capacity(targets.len() * 8);
                for (target, luns) in &targets {
                    let mut run: Vec<u8> = luns.iter().flat_map(|l| l.to_be_bytes()).collect();
                    run.extend_from_slice(&0u64.to_be_bytes());
                    let address = self.allocate(run, None);
                    table.extend_from_slice(&target.to_be_bytes());
                    table.extend_from_slice(&u32::try_from(address).unwrap_or(0).to_be_bytes());
                }
                let address = self.allocate(table, None);
                vec![targets.len() as Cell, address]
            }
            SimReply::Descriptors(lists) => {
                let mut table = Vec::with_capacity(lists.len() * 16);
                for list in &lists {
                    let bytes = list.iter().flat_map(|id| id.to_be_bytes()).collect();
                    let address = self.allocate(bytes, Some(ihandle));
                    table.extend_from_slice(&address.to_be_bytes());
                    table.extend_from_slice(&(list.len() as u64).to_be_bytes());
                }
                let address = self.allocate(table, Some(ihandle));
                vec![lists.len() as Cell, address]
            }
            SimReply::Ids64(ids) => {
                let bytes = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
                let address = self.allocate(bytes, Some(ihandle));
                vec![ids.len() as Cell, address]
            }
            SimReply::Ids32(ids) => {
                let bytes = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
                let address = self.allocate(bytes, Some(ihandle));
                vec![ids.len() as Cell, address]
            }
            SimReply::NvmeControllers(controllers) => {
                let mut table = Vec::with_capacity(controllers.len() * (2 + 2 * NVME_STRING_LEN));
                for controller in &controllers {
                    table.extend_from_slice(&controller.id.to_be_bytes());
                    push_fixed_string(&mut table, &controller.transport_address);
                    push_fixed_string(&mut table, &controller.nqn);
                }
                let address = self.allocate(table, Some(ihandle));
                vec![controllers.len() as Cell, address]
            }
            SimReply::FillBuffer(ids) => {
                let Some(buffer) = args.iter_mut().find_map(|a| match a {
                    MethodArg::Buffer(buffer) => Some(buffer),
                    MethodArg::Cell(_) => None,
                }) else {
                    return Err(FirmwareError::CallFailed);
                };
                let mut written = 0;
                for (slot, id) in buffer.chunks_exact_mut(8).zip(&ids) {
                    slot.copy_from_slice(&id.to_be_bytes());
                    written += 1;
                }
                vec![written]
            }
            SimReply::Throw(code) => {
                return Err(FirmwareError::MethodThrew {
                    method: method.to_string(),
                    code,
                });
            }
            SimReply::Fail => return Err(FirmwareError::CallFailed),
        };
        for (ret, cell) in rets.iter_mut().zip(cells) {
            *ret = cell;
        }
        Ok(())
    }
}

fn push_fixed_string(table: &mut Vec<u8>, value: &str) {
    let mut field = [0u8; NVME_STRING_LEN];
    let len = value.len().min(NVME_STRING_LEN - 1);
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
    table.extend_from_slice(&field);
}

impl Firmware for SimFirmware {
    fn open(&mut self, path: &str) -> Result<IHandle, FirmwareError> {
        let Some(node) = self.resolve(path) else {
            self.journal.push(SimEvent::OpenFailed {
                path: path.to_string(),
            });
            return Err(FirmwareError::OpenFailed(path.to_string()));
        };
        if let Some(remaining) = self.open_failures.get_mut(&node)
            && *remaining > 0
        {
            *remaining -= 1;
            self.journal.push(SimEvent::OpenFailed {
                path: path.to_string(),
            });
            return Err(FirmwareError::OpenFailed(path.to_string()));
        }

        let ihandle = IHandle::new(self.next_ihandle);
        self.next_ihandle += 1;
        trace!("sim: open {path} -> {:#x}", ihandle.as_u32());
        self.instances.insert(
            ihandle.as_u32(),
            Instance {
                node,
                position: 0,
            },
        );
        self.journal.push(SimEvent::Open {
            path: path.to_string(),
            ihandle,
        });
        Ok(ihandle)
    }

    fn close(&mut self, ihandle: IHandle) {
        if ihandle == CONSOLE {
            return;
        }
        if self.instances.remove(&ihandle.as_u32()).is_none() {
            warn!("sim: close of unknown instance {:#x}", ihandle.as_u32());
            return;
        }
        self.regions.retain(|_, r| r.owner != Some(ihandle));
        self.journal.push(SimEvent::Close { ihandle });
    }

    fn read(&mut self, ihandle: IHandle, buf: &mut [u8]) -> Result<usize, FirmwareError> {
        let instance = self.instance(ihandle)?;
        let media = self
            .nodes
            .get(&instance.node)
            .and_then(|n| n.media.as_deref())
            .ok_or(FirmwareError::CallFailed)?;
        let start = usize::try_from(instance.position).unwrap_or(usize::MAX).min(media.len());
        let count = buf.len().min(media.len() - start);
        buf[..count].copy_from_slice(&media[start..start + count]);
        if let Some(instance) = self.instances.get_mut(&ihandle.as_u32()) {
            instance.position += count as u64;
        }
        self.journal.push(SimEvent::Read { ihandle, len: count });
        Ok(count)
    }

    fn write(&mut self, ihandle: IHandle, buf: &[u8]) -> Result<usize, FirmwareError> {
        if ihandle == CONSOLE {
            self.console.push_str(&String::from_utf8_lossy(buf));
            return Ok(buf.len());
        }
        let instance = self.instance(ihandle)?;
        let node = instance.node.clone();
        let position = instance.position;
        let media = self
            .nodes
            .get_mut(&node)
            .and_then(|n| n.media.as_mut())
            .ok_or(FirmwareError::CallFailed)?;
        let start = usize::try_from(position).unwrap_or(usize::MAX).min(media.len());
        let count = buf.len().min(media.len() - start);
        media[start..start + count].copy_from_slice(&buf[..count]);
        if let Some(instance) = self.instances.get_mut(&ihandle.as_u32()) {
            instance.position += count as u64;
        }
        self.journal.push(SimEvent::Write { ihandle, len: count });
        Ok(count)
    }

    fn seek(&mut self, ihandle: IHandle, offset: u64) -> Result<(), FirmwareError> {
        let instance = self.instance(ihandle)?;
        let len = self
            .nodes
            .get(&instance.node)
            .and_then(|n| n.media.as_ref())
            .map(Vec::len)
            .ok_or(FirmwareError::SeekFailed(offset))?;
        if offset > len as u64 {
            return Err(FirmwareError::SeekFailed(offset));
        }
        if let Some(instance) = self.instances.get_mut(&ihandle.as_u32()) {
            instance.position = offset;
        }
        self.journal.push(SimEvent::Seek { ihandle, offset });
        Ok(())
    }

    fn find_device(&self, path: &str) -> Result<PHandle, FirmwareError> {
        self.resolve(path)
            .and_then(|p| self.nodes.get(&p))
            .map(|n| n.phandle)
            .ok_or_else(|| FirmwareError::NoSuchDevice(path.to_string()))
    }

    fn get_property(&self, node: PHandle, name: &str) -> Result<Vec<u8>, FirmwareError> {
        let index = usize::try_from(node.as_u32()).unwrap_or(usize::MAX);
        index
            .checked_sub(1)
            .and_then(|i| self.phandles.get(i))
            .and_then(|path| self.nodes.get(path))
            .and_then(|n| n.properties.get(name))
            .cloned()
            .ok_or_else(|| FirmwareError::NoSuchProperty(name.to_string()))
    }

    fn call_method(
        &mut self,
        ihandle: IHandle,
        method: &str,
        args: &mut [MethodArg<'_>],
        rets: &mut [Cell],
    ) -> Result<(), FirmwareError> {
        let node = self.instance(ihandle)?.node.clone();
        self.journal.push(SimEvent::Method {
            path: node.clone(),
            method: method.to_string(),
        });
        let cells: Vec<Cell> = args
            .iter()
            .filter_map(|a| match a {
                MethodArg::Cell(c) => Some(*c),
                MethodArg::Buffer(_) => None,
            })
            .collect();
        let reply = self
            .nodes
            .get(&node)
            .and_then(|n| {
                n.methods
                    .iter()
                    .find(|m| m.method == method && m.args == cells)
            })
            .map(|m| m.reply.clone())
            .ok_or_else(|| FirmwareError::MethodNotFound(method.to_string()))?;
        self.reply(ihandle, method, reply, args, rets)
    }

    fn memory(&self, addr: Cell, len: usize) -> Result<&[u8], FirmwareError> {
        let bad = || FirmwareError::BadAddress { addr, len };
        let (&base, region) = self.regions.range(..=addr).next_back().ok_or_else(bad)?;
        let start = usize::try_from(addr - base).map_err(|_| bad())?;
        let end = start.checked_add(len).ok_or_else(bad)?;
        region.bytes.get(start..end).ok_or_else(bad)
    }

    fn aliases(&self) -> Result<Vec<DevAlias>, FirmwareError> {
        Ok(self
            .aliases
            .iter()
            .map(|(name, path)| DevAlias {
                name: name.clone(),
                path: path.clone(),
                device_type: self.node_type(path),
            })
            .collect())
    }

    fn children(&self, path: &str) -> Result<Vec<DevAlias>, FirmwareError> {
        if !self.nodes.contains_key(path) {
            return Err(FirmwareError::NoSuchDevice(path.to_string()));
        }
        Ok(self
            .nodes
            .iter()
            .filter(|(child, node)| node.listed && parent_of(child) == Some(path))
            .map(|(child, _)| DevAlias {
                name: child.rsplit('/').next().unwrap_or_default().to_string(),
                path: child.clone(),
                device_type: self.node_type(child),
            })
            .collect())
    }

    fn canonicalise(&self, path: &str) -> Result<String, FirmwareError> {
        if let Some(canonical) = self.canonical.get(path) {
            return Ok(canonical.clone());
        }
        let expanded = self.expand_alias(path);
        if self.resolve(&expanded).is_some() {
            Ok(expanded)
        } else {
            Err(FirmwareError::Canonicalise(path.to_string()))
        }
    }

    fn milliseconds(&self) -> u64 {
        self.clock_ms
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.clock_ms += ms;
        self.journal.push(SimEvent::Sleep { ms });
    }

    fn quirks(&self) -> FirmwareQuirks {
        self.quirks
    }
}

impl SimFirmware {
    fn node_type(&self, path: &str) -> Option<String> {
        self.nodes
            .get(path)
            .and_then(|n| n.properties.get("device_type"))
            .map(|v| property_string(v))
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_lists_only_listed_direct_descendants() {
        let mut fw = SimFirmware::new();
        fw.add_node("/pci@0/scsi@1", Some("vscsi"));
        fw.add_device("/pci@0/scsi@1/disk@2", Some("block"));

        let root: Vec<_> = fw.children("/").unwrap().into_iter().map(|c| c.path).collect();
        assert_eq!(root, ["/pci@0"]);

        let pci = fw.children("/pci@0").unwrap();
        assert_eq!(pci.len(), 1);
        assert_eq!(pci[0].name, "scsi@1");
        assert!(pci[0].is_type("vscsi"));

        assert!(fw.children("/pci@0/scsi@1").unwrap().is_empty());
        assert!(fw.find_device("/pci@0/scsi@1/disk@2").is_ok());
    }

    #[test]
    fn open_resolves_aliases_and_arguments() {
        let mut fw = SimFirmware::new();
        fw.add_node("/pci@0/disk@0", Some("block"));
        fw.add_alias("hd", "/pci@0/disk@0");

        let a = fw.open("hd:0").unwrap();
        let b = fw.open("/pci@0/disk@0:2,\\ppc\\boot").unwrap();
        assert_ne!(a, b);
        assert_eq!(fw.open_instances(), 2);
        assert!(fw.open("/pci@0/disk@9").is_err());
        assert_eq!(fw.opens(), 2);
        assert_eq!(fw.failed_opens(), 1);
    }

    #[test]
    fn instance_memory_is_released_on_close() {
        let mut fw = SimFirmware::new();
        fw.add_node("/fc@0", Some("fcp"));
        fw.on_method("/fc@0", "ids", &[], SimReply::Ids64(vec![7, 9]));
        fw.on_method("/fc@0", "runs", &[], SimReply::LunRuns(vec![(1, vec![5])]));

        let ihandle = fw.open("/fc@0").unwrap();
        let mut rets = [0; 2];
        fw.call_method(ihandle, "ids", &mut [], &mut rets).unwrap();
        assert_eq!(rets[0], 2);
        assert_eq!(fw.memory(rets[1], 16).unwrap()[7], 7);
        let ids = rets[1];

        let mut runs = [0; 2];
        fw.call_method(ihandle, "runs", &mut [], &mut runs).unwrap();

        fw.close(ihandle);
        assert!(fw.memory(ids, 16).is_err());
        assert!(fw.memory(runs[1], 8).is_ok());
    }

    #[test]
    fn fill_buffer_writes_caller_memory() {
        let mut fw = SimFirmware::new();
        fw.add_node("/sas@0", Some("sas_ioa"));
        fw.on_method("/sas@0", "get-sas-children", &[2], SimReply::FillBuffer(vec![1, 2, 3]));

        let ihandle = fw.open("/sas@0").unwrap();
        let mut buffer = [0u8; 16];
        let mut rets = [0; 1];
        fw.call_method(
            ihandle,
            "get-sas-children",
            &mut [MethodArg::Cell(2), MethodArg::Buffer(&mut buffer)],
            &mut rets,
        )
        .unwrap();
        assert_eq!(rets[0], 2);
        assert_eq!(buffer[15], 2);
    }

    #[test]
    fn unscripted_and_failing_methods() {
        let mut fw = SimFirmware::new();
        fw.add_node("/v@0", Some("vscsi"));
        fw.on_method("/v@0", "boom", &[], SimReply::Throw(-1));
        let ihandle = fw.open("/v@0").unwrap();

        assert_eq!(
            fw.call_method(ihandle, "missing", &mut [], &mut []),
            Err(FirmwareError::MethodNotFound("missing".into()))
        );
        assert!(matches!(
            fw.call_method(ihandle, "boom", &mut [], &mut []),
            Err(FirmwareError::MethodThrew { code: -1, .. })
        ));
        assert_eq!(fw.method_calls("boom"), 1);
    }

    #[test]
    fn media_io_and_clock() {
        let mut fw = SimFirmware::new();
        fw.add_device("/d@0", Some("block"));
        fw.set_media("/d@0", vec![0xAA; 1024]);
        fw.fail_opens("/d@0", 1);

        assert!(fw.open("/d@0:0").is_err());
        let ihandle = fw.open("/d@0:0").unwrap();
        fw.seek(ihandle, 1000).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(fw.read(ihandle, &mut buf).unwrap(), 24);
        assert!(fw.seek(ihandle, 2048).is_err());

        fw.seek(ihandle, 0).unwrap();
        assert_eq!(fw.write(ihandle, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(&fw.media("/d@0").unwrap()[..4], &[1, 2, 3, 0xAA]);

        fw.sleep_ms(1000);
        assert_eq!(fw.milliseconds(), 1000);
    }

    #[test]
    fn console_writes_are_captured() {
        let mut fw = SimFirmware::new();
        let node = fw.find_device(CHOSEN).unwrap();
        let stdout = fw.get_property(node, "stdout").unwrap();
        let ihandle = IHandle::new(u32::from_be_bytes(stdout.try_into().unwrap()));
        fw.write(ihandle, b"hello\n").unwrap();
        assert_eq!(fw.console_output(), "hello\n");
    }
}
