//! Firmware device path helpers.
//!
//! Disks are exposed to the block layer as `ieee1275/<devpath>` where every
//! literal comma of the device path is escaped as `\,`, since the block layer
//! uses commas to separate a disk from its partition. The leading `/` of an
//! absolute device path doubles as the namespace separator, so
//! `/pci@0/disk@1` becomes `ieee1275/pci@0/disk@1` and the alias `hd`
//! becomes `ieee1275/hd`.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// Namespace prefix of every exposed disk name.
pub const NAMESPACE: &str = "ieee1275/";

/// Marks the disk component of a canonical SCSI/FC/SAS path.
pub const DISK_MARKER: &str = "/disk@";

/// Marks the controller component of a canonical NVMe-oF path.
pub const NVMEOF_MARKER: &str = "/nvme-of/controller@";

#[must_use]
pub fn escape_commas(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len() + path.matches(',').count());
    push_escaped(&mut escaped, path);
    escaped
}

/// Appends `path` to `out` with commas escaped.
pub fn push_escaped(out: &mut String, path: &str) {
    for c in path.chars() {
        if c == ',' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Reverses [`escape_commas`]. Backslashes not followed by a comma are kept.
#[must_use]
pub fn unescape_commas(name: &str) -> String {
    let mut raw = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&',') {
            continue;
        }
        raw.push(c);
    }
    raw
}

/// The name a device path is exposed under.
#[must_use]
pub fn exposed_name(devpath: &str) -> String {
    let mut name = String::from(NAMESPACE);
    push_escaped(&mut name, name_tail(devpath));
    name
}

/// The part of `devpath` that follows the [`NAMESPACE`] in its exposed name.
#[must_use]
pub fn name_tail(devpath: &str) -> &str {
    devpath.strip_prefix('/').unwrap_or(devpath)
}

/// Recovers the absolute device path from an exposed name.
///
/// Names of alias entries come back with a leading `/` too; see
/// [`alias_of`]. Returns `None` if the name lies outside the [`NAMESPACE`].
#[must_use]
pub fn devpath_from_name(name: &str) -> Option<String> {
    let tail = unescape_commas(name.strip_prefix(NAMESPACE)?);
    if tail.starts_with('/') {
        return Some(tail);
    }
    let mut devpath = String::with_capacity(tail.len() + 1);
    devpath.push('/');
    devpath.push_str(&tail);
    Some(devpath)
}

/// The alias name an absolute path recovered by [`devpath_from_name`] may
/// stand for.
#[must_use]
pub fn alias_of(devpath: &str) -> Option<&str> {
    devpath.strip_prefix('/').filter(|alias| !alias.is_empty())
}

/// The last component of a path, including unit address and arguments.
#[must_use]
pub fn last_component(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// CD-ROM and floppy drives are removable.
#[must_use]
pub fn is_removable(path: &str) -> bool {
    let last = last_component(path);
    last.starts_with("cdrom") || last.starts_with("fd")
}

/// Whether a boot path already names a disk or NVMe-oF controller.
#[must_use]
pub fn is_canonical(path: &str) -> bool {
    path.contains(DISK_MARKER) || path.contains(NVMEOF_MARKER)
}

/// Strips the trailing disk or controller component of a canonical path.
///
/// Returns the parent (the HBA node) and whether the path goes through an
/// NVMe-over-Fabric controller. Paths without either marker are returned
/// unchanged.
#[must_use]
pub fn split_parent(path: &str) -> (&str, bool) {
    if let Some(at) = path.find(DISK_MARKER) {
        (&path[..at], false)
    } else if let Some(at) = path.find(NVMEOF_MARKER) {
        (&path[..at], true)
    } else {
        (path, false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    unit: Option<String>,
    args: Option<String>,
}

/// A device path assembled from an existing node and synthesized children.
///
/// ```
/// use ieee1275_ofdisk::path::DevicePath;
///
/// let path = DevicePath::new("/pci@0/fibre-channel@1")
///     .child("disk", format_args!("{:x},{:x}", 0x5005_0768_u64, 0))
///     .to_string();
/// assert_eq!(path, "/pci@0/fibre-channel@1/disk@50050768,0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath {
    base: String,
    segments: Vec<Segment>,
}

impl DevicePath {
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            segments: Vec::new(),
        }
    }

    /// Appends a component without a unit address.
    #[must_use]
    pub fn node(mut self, name: &str) -> Self {
        self.segments.push(Segment {
            name: name.to_string(),
            unit: None,
            args: None,
        });
        self
    }

    /// Appends `name@unit`.
    #[must_use]
    pub fn child(mut self, name: &str, unit: impl fmt::Display) -> Self {
        self.segments.push(Segment {
            name: name.to_string(),
            unit: Some(unit.to_string()),
            args: None,
        });
        self
    }

    /// Sets the `:args` of the last component.
    #[must_use]
    pub fn args(mut self, args: impl fmt::Display) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.args = Some(args.to_string());
        }
        self
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for segment in &self.segments {
            write!(f, "/{}", segment.name)?;
            if let Some(unit) = &segment.unit {
                write!(f, "@{unit}")?;
            }
            if let Some(args) = &segment.args {
                write!(f, ":{args}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_escaping_round_trips() {
        let path = "/pci@800000020000015/fibre-channel@0/disk@5005076802232ade,0";
        let escaped = escape_commas(path);
        assert_eq!(
            escaped,
            "/pci@800000020000015/fibre-channel@0/disk@5005076802232ade\\,0"
        );
        assert_eq!(unescape_commas(&escaped), path);
    }

    #[test]
    fn lone_backslashes_survive_unescaping() {
        assert_eq!(unescape_commas("a\\b\\,c"), "a\\b,c");
    }

    #[test]
    fn exposed_names_live_in_the_namespace() {
        let name = exposed_name("/vdevice/v-scsi@2000/disk@8,1");
        assert_eq!(name, "ieee1275/vdevice/v-scsi@2000/disk@8\\,1");
        assert_eq!(
            devpath_from_name(&name).as_deref(),
            Some("/vdevice/v-scsi@2000/disk@8,1")
        );
        assert_eq!(exposed_name("hd"), "ieee1275/hd");
        assert_eq!(devpath_from_name("hd0"), None);
    }

    #[test]
    fn names_round_trip_to_absolute_paths() {
        for path in [
            "/pci@0/scsi@1/disk@0",
            "/pci@800000020000015/fibre-channel@0/disk@500507680b215660,0",
            "/fc@0/nvme-of/controller@abcd,ffff:nqn=nqn.test/namespace@1",
        ] {
            assert_eq!(devpath_from_name(&exposed_name(path)).as_deref(), Some(path));
        }
        // a doubled separator is accepted as well
        assert_eq!(
            devpath_from_name("ieee1275//pci@0/disk@1").as_deref(),
            Some("/pci@0/disk@1")
        );
    }

    #[test]
    fn alias_names_come_back_absolute() {
        let devpath = devpath_from_name(&exposed_name("hd")).unwrap();
        assert_eq!(devpath, "/hd");
        assert_eq!(alias_of(&devpath), Some("hd"));
        assert_eq!(alias_of("/"), None);
    }

    #[test]
    fn removable_by_last_component() {
        assert!(is_removable("/pci@0/ide@1/cdrom@0"));
        assert!(is_removable("/isa@0/fdc@3f0/fd@0"));
        assert!(!is_removable("/pci@0/cdrom@0/disk@1"));
        assert!(!is_removable("/pci@0/scsi@1/disk@0"));
    }

    #[test]
    fn canonical_markers() {
        assert!(is_canonical("/pci@0/scsi@1/disk@0"));
        assert!(is_canonical("/fc@0/nvme-of/controller@1,ffff"));
        assert!(!is_canonical("disk"));
    }

    #[test]
    fn parent_strips_the_disk_or_controller() {
        assert_eq!(
            split_parent("/pci@0/fibre-channel@1/disk@500507,0:2"),
            ("/pci@0/fibre-channel@1", false)
        );
        assert_eq!(
            split_parent("/pci@0/fibre-channel@1/nvme-of/controller@a,ffff:nqn=x/namespace@1"),
            ("/pci@0/fibre-channel@1", true)
        );
        assert_eq!(split_parent("/pci@0/usb@1"), ("/pci@0/usb@1", false));
    }

    #[test]
    fn builder_assembles_nvmeof_paths() {
        let controller = DevicePath::new("/fc@0")
            .node("nvme-of")
            .child("controller", "abcd,ffff")
            .args("nqn=nqn.test");
        assert_eq!(
            controller.to_string(),
            "/fc@0/nvme-of/controller@abcd,ffff:nqn=nqn.test"
        );
        assert_eq!(
            controller.child("namespace", format_args!("{:x}", 1)).to_string(),
            "/fc@0/nvme-of/controller@abcd,ffff:nqn=nqn.test/namespace@1"
        );
    }
}
