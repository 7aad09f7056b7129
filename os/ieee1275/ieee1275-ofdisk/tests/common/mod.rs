#![allow(dead_code)]

use ieee1275_client::Firmware;
use ieee1275_client::sim::{SimFirmware, SimNvmeController, SimReply};
use ieee1275_ofdisk::{DiskPull, Environment, OfDisk};

pub const SECTOR: usize = 512;

pub const VSCSI: &str = "/vdevice/v-scsi@30000002";
pub const VSCSI_DISK_0: &str = "/vdevice/v-scsi@30000002/disk@8100000000000000";
pub const VSCSI_DISK_1: &str = "/vdevice/v-scsi@30000002/disk@8200000000000000";

pub const SAS: &str = "/pci@800000020000011/sas@0";

pub const FCP: &str = "/pci@800000020000015/fibre-channel@0";
pub const WWPN: u64 = 0x5005_0768_0b21_5660;
pub const FCP_DISK_0: &str = "/pci@800000020000015/fibre-channel@0/disk@500507680b215660,0";

pub const NVMEOF_FCP: &str = "/pci@800000020000016/fibre-channel@1";
pub const NVMEOF_NAMESPACE: &str =
    "/pci@800000020000016/fibre-channel@1/nvme-of/controller@abcd,ffff:nqn=nqn.test/namespace@1";

/// `sectors` sectors, each filled with its own index.
pub fn media(sectors: usize) -> Vec<u8> {
    (0..sectors * SECTOR)
        .map(|i| u8::try_from(i / SECTOR).unwrap())
        .collect()
}

/// A virtual SCSI adapter reporting two LUNs on one target.
pub fn vscsi(fw: &mut SimFirmware) {
    fw.add_node(VSCSI, Some("vscsi"));
    fw.on_method(
        VSCSI,
        "vscsi-report-luns",
        &[],
        SimReply::LunRuns(vec![(1, vec![0x8100_0000_0000_0000, 0x8200_0000_0000_0000])]),
    );
    for disk in [VSCSI_DISK_0, VSCSI_DISK_1] {
        fw.add_device(disk, Some("block"));
        fw.set_media(disk, media(8));
    }
}

/// A Fibre Channel adapter with one remote port and two LUNs.
pub fn fcp(fw: &mut SimFirmware, adapter: &str) {
    fw.add_node(adapter, Some("fcp"));
    fw.on_method(adapter, "fcp-targets", &[], SimReply::Descriptors(vec![vec![WWPN]]));
    fw.on_method(
        adapter,
        "fcp-luns",
        &[WWPN >> 32, WWPN & 0xffff_ffff],
        SimReply::Descriptors(vec![vec![0, 1]]),
    );
}

/// An NVMe-oF capable adapter with one controller exposing two namespaces.
pub fn nvmeof(fw: &mut SimFirmware, adapter: &str) {
    fw.add_node(adapter, Some("fcp"));
    let layer = format!("{adapter}/nvme-of");
    fw.on_method(&layer, "nvme-discovery-controllers", &[], SimReply::Ids64(vec![0x10]));
    fw.on_method(
        &format!("{layer}/controller@10,ffff"),
        "nvme-controllers",
        &[],
        SimReply::NvmeControllers(vec![SimNvmeController {
            id: 1,
            transport_address: "abcd".into(),
            nqn: "nqn.test".into(),
        }]),
    );
    fw.on_method(
        &format!("{layer}/controller@abcd,ffff"),
        "get-namespace-list",
        &[],
        SimReply::Ids32(vec![1, 2]),
    );
}

/// Exposed names listed for `pull`.
pub fn names<F: Firmware, E: Environment>(disks: &mut OfDisk<F, E>, pull: DiskPull) -> Vec<String> {
    let mut names = Vec::new();
    disks.iterate(pull, |name| {
        names.push(name.to_string());
        false
    });
    names
}
