mod common;

use common::*;
use ieee1275_client::sim::SimFirmware;
use ieee1275_ofdisk::{DiskPull, OfDisk};

#[test]
fn network_boot_has_no_boot_disk() {
    let mut fw = SimFirmware::new();
    fw.add_node("/pci@0/ethernet@2", Some("network"));
    fw.set_boot_path("/pci@0/ethernet@2:speed=auto,duplex=auto");

    let mut disks = OfDisk::new(fw);
    assert!(disks.boot_context().is_none());
    assert!(disks.registry().is_empty());
    assert!(disks.early_log().is_empty());
    assert_eq!(disks.boot_type(), "boot: (none) type: unknown is_nvmeof? 0");
    assert!(names(&mut disks, DiskPull::None).is_empty());
}

#[test]
fn nvmeof_boot_scans_only_the_fabric() {
    let mut fw = SimFirmware::new();
    nvmeof(&mut fw, NVMEOF_FCP);
    fw.set_boot_path(NVMEOF_NAMESPACE);

    let mut disks = OfDisk::new(fw);
    let boot = disks.boot_context().unwrap();
    assert_eq!(boot.device(), NVMEOF_NAMESPACE);
    assert_eq!(boot.parent(), Some(NVMEOF_FCP));
    assert_eq!(boot.bus_type(), Some("fcp"));
    assert_eq!(boot.over_fabric(), Some(true));
    assert_eq!(
        disks.boot_type(),
        "boot: /pci@800000020000016/fibre-channel@1 type: fcp is_nvmeof? 1"
    );
    assert_eq!(
        disks.early_log().messages().first().map(String::as_str),
        Some(format!("Use {NVMEOF_NAMESPACE} as canonical").as_str())
    );

    let controller =
        "ieee1275/pci@800000020000016/fibre-channel@1/nvme-of/controller@abcd\\,ffff:nqn=nqn.test";
    assert_eq!(
        names(&mut disks, DiskPull::None),
        [format!("{controller}/namespace@1")]
    );
    assert_eq!(
        names(&mut disks, DiskPull::Removable),
        [format!("{controller}/namespace@2"), controller.to_string()]
    );
    assert_eq!(disks.firmware().method_calls("fcp-targets"), 0);
}

#[test]
fn unresolvable_boot_path_still_registers_the_device() {
    let mut fw = SimFirmware::new();
    fw.set_boot_path("hd:2");

    let mut disks = OfDisk::new(fw);
    let boot = disks.boot_context().unwrap();
    assert_eq!(boot.device(), "hd");
    assert_eq!(boot.parent(), None);
    assert_eq!(boot.over_fabric(), None);
    assert_eq!(
        disks.early_log().messages(),
        [
            "bootpath: hd:2",
            "alias: hd:2",
            "canonical: cannot canonicalise hd:2",
            "the boot device type is unknown",
        ]
    );
    assert_eq!(names(&mut disks, DiskPull::None), ["ieee1275/hd"]);
}

#[test]
fn boot_disk_open_uses_the_registered_entry() {
    let mut fw = SimFirmware::new();
    vscsi(&mut fw);
    fw.set_boot_path(&format!("{VSCSI_DISK_0}:3"));

    let mut disks = OfDisk::new(fw);
    let boot = disks.boot_context().unwrap().entry();
    let name = names(&mut disks, DiskPull::None).remove(0);
    let disk = disks.open(&name).unwrap();
    assert_eq!(disk.entry(), boot);
    assert!(disks.registry().entry(boot).is_boot());
    assert_eq!(disks.read(&disk, 0, 1).unwrap(), vec![0; SECTOR]);
}
