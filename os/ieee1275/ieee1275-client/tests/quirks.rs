use ieee1275_client::FirmwareQuirks;

#[test]
fn quirk_bits_are_independent() {
    let quirks = FirmwareQuirks::new()
        .with_no_partition_0(true)
        .with_sdcard_only(true);

    assert!(quirks.no_partition_0());
    assert!(!quirks.no_tree_scanning_for_disks());
    assert!(quirks.sdcard_only());
    assert_eq!(quirks.into_bits(), 0b101);
}

#[test]
fn default_quirks_are_clear() {
    assert_eq!(FirmwareQuirks::new(), FirmwareQuirks::from_bits(0));
}
