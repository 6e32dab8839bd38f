use crate::{app_bundle, config, APP_EXECUTABLE};
use std::fs;
use unixzip::{
    build_archive, pack_directory, patch_archive, patch_host_os, CompressionLevel, HostSystem,
    ZipSliceArchive, CENTRAL_HEADER_SIGNATURE_BYTES, HOST_SYSTEM_OFFSET,
};

#[test]
fn test_packed_archive_is_fat_until_patched() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let target = dir.path().join("App.app.zip");

    let summary = pack_directory(&bundle, &target, CompressionLevel::Optimal).unwrap();
    let data = fs::read(&target).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    for record in archive.records().unwrap() {
        assert_eq!(record.host_system(), HostSystem::Fat);
        assert_eq!(record.version_made_by() & 0xFF, 20);
    }

    let report = patch_archive(&target, summary.entries()).unwrap();
    assert!(report.is_complete());
    let data = fs::read(&target).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    for record in archive.records().unwrap() {
        assert_eq!(record.host_system(), HostSystem::Unix);
    }
}

#[test]
fn test_patching_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let report = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();

    let mut data = fs::read(&report.archive).unwrap();
    let before = data.clone();
    assert_eq!(patch_host_os(&mut data), 2);
    assert_eq!(data, before);
}

#[test]
fn test_signature_in_stored_payload_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());

    // Long enough that skipping past the false match stays inside the payload
    let mut payload = CENTRAL_HEADER_SIGNATURE_BYTES.to_vec();
    payload.push(0x14);
    payload.extend(std::iter::repeat(b'.').take(100));
    fs::write(bundle.join("Contents/payload.bin"), &payload).unwrap();

    let report = build_archive(&config(CompressionLevel::None), &bundle, APP_EXECUTABLE).unwrap();
    assert_eq!(report.entries(), 3);
    assert_eq!(report.patch.patched, 4);
    assert_eq!(report.patch.expected, 3);
    assert_eq!(report.patch.unpatched, 0);
    assert!(!report.patch.is_complete());
    assert!(!report.is_clean());

    // The payload itself was rewritten
    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    let record = archive
        .find("App.app/Contents/payload.bin")
        .unwrap()
        .unwrap();
    let entry = archive.get_entry(&record).unwrap();
    assert_eq!(entry.data()[HOST_SYSTEM_OFFSET], HostSystem::Unix.as_u8());
    assert!(entry.verify(&payload).is_err());

    // and the executable still verifies
    assert!(report.verification.passed());
}

#[test]
fn test_deflated_payload_avoids_false_match() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let mut payload = CENTRAL_HEADER_SIGNATURE_BYTES.to_vec();
    payload.push(0x14);
    payload.extend(std::iter::repeat(b'.').take(100));
    fs::write(bundle.join("Contents/payload.bin"), &payload).unwrap();

    let report = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    assert!(report.patch.is_complete());
}

#[test]
fn test_header_hidden_by_false_match_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());

    // Last stored payload: a false match close enough to the end that the
    // scan's skip carries it past the first real header
    let mut payload = vec![b'.'; 20];
    payload.extend_from_slice(&CENTRAL_HEADER_SIGNATURE_BYTES);
    payload.push(0x14);
    payload.extend(std::iter::repeat(b'.').take(10));
    fs::write(bundle.join("Contents/zz.bin"), &payload).unwrap();

    let report = build_archive(&config(CompressionLevel::None), &bundle, APP_EXECUTABLE).unwrap();
    assert_eq!(report.entries(), 3);
    assert_eq!(report.patch.patched, 3);
    assert_eq!(report.patch.unpatched, 1);
    assert!(!report.patch.is_complete());
    assert!(!report.is_clean());

    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    let hosts: Vec<_> = archive
        .records()
        .unwrap()
        .iter()
        .map(|r| (r.file_path().unwrap().to_string(), r.host_system()))
        .collect();
    assert_eq!(
        hosts,
        vec![
            ("App.app/Contents/Info.plist".to_string(), HostSystem::Fat),
            (APP_EXECUTABLE.to_string(), HostSystem::Unix),
            ("App.app/Contents/zz.bin".to_string(), HostSystem::Unix),
        ]
    );
}
