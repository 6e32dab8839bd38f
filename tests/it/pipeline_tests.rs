use crate::{app_bundle, config, read_entry, APP_EXECUTABLE};
use rstest::rstest;
use std::fs;
use unixzip::{
    build_archive, ArchiveConfig, CompressionLevel, CompressionMethod, ErrorKind, HostSystem,
    PatchReport, Verification, ZipSliceArchive, EXECUTABLE_MASK,
};

#[rstest]
#[case(CompressionLevel::None)]
#[case(CompressionLevel::Fastest)]
#[case(CompressionLevel::Optimal)]
fn test_app_bundle(#[case] level: CompressionLevel) {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());

    let report = build_archive(&config(level), &bundle, APP_EXECUTABLE).unwrap();
    assert_eq!(report.archive, dir.path().join("App.app.zip"));
    assert_eq!(report.entries(), 2);
    assert_eq!(
        report.patch,
        PatchReport {
            patched: 2,
            expected: 2,
            unpatched: 0,
        }
    );
    assert_eq!(
        report.verification,
        Verification::Passed {
            attributes: 0x81FF_0000
        }
    );
    assert!(report.is_clean());

    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    let records = archive.records().unwrap();
    let names: Vec<_> = records.iter().map(|r| r.file_path().unwrap()).collect();
    assert_eq!(
        names,
        vec!["App.app/Contents/Info.plist", "App.app/Contents/MacOS/App"]
    );

    for record in &records {
        assert_eq!(record.host_system(), HostSystem::Unix);
        assert_eq!(record.compression_method(), level.method());
    }
    assert_eq!(records[0].external_attributes(), 0x81A4_0000);
    assert_eq!(records[1].external_attributes(), 0x81FF_0000);

    assert_eq!(
        read_entry(&data, APP_EXECUTABLE),
        fs::read(bundle.join("Contents/MacOS/App")).unwrap()
    );
}

#[test]
fn test_empty_source_directory() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Empty");
    fs::create_dir(&source).unwrap();

    let report = build_archive(
        &config(CompressionLevel::Optimal),
        &source,
        "Empty/Contents/MacOS/Empty",
    )
    .unwrap();
    assert_eq!(report.entries(), 0);
    assert!(report.patch.is_complete());
    assert_eq!(report.verification, Verification::Missing);
    assert!(!report.is_clean());

    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    assert_eq!(archive.entries_hint(), 0);
}

#[test]
fn test_misspelled_source_directory() {
    let dir = tempfile::tempdir().unwrap();
    app_bundle(dir.path());
    let misspelled = dir.path().join("Ap.app");

    let err = build_archive(
        &config(CompressionLevel::Optimal),
        &misspelled,
        APP_EXECUTABLE,
    )
    .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::MissingSourceDirectory { .. }
    ));
    assert!(!dir.path().join("Ap.app.zip").exists());
}

#[test]
fn test_stale_archive_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let target = dir.path().join("App.app.zip");
    fs::write(&target, vec![0xAB; 64 * 1024]).unwrap();

    let report = build_archive(&config(CompressionLevel::None), &bundle, APP_EXECUTABLE).unwrap();
    assert!(report.is_clean());
    assert!(fs::metadata(&target).unwrap().len() < 64 * 1024);
}

#[test]
fn test_rebuilding_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());

    let first = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    let first = fs::read(first.archive).unwrap();
    let second = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    let second = fs::read(second.archive).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_target_override() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let target = dir.path().join("release.zip");

    let config = ArchiveConfig {
        compression: CompressionLevel::Fastest,
        target: Some(target.clone()),
    };
    let report = build_archive(&config, &bundle, APP_EXECUTABLE).unwrap();
    assert_eq!(report.archive, target);
    assert!(target.exists());
    assert!(!dir.path().join("App.app.zip").exists());
}

#[test]
fn test_empty_subdirectories_get_entries() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    fs::create_dir_all(bundle.join("Contents/Resources/Empty")).unwrap();

    let report = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    assert_eq!(report.pack.files, 2);
    assert_eq!(report.pack.directories, 1);
    assert_eq!(report.patch.patched, 3);

    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    let record = archive
        .find("App.app/Contents/Resources/Empty/")
        .unwrap()
        .unwrap();
    assert!(record.is_dir());
    assert_eq!(record.compression_method(), CompressionMethod::Store);
    assert_eq!(record.external_attributes(), 0x41ED_0010);
    assert_ne!(record.external_attributes() & EXECUTABLE_MASK, EXECUTABLE_MASK);
}

#[test]
fn test_nested_executable_outside_bundle_layout() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Game");
    fs::create_dir_all(source.join("bin")).unwrap();
    fs::write(source.join("bin/game.x86_64"), b"\x7fELF").unwrap();
    fs::write(source.join("bin/game.pck"), b"pack").unwrap();

    let report = build_archive(
        &config(CompressionLevel::Optimal),
        &source,
        "Game/bin/game.x86_64",
    )
    .unwrap();
    assert!(report.is_clean());
    assert!(report.annotate.executable_found);
}
