use crate::{app_bundle, config, APP_EXECUTABLE};
use rstest::rstest;
use std::fs;
use unixzip::{
    annotate_permissions, build_archive, mode_for, pack_directory, verify_executable,
    CompressionLevel, HostSystem, PosixMode, Verification, ZipSliceArchive, EXECUTABLE_MASK,
};

/// What an extraction tool would restore for each entry
fn extracted_modes(data: &[u8]) -> Vec<(String, Option<u32>)> {
    let archive = ZipSliceArchive::from_slice(data).unwrap();
    archive
        .records()
        .unwrap()
        .iter()
        .map(|record| {
            let mode = (record.host_system() == HostSystem::Unix)
                .then(|| record.mode().permissions());
            (record.file_path().unwrap().to_string(), mode)
        })
        .collect()
}

#[test]
fn test_extracted_modes() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    fs::create_dir(bundle.join("Contents/Frameworks")).unwrap();

    let report = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    let data = fs::read(&report.archive).unwrap();
    assert_eq!(
        extracted_modes(&data),
        vec![
            ("App.app/Contents/Frameworks/".to_string(), Some(0o755)),
            ("App.app/Contents/Info.plist".to_string(), Some(0o644)),
            (APP_EXECUTABLE.to_string(), Some(0o777)),
        ]
    );
}

#[test]
fn test_unpatched_archive_has_no_usable_modes() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    let target = dir.path().join("App.app.zip");

    pack_directory(&bundle, &target, CompressionLevel::Fastest).unwrap();
    annotate_permissions(&target, APP_EXECUTABLE).unwrap();

    // The attributes are right, but nothing will honor them yet
    let data = fs::read(&target).unwrap();
    assert!(extracted_modes(&data).iter().all(|(_, mode)| mode.is_none()));

    // Verification only looks at the bits
    let verification = verify_executable(&target, APP_EXECUTABLE).unwrap();
    assert!(verification.passed());
}

#[test]
fn test_exactly_one_entry_is_executable() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());
    fs::create_dir_all(bundle.join("Contents/Resources/Data")).unwrap();
    fs::write(bundle.join("Contents/Resources/Data/level0"), b"level").unwrap();
    fs::write(bundle.join("Contents/Resources/icon.icns"), b"icns").unwrap();
    fs::create_dir(bundle.join("Contents/Plugins")).unwrap();

    let report = build_archive(&config(CompressionLevel::Optimal), &bundle, APP_EXECUTABLE)
        .unwrap();
    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();
    let executables: Vec<_> = archive
        .records()
        .unwrap()
        .into_iter()
        .filter(|r| r.external_attributes() & EXECUTABLE_MASK == EXECUTABLE_MASK)
        .map(|r| r.file_path().unwrap().to_string())
        .collect();
    assert_eq!(executables, vec![APP_EXECUTABLE.to_string()]);
}

#[test]
fn test_wrong_executable_path_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = app_bundle(dir.path());

    // Missing the bundle name prefix
    let report = build_archive(
        &config(CompressionLevel::Optimal),
        &bundle,
        "Contents/MacOS/App",
    )
    .unwrap();
    assert!(!report.annotate.executable_found);
    assert_eq!(report.verification, Verification::Missing);
    assert!(report.patch.is_complete());

    let verification = verify_executable(&report.archive, APP_EXECUTABLE).unwrap();
    assert_eq!(
        verification,
        Verification::Failed {
            attributes: 0x81A4_0000,
            host: HostSystem::Unix
        }
    );
    assert_eq!(
        verification.to_string(),
        "unix perms test failed: 10000001101001000000000000000000 (host Unix)"
    );
}

#[test]
fn test_verify_rejects_non_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not.zip");
    fs::write(&path, b"plain text").unwrap();
    assert!(verify_executable(&path, APP_EXECUTABLE).is_err());
}

#[rstest]
#[case("App.app/Contents/MacOS/App", PosixMode::EXECUTABLE)]
#[case("App.app/Contents/MacOS/", PosixMode::DIRECTORY)]
#[case("App.app/Contents/MacOS/App.dSYM", PosixMode::DEFAULT)]
#[case("app.app/Contents/MacOS/App", PosixMode::DEFAULT)]
fn test_mode_for(#[case] path: &str, #[case] expected: PosixMode) {
    assert_eq!(mode_for(path.as_bytes(), APP_EXECUTABLE), expected);
}
