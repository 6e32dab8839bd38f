use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use unixzip::{build_archive, ArchiveConfig, CompressionLevel, CompressionMethod, ZipSliceArchive};

mod patch_tests;
mod permission_tests;
mod pipeline_tests;

pub(crate) const APP_EXECUTABLE: &str = "App.app/Contents/MacOS/App";

/// Lays out a minimal macOS bundle: `App.app/Contents/{Info.plist,MacOS/App}`
pub(crate) fn app_bundle(root: &Path) -> PathBuf {
    let bundle = root.join("App.app");
    fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
    fs::write(
        bundle.join("Contents/Info.plist"),
        b"<?xml version=\"1.0\"?><plist version=\"1.0\"><dict/></plist>",
    )
    .unwrap();
    fs::write(bundle.join("Contents/MacOS/App"), b"\xcf\xfa\xed\xfe binary").unwrap();
    bundle
}

pub(crate) fn config(compression: CompressionLevel) -> ArchiveConfig {
    ArchiveConfig {
        compression,
        target: None,
    }
}

/// Reads an entry's contents back out of an archive, checking size and crc
pub(crate) fn read_entry(data: &[u8], path: &str) -> Vec<u8> {
    let archive = ZipSliceArchive::from_slice(data).unwrap();
    let record = archive
        .find(path)
        .unwrap()
        .unwrap_or_else(|| panic!("no entry named {}", path));
    let entry = archive.get_entry(&record).unwrap();

    let mut contents = Vec::new();
    match record.compression_method() {
        CompressionMethod::Store => contents.extend_from_slice(entry.data()),
        CompressionMethod::Deflate => {
            flate2::read::DeflateDecoder::new(entry.data())
                .read_to_end(&mut contents)
                .unwrap();
        }
        other => panic!("unexpected compression method {:?}", other),
    }
    entry.verify(&contents).unwrap();
    contents
}

#[quickcheck]
fn test_contents_survive_the_pipeline(data: Vec<u8>, fast: bool) -> bool {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Game");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("Game"), &data).unwrap();

    let level = if fast {
        CompressionLevel::Fastest
    } else {
        CompressionLevel::Optimal
    };
    let report = build_archive(&config(level), &source, "Game/Game").unwrap();
    let archive = fs::read(&report.archive).unwrap();
    report.verification.passed() && read_entry(&archive, "Game/Game") == data
}

/// A directory tree to pack. Directories are named `d*`, files `f*` and
/// empty leaf directories `e*`, so no generated path is both a file and a
/// directory and every `e*` directory stays empty.
#[derive(Debug, Clone)]
struct SourceTree {
    files: BTreeMap<String, Vec<u8>>,
    empty_dirs: BTreeSet<String>,
    level: CompressionLevel,
}

fn arbitrary_dirs(g: &mut Gen) -> String {
    let depth = usize::arbitrary(g) % 3;
    (0..depth)
        .map(|_| format!("d{}/", u8::arbitrary(g) % 3))
        .collect()
}

impl Arbitrary for SourceTree {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut files = BTreeMap::new();
        for _ in 0..usize::arbitrary(g) % 8 {
            let path = format!("{}f{}", arbitrary_dirs(g), u8::arbitrary(g) % 4);
            files.insert(path, Vec::<u8>::arbitrary(g));
        }

        let mut empty_dirs = BTreeSet::new();
        for _ in 0..usize::arbitrary(g) % 3 {
            empty_dirs.insert(format!("{}e{}", arbitrary_dirs(g), u8::arbitrary(g) % 2));
        }

        let level = *g
            .choose(&[
                CompressionLevel::None,
                CompressionLevel::Fastest,
                CompressionLevel::Optimal,
            ])
            .unwrap();

        SourceTree {
            files,
            empty_dirs,
            level,
        }
    }
}

impl SourceTree {
    fn write_to(&self, root: &Path) {
        fs::create_dir(root).unwrap();
        for (path, contents) in &self.files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        for dir in &self.empty_dirs {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
    }
}

#[quickcheck]
fn test_tree_survives_the_pipeline(tree: SourceTree) -> bool {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Tree");
    tree.write_to(&source);

    let report = build_archive(&config(tree.level), &source, "Tree/missing").unwrap();
    let data = fs::read(&report.archive).unwrap();
    let archive = ZipSliceArchive::from_slice(&data).unwrap();

    let mut files = BTreeMap::new();
    let mut dirs = BTreeSet::new();
    for record in archive.records().unwrap() {
        let path = record.file_path().unwrap();
        let relative = path.strip_prefix("Tree/").unwrap();
        if record.is_dir() {
            dirs.insert(relative.trim_end_matches('/').to_string());
        } else {
            files.insert(relative.to_string(), read_entry(&data, path));
        }
    }

    report.patch.is_complete() && files == tree.files && dirs == tree.empty_dirs
}
