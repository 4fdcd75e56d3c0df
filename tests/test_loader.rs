//! End-to-end loader test: build a synthetic V800 archive on disk, load it,
//! and check the scripts section round-trips through the compiler.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gm8run::loader::{self, GameVersion};

const V800_PROBE_OFFSET: usize = 2_000_000;
const V800_MAGIC: u32 = 1_234_321;

fn zlib(payload: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(payload).unwrap();
    enc.finish().unwrap()
}

fn push_section(buf: &mut Vec<u8>, payload: &[u8]) {
    let compressed = zlib(payload);
    buf.extend_from_slice(&0x320u32.to_le_bytes());
    buf.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    buf.extend_from_slice(&compressed);
}

fn scripts_payload(scripts: &[(&str, bool, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(scripts.len() as u32).to_le_bytes());
    for (name, exists, source) in scripts {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(if *exists { 1 } else { 0 });
        out.extend_from_slice(&(source.len() as u32).to_le_bytes());
        out.extend_from_slice(source.as_bytes());
    }
    out
}

/// `triggers, constants, sounds, sprites, backgrounds, paths, scripts,
/// fonts, timelines, objects, rooms`, matching `assets::SECTION_ORDER`.
fn build_archive(scripts: &[(&str, bool, &str)]) -> Vec<u8> {
    let mut buf = vec![0u8; V800_PROBE_OFFSET + 16];
    buf[0..2].copy_from_slice(b"MZ");
    buf[V800_PROBE_OFFSET..V800_PROBE_OFFSET + 4].copy_from_slice(&V800_MAGIC.to_le_bytes());

    push_section(&mut buf, b""); // settings
    push_section(&mut buf, b""); // triggers
    push_section(&mut buf, b""); // constants
    push_section(&mut buf, b""); // sounds
    push_section(&mut buf, b""); // sprites
    push_section(&mut buf, b""); // backgrounds
    push_section(&mut buf, b""); // paths
    push_section(&mut buf, &scripts_payload(scripts)); // scripts
    push_section(&mut buf, b""); // fonts
    push_section(&mut buf, b""); // timelines
    push_section(&mut buf, b""); // objects
    push_section(&mut buf, b""); // rooms
    push_section(&mut buf, b""); // trailing

    buf
}

#[test]
fn loads_a_synthetic_v800_archive_and_compiles_its_scripts() {
    let dir = tempdir::TempDir::new("gm8run-loader-test").unwrap();
    let path = dir.path().join("game.exe");

    let buf = build_archive(&[("scr_main", true, "x = 1 + 2 * 3;")]);
    std::fs::write(&path, &buf).unwrap();

    let archive = loader::load(&path).unwrap();
    assert_eq!(archive.version, GameVersion::V800);
    assert_eq!(archive.scripts.len(), 1);
    assert_eq!(archive.scripts[0].name, "scr_main");
    assert!(archive.scripts[0].exists);
    assert!(archive.scripts[0].program.is_some());
}

#[test]
fn a_deleted_script_slot_compiles_to_no_program() {
    let dir = tempdir::TempDir::new("gm8run-loader-test").unwrap();
    let path = dir.path().join("game.exe");

    let buf = build_archive(&[("scr_gone", false, "y = 1;")]);
    std::fs::write(&path, &buf).unwrap();

    let archive = loader::load(&path).unwrap();
    assert_eq!(archive.scripts.len(), 1);
    assert!(!archive.scripts[0].exists);
    assert!(archive.scripts[0].program.is_none());
}

#[test]
fn a_file_with_no_version_signature_is_rejected() {
    let dir = tempdir::TempDir::new("gm8run-loader-test").unwrap();
    let path = dir.path().join("game.exe");

    let mut buf = vec![0u8; 4096];
    buf[0..2].copy_from_slice(b"MZ");
    std::fs::write(&path, &buf).unwrap();

    assert!(loader::load(&path).is_err());
}
