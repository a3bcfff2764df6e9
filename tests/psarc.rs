//! Archive round trips through the filesystem, and platform conversion.

use std::fs;

use pretty_assertions::assert_eq;

use rsdlc::psarc;

fn write_package(dir: &std::path::Path) {
    fs::create_dir_all(dir.join("songs/bin/macos")).unwrap();
    fs::create_dir_all(dir.join("audio/mac")).unwrap();
    fs::create_dir_all(dir.join("manifests")).unwrap();

    fs::write(dir.join("appid.appid"), "248750").unwrap();
    fs::write(dir.join("songs/bin/macos/song_lead.sng"), vec![7u8; 5000]).unwrap();
    fs::write(dir.join("audio/mac/12345.wem"), vec![42u8; 100_000]).unwrap();
    fs::write(
        dir.join("manifests/song_lead.json"),
        b"{\"Entries\":{}}".to_vec(),
    )
    .unwrap();
    fs::write(
        dir.join("test_aggregategraph.nt"),
        b"<urn:uuid:x> <tag> \"macos\".\n<urn:uuid:x> <logpath> \"audio/mac/1.wem\".\n".to_vec(),
    )
    .unwrap();
}

#[test]
fn pack_then_unpack_reproduces_the_files() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("testsong_m");
    write_package(&dir);

    let archive_path = psarc::pack(&dir).unwrap();
    assert!(archive_path.exists());

    let extracted_root = tmp.path().join("extracted");
    fs::create_dir_all(&extracted_root).unwrap();
    let moved = extracted_root.join("testsong_m.psarc");
    fs::copy(&archive_path, &moved).unwrap();
    let out_dir = psarc::unpack(&moved).unwrap();

    for entry in [
        "appid.appid",
        "songs/bin/macos/song_lead.sng",
        "audio/mac/12345.wem",
        "manifests/song_lead.json",
        "test_aggregategraph.nt",
    ] {
        let original = fs::read(dir.join(entry)).unwrap();
        let roundtripped = fs::read(out_dir.join(entry)).unwrap();
        assert_eq!(roundtripped, original, "mismatch for {entry}");
    }
}

#[test]
fn platform_conversion_is_an_involution() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("flipsong_m");
    write_package(&dir);

    let mac = psarc::pack(&dir).unwrap();
    let pc = psarc::convert_platform(&mac).unwrap();
    assert!(pc.to_string_lossy().ends_with("flipsong_p.psarc"));

    // The PC package must use the PC path conventions throughout.
    let mut reader = std::io::BufReader::new(fs::File::open(&pc).unwrap());
    let converted = psarc::Archive::read(&mut reader).unwrap();
    assert!(converted.files.contains_key("songs/bin/generic/song_lead.sng"));
    assert!(converted.files.contains_key("audio/windows/12345.wem"));
    let graph = String::from_utf8(converted.files["test_aggregategraph.nt"].clone()).unwrap();
    assert!(graph.contains("dx9"));
    assert!(!graph.contains("macos"));

    // Converting back restores the original content byte for byte.
    let mac_again = psarc::convert_platform(&pc).unwrap();
    let mut reader = std::io::BufReader::new(fs::File::open(&mac_again).unwrap());
    let restored = psarc::Archive::read(&mut reader).unwrap();
    let mut reader = std::io::BufReader::new(fs::File::open(&mac).unwrap());
    let original = psarc::Archive::read(&mut reader).unwrap();
    assert_eq!(restored, original);
}
