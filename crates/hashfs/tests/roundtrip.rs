//! End-to-end tests exercising `WriterV1`/`WriterV2` against `Reader`
//! through the public facade only — no internal module access.

use std::io::Cursor;

use hashfs::{hash_path, DxgiFormat, Error, Reader, TextureFilter, TextureSampling, WriterV1, WriterV2};

fn reopen(bytes: Vec<u8>) -> Reader<Cursor<Vec<u8>>> {
    Reader::open(Cursor::new(bytes), false).unwrap()
}

/// Spec §8 scenario 1: a salt-0 hash of a path is independent of a
/// leading `/`, and pins the exact decimal value named in the spec.
#[test]
fn hash_path_matches_spec_scenario_1() {
    assert_eq!(hash_path("/käsefondue.txt", 0), 8645157520230346068);
    assert_eq!(hash_path("käsefondue.txt", 0), 8645157520230346068);
}

/// Spec §8 scenario 2, the hash-consistency slice of it: the named
/// entry and root-directory hashes for `salt=42`.
#[test]
fn v1_salted_hashes_match_spec_scenario_2() {
    assert_eq!(hash_path("/", 42), 0x0DAC_6B40_4449_05D0);
    assert_eq!(hash_path("/def/world/model.tests.sii", 42), 0x3C63_69BC_6EFD_D668);
}

#[test]
fn v1_round_trip_of_added_tree() {
    let mut writer = WriterV1::new();
    writer.salt = 42;

    writer.add_bytes("/readme.txt", b"hello".to_vec()).unwrap();
    writer.add_bytes("/def/world/model.tests.sii", vec![b'm'; 500]).unwrap();
    writer.add_bytes("/def/world/sub/leaf.txt", b"leaf".to_vec()).unwrap();

    let mut buf = Vec::new();
    writer.save(&mut Cursor::new(&mut buf)).unwrap();

    let mut reader = reopen(buf);

    assert!(reader.directory_exists("/"));
    assert!(reader.directory_exists("/def"));
    assert!(reader.directory_exists("/def/world"));
    assert!(reader.directory_exists("/def/world/sub"));

    let root_entry = reader.get_entry("/").unwrap();
    assert_eq!(root_entry.hash(), hash_path("/", 42));

    let big_entry = reader.get_entry("/def/world/model.tests.sii").unwrap();
    assert_eq!(big_entry.hash(), hash_path("/def/world/model.tests.sii", 42));
    assert!(big_entry.is_compressed());

    let extracted = reader.extract("/def/world/model.tests.sii").unwrap();
    assert_eq!(extracted, vec![vec![b'm'; 500]]);

    let listing = reader.get_directory_listing("/def", true, true).unwrap();
    assert_eq!(listing, vec!["/def/world"]);
}

#[test]
fn v2_round_trip_preserves_file_bytes_and_directory_closure() {
    let mut writer = WriterV2::new();
    writer.salt = 7;

    writer.add_bytes("/a/b/c.bin", vec![9u8; 300]).unwrap();
    writer.add_bytes("/a/other.txt", b"tiny".to_vec()).unwrap();

    let mut buf = Vec::new();
    writer.save(&mut Cursor::new(&mut buf)).unwrap();

    let mut reader = reopen(buf);

    for dir in ["/", "/a", "/a/b"] {
        assert!(reader.directory_exists(dir), "missing directory {dir}");
    }

    let entry = reader.get_entry("/a/b/c.bin").unwrap();
    assert_eq!(entry.offset() % 16, 0);

    let extracted = reader.extract("/a/b/c.bin").unwrap();
    assert_eq!(extracted, vec![vec![9u8; 300]]);

    let tiny = reader.extract("/a/other.txt").unwrap();
    assert_eq!(tiny, vec![b"tiny".to_vec()]);
}

fn sample_surface(format: DxgiFormat, width: u32, height: u32, mips: u32, faces: u32, pattern: u8) -> Vec<u8> {
    let info = hashfs::SurfaceInfo::for_format(format);
    let mut out = Vec::new();
    for face in 0..faces {
        for level in 0..mips {
            let w = (width >> level).max(1);
            let h = (height >> level).max(1);
            let size = info.slice_pitch(w, h);
            out.extend(std::iter::repeat(pattern.wrapping_add(face as u8).wrapping_add(level as u8)).take(size as usize));
        }
    }
    out
}

fn write_surface_file(dir: &std::path::Path, name: &str, format: DxgiFormat, width: u32, height: u32, mips: u32, is_cube: bool) -> std::path::PathBuf {
    let faces = if is_cube { 6 } else { 1 };
    let pixels = sample_surface(format, width, height, mips, faces, 0x20);

    let mut bytes = Vec::new();
    hashfs::write_dds_header(&mut bytes, format, width, height, mips, is_cube).unwrap();
    bytes.extend_from_slice(&pixels);

    let path = dir.join(name);
    std::fs::write(&path, &bytes).unwrap();
    path
}

fn default_sampling() -> TextureSampling {
    TextureSampling {
        mag_filter: TextureFilter::Linear,
        min_filter: TextureFilter::Linear,
        mip_filter: hashfs::MipFilter::Trilinear,
        addr_u: hashfs::AddressMode::Repeat,
        addr_v: hashfs::AddressMode::Repeat,
        addr_w: hashfs::AddressMode::Clamp,
    }
}

/// Spec §8 scenario 3/4-equivalent: a v2 archive with a single registered
/// texture extracts back to a descriptor plus a valid surface file, with
/// the repacked-then-unpacked surface bytes equal to the original.
#[test]
fn v2_texture_round_trip_2d() {
    let dir = tempfile::tempdir().unwrap();
    let surface_path = write_surface_file(&dir.path(), "tex.dds", DxgiFormat::Bc1UnormSrgb, 256, 256, 9, false);

    let mut writer = WriterV2::new();
    writer.add_texture("/model/simple_cube/cubetx.tobj", default_sampling(), &surface_path).unwrap();

    let mut buf = Vec::new();
    writer.save(&mut Cursor::new(&mut buf)).unwrap();

    let mut reader = reopen(buf);

    let entry = reader.get_entry("/model/simple_cube/cubetx.tobj").unwrap();
    let texture = entry.texture().cloned().unwrap();
    assert_eq!(texture.width, 256);
    assert_eq!(texture.height, 256);
    assert_eq!(texture.format, DxgiFormat::Bc1UnormSrgb);
    assert_eq!(texture.mipmap_count, 9);
    assert!(!texture.is_cube);

    let parts = reader.extract("/model/simple_cube/cubetx.tobj").unwrap();
    assert_eq!(parts.len(), 2);

    // The sibling .dds is never a separate entry (spec §3 invariant).
    assert!(!reader.file_exists("/model/simple_cube/cubetx.dds"));
}

/// Spec §8 scenario 4: a cubemap packs as a single entry with six faces,
/// and extraction yields a valid surface file.
#[test]
fn v2_cubemap_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let surface_path = write_surface_file(&dir.path(), "cube.dds", DxgiFormat::Bc1UnormSrgb, 64, 64, 7, true);

    let mut writer = WriterV2::new();
    writer.add_texture("/model/simple_cube/cube.tobj", default_sampling(), &surface_path).unwrap();

    let mut buf = Vec::new();
    writer.save(&mut Cursor::new(&mut buf)).unwrap();

    let mut reader = reopen(buf);
    let entry = reader.get_entry("/model/simple_cube/cube.tobj").unwrap();
    let texture = entry.texture().cloned().unwrap();

    assert!(texture.is_cube);
    assert_eq!(texture.face_count, 6);
    assert_eq!(texture.mipmap_count, 7);

    let parts = reader.extract("/model/simple_cube/cube.tobj").unwrap();
    let surface_bytes = &parts[1];
    let info = hashfs::parse_dds_header("cube.dds", surface_bytes).unwrap();
    assert!(info.is_cube);
    assert_eq!(info.width, 64);
    assert_eq!(info.height, 64);
}

/// Spec §8 scenario 5: write-time texture failures.
#[test]
fn v2_texture_write_failures() {
    let dir = tempfile::tempdir().unwrap();

    let mut writer = WriterV2::new();
    let missing = dir.path().join("missing.dds");
    writer.add_texture("/t.tobj", default_sampling(), &missing).unwrap();
    let mut buf = Vec::new();
    assert!(matches!(writer.save(&mut Cursor::new(&mut buf)), Err(Error::TexturePacking { .. })));

    let legacy_path = dir.path().join("legacy.dds");
    let mut legacy_bytes = vec![0u8; hashfs::DX10_PIXEL_DATA_OFFSET as usize];
    legacy_bytes[0..4].copy_from_slice(&0x2053_4444u32.to_le_bytes());
    legacy_bytes[4..8].copy_from_slice(&124u32.to_le_bytes());
    std::fs::write(&legacy_path, &legacy_bytes).unwrap();

    let mut writer = WriterV2::new();
    writer.add_texture("/t2.tobj", default_sampling(), &legacy_path).unwrap();
    let mut buf = Vec::new();
    assert!(matches!(writer.save(&mut Cursor::new(&mut buf)), Err(Error::TexturePacking { .. })));
}

/// Spec §8 scenario 6: invalid archive paths are rejected at `add` time.
#[test]
fn rejects_invalid_archive_paths() {
    let mut writer = WriterV1::new();
    assert!(matches!(writer.add_bytes("", vec![]), Err(Error::InvalidArchivePath { .. })));
    assert!(matches!(writer.add_bytes("/", vec![]), Err(Error::InvalidArchivePath { .. })));

    let long_component = "a".repeat(256);
    assert!(matches!(
        writer.add_bytes(&format!("/{long_component}"), vec![]),
        Err(Error::InvalidArchivePath { .. })
    ));

    let ok_component = "a".repeat(255);
    assert!(writer.add_bytes(&format!("/{ok_component}"), vec![]).is_ok());
}

/// Spec §8 scenario 6: open-time rejections.
#[test]
fn rejects_non_hashfs_stream() {
    let garbage = vec![0u8; 64];
    assert!(matches!(Reader::open(Cursor::new(garbage), false), Err(Error::NotHashFs)));
}

#[test]
fn rejects_unsupported_hash_method_and_version() {
    // magic ("SCS#") + version 1 + salt 0 + hash method "ZZZZ".
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&hashfs::MAGIC.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(b"ZZZZ");
    assert!(matches!(Reader::open(Cursor::new(bytes), false), Err(Error::UnsupportedHashMethod(_))));

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&hashfs::MAGIC.to_le_bytes());
    bytes.extend_from_slice(&99u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(hashfs::HASH_METHOD_CITY);
    assert!(matches!(Reader::open(Cursor::new(bytes), false), Err(Error::UnsupportedVersion(_))));
}
