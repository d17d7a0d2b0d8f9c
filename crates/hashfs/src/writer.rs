//! The write-side facade (spec §4.10). Two concrete writers, `WriterV1`
//! and `WriterV2` — the on-disk revision is fixed by type, not by a
//! runtime option (spec §4.10) — sharing the accumulation and path
//! validation logic, since both follow the same Accumulating → `save` →
//! Finalized lifecycle (spec §4.11). `save` consumes `self` by value, so
//! the Rust type system enforces "no further mutation after save"
//! without a runtime state flag.

use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::compression::{zlib_compress, CompressionLevel};
use crate::directory::DirectoryTree;
use crate::entry::EntryFlagsV1;
use crate::entry_table::v1::{write as write_entry_table_v1, STRIDE as V1_STRIDE};
use crate::entry_table::v2::{write_compressed as write_entry_table_v2, EntryRowV2, FLAG_DIRECTORY};
use crate::hash::hash_path;
use crate::header::{HeaderV1, HeaderV2, Platform, PAYLOAD_REGION_START};
use crate::metadata::{MainMetadata, MetadataTableBuilder};
use crate::reader::synthesize_listings;
use crate::surface::{convert_to_archive, parse_dds_header};
use crate::texture::TextureMetadata;
use crate::{Error, Result};

/// Default `compressionThreshold` (spec §4.10): files at or below this
/// size are stored uncompressed regardless of `compressionLevel`.
pub const DEFAULT_COMPRESSION_THRESHOLD: i32 = 64;

enum Source {
    Bytes(Vec<u8>),
    HostPath(PathBuf),
}

impl Source {
    fn load(&self) -> Result<Vec<u8>> {
        match self {
            Source::Bytes(b) => Ok(b.clone()),
            Source::HostPath(p) => Ok(fs::read(p)?),
        }
    }

    /// A human-readable stand-in for error messages; in-memory sources have
    /// no host path, so they report as `<in-memory>`.
    fn display_path(&self) -> String {
        match self {
            Source::Bytes(_) => "<in-memory>".to_string(),
            Source::HostPath(p) => p.display().to_string(),
        }
    }
}

struct PendingFile {
    archive_path: String,
    source: Source,
}

struct PendingTexture {
    archive_path: String,
    descriptor: TextureMetadata,
    surface: Source,
}

/// Validates an archive path per spec §4.10: non-empty, not `/`, and
/// every `/`-separated component at most 255 bytes.
fn validate_archive_path(path: &str) -> Result<()> {
    let fail = |reason| Error::InvalidArchivePath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(fail("path is empty"));
    }
    if path == "/" {
        return Err(fail("path is the root"));
    }
    if !path.starts_with('/') {
        return Err(fail("path must be absolute"));
    }

    for component in path.trim_start_matches('/').split('/') {
        if component.len() > 255 {
            return Err(fail("path component exceeds 255 bytes"));
        }
    }

    Ok(())
}

/// Compresses `bytes` if it clears `threshold` and `level` allows it,
/// returning `(stored_bytes, is_compressed)` (spec §4.10, §8 boundary
/// test: files at or below the threshold are always stored uncompressed).
fn maybe_compress(bytes: &[u8], threshold: i32, level: CompressionLevel) -> Result<(Vec<u8>, bool)> {
    if level == CompressionLevel::None || bytes.len() as i64 <= threshold as i64 {
        return Ok((bytes.to_vec(), false));
    }

    let compressed = zlib_compress(bytes, level)?;
    Ok((compressed, true))
}

/// v1 writer. No texture packing path — that is v2-only (spec §4.8).
pub struct WriterV1 {
    pub salt: u16,
    pub compression_threshold: i32,
    pub compression_level: CompressionLevel,
    pub compute_checksums: bool,
    files: Vec<PendingFile>,
    tree: DirectoryTree,
}

impl Default for WriterV1 {
    fn default() -> Self {
        Self {
            salt: 0,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: CompressionLevel::default(),
            compute_checksums: true,
            files: Vec::new(),
            tree: DirectoryTree::new(),
        }
    }
}

impl WriterV1 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&mut self, archive_path: &str, bytes: Vec<u8>) -> Result<()> {
        validate_archive_path(archive_path)?;
        self.tree.insert_file(archive_path);
        self.files.push(PendingFile {
            archive_path: archive_path.to_string(),
            source: Source::Bytes(bytes),
        });
        Ok(())
    }

    /// Registers a host file; it is not opened until `save` (spec §3
    /// "Ownership").
    pub fn add_host_path(&mut self, archive_path: &str, host_path: impl AsRef<Path>) -> Result<()> {
        validate_archive_path(archive_path)?;
        self.tree.insert_file(archive_path);
        self.files.push(PendingFile {
            archive_path: archive_path.to_string(),
            source: Source::HostPath(host_path.as_ref().to_path_buf()),
        });
        Ok(())
    }

    #[instrument(skip(self, writer))]
    pub fn save<W: Write + Seek>(self, writer: &mut W) -> Result<()> {
        writer.write_all(&vec![0u8; PAYLOAD_REGION_START as usize])?;

        let listings = synthesize_listings(&self.tree, crate::header::Version::V1, self.salt)?;

        let mut rows = Vec::with_capacity(self.files.len() + listings.len());

        for file in &self.files {
            let bytes = file.source.load()?;
            let (stored, is_compressed) = maybe_compress(&bytes, self.compression_threshold, self.compression_level)?;

            let offset = writer.stream_position()?;
            writer.write_all(&stored)?;

            let crc32 = if self.compute_checksums { crc32fast::hash(&bytes) } else { 0 };
            let flags = EntryFlagsV1::empty().with(EntryFlagsV1::COMPRESSED, is_compressed);
            let hash = hash_path(&file.archive_path, self.salt);

            rows.push(crate::entry::EntryV1 {
                hash,
                offset,
                flags,
                crc32,
                size: bytes.len() as u32,
                compressed_size: stored.len() as u32,
            });
        }

        for (_dir_path, bytes, hash) in &listings {
            let (stored, is_compressed) = maybe_compress(bytes, self.compression_threshold, self.compression_level)?;

            let offset = writer.stream_position()?;
            writer.write_all(&stored)?;

            let crc32 = if self.compute_checksums { crc32fast::hash(bytes) } else { 0 };
            let flags = EntryFlagsV1::empty()
                .with(EntryFlagsV1::DIRECTORY, true)
                .with(EntryFlagsV1::COMPRESSED, is_compressed);

            rows.push(crate::entry::EntryV1 {
                hash: *hash,
                offset,
                flags,
                crc32,
                size: bytes.len() as u32,
                compressed_size: stored.len() as u32,
            });
        }

        rows.sort_by_key(|r| r.hash);

        let start_offset = writer.stream_position()? as u32;
        let mut table_bytes = Vec::with_capacity(rows.len() * V1_STRIDE as usize);
        write_entry_table_v1(&mut table_bytes, &rows)?;
        writer.write_all(&table_bytes)?;

        let header = HeaderV1 {
            salt: self.salt,
            num_entries: rows.len() as u32,
            start_offset,
        };
        header.write(writer)?;

        Ok(())
    }
}

/// v2 writer. Adds the texture-packing path (spec §4.8) on top of plain
/// file and directory support.
pub struct WriterV2 {
    pub salt: u16,
    pub compression_threshold: i32,
    pub compression_level: CompressionLevel,
    files: Vec<PendingFile>,
    textures: Vec<PendingTexture>,
    tree: DirectoryTree,
}

/// Writer-side texture packing policy (spec §4.8): fixed pitch/image
/// alignment, face count auto-detected from the descriptor's cube flag.
pub const WRITER_PITCH_ALIGNMENT: u32 = 256;
pub const WRITER_IMAGE_ALIGNMENT: u32 = 512;

impl Default for WriterV2 {
    fn default() -> Self {
        Self {
            salt: 0,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: CompressionLevel::default(),
            files: Vec::new(),
            textures: Vec::new(),
            tree: DirectoryTree::new(),
        }
    }
}

impl WriterV2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&mut self, archive_path: &str, bytes: Vec<u8>) -> Result<()> {
        validate_archive_path(archive_path)?;
        self.tree.insert_file(archive_path);
        self.files.push(PendingFile {
            archive_path: archive_path.to_string(),
            source: Source::Bytes(bytes),
        });
        Ok(())
    }

    pub fn add_host_path(&mut self, archive_path: &str, host_path: impl AsRef<Path>) -> Result<()> {
        validate_archive_path(archive_path)?;
        self.tree.insert_file(archive_path);
        self.files.push(PendingFile {
            archive_path: archive_path.to_string(),
            source: Source::HostPath(host_path.as_ref().to_path_buf()),
        });
        Ok(())
    }

    /// Registers a texture pair: `archive_path` is the `.tobj` descriptor's
    /// in-archive path, `mag/min/mip` and address-mode fields come from
    /// the opaque descriptor collaborator (spec §6), and `surface` is the
    /// sibling `.dds` file's bytes. The sibling `.dds` path is never a
    /// separate archive entry (spec §3 invariant).
    pub fn add_texture(
        &mut self,
        archive_path: &str,
        sampling: TextureSampling,
        surface_host_path: impl AsRef<Path>,
    ) -> Result<()> {
        validate_archive_path(archive_path)?;
        self.tree.insert_file(archive_path);
        self.textures.push(PendingTexture {
            archive_path: archive_path.to_string(),
            descriptor: sampling.into_metadata_stub(),
            surface: Source::HostPath(surface_host_path.as_ref().to_path_buf()),
        });
        Ok(())
    }

    fn sibling_surface_path(archive_path: &str) -> String {
        match archive_path.rsplit_once('.') {
            Some((base, _ext)) => format!("{base}.dds"),
            None => format!("{archive_path}.dds"),
        }
    }

    #[instrument(skip(self, writer))]
    pub fn save<W: Write + Seek>(self, writer: &mut W) -> Result<()> {
        writer.write_all(&vec![0u8; PAYLOAD_REGION_START as usize])?;

        let texture_surface_paths: std::collections::HashSet<String> =
            self.textures.iter().map(|t| Self::sibling_surface_path(&t.archive_path)).collect();

        let listings = synthesize_listings(&self.tree, crate::header::Version::V2, self.salt)?;

        let mut rows = Vec::new();
        let mut metadata = MetadataTableBuilder::new();

        for file in self.files.iter().filter(|f| !texture_surface_paths.contains(&f.archive_path)) {
            let bytes = file.source.load()?;
            let (stored, is_compressed) = maybe_compress(&bytes, self.compression_threshold, self.compression_level)?;

            let offset = align_up_stream(writer)?;
            writer.write_all(&stored)?;

            let main = MainMetadata {
                compressed_size: stored.len() as u32,
                is_compressed,
                size: bytes.len() as u32,
                reserved_flags2: 0,
                unknown: 0,
                offset_block: MainMetadata::from_offset(offset),
            };
            let (metadata_index, metadata_count) = metadata.push_plain(main)?;

            rows.push(EntryRowV2 {
                hash: hash_path(&file.archive_path, self.salt),
                metadata_index,
                metadata_count,
                flags: 0,
            });
        }

        for (_dir_path, bytes, hash) in &listings {
            let (stored, is_compressed) = maybe_compress(bytes, self.compression_threshold, self.compression_level)?;

            let offset = align_up_stream(writer)?;
            writer.write_all(&stored)?;

            let main = MainMetadata {
                compressed_size: stored.len() as u32,
                is_compressed,
                size: bytes.len() as u32,
                reserved_flags2: 0,
                unknown: 0,
                offset_block: MainMetadata::from_offset(offset),
            };
            let (metadata_index, metadata_count) = metadata.push_directory(main)?;

            rows.push(EntryRowV2 {
                hash: *hash,
                metadata_index,
                metadata_count,
                flags: FLAG_DIRECTORY,
            });
        }

        for texture in &self.textures {
            let surface_path = texture.surface.display_path();
            if !surface_path.to_ascii_lowercase().ends_with(".dds") {
                return Err(Error::TexturePacking {
                    path: surface_path,
                    reason: "sibling surface file must have a .dds extension",
                });
            }

            let surface_bytes = texture.surface.load().map_err(|_| Error::TexturePacking {
                path: surface_path.clone(),
                reason: "missing surface file",
            })?;
            let dds = parse_dds_header(&surface_path, &surface_bytes)?;

            let face_count = if dds.is_cube { 6 } else { 1 };
            let pixels = &surface_bytes[crate::surface::DX10_PIXEL_DATA_OFFSET as usize..];

            let full_metadata = TextureMetadata {
                width: dds.width,
                height: dds.height,
                mipmap_count: dds.mipmap_count,
                format: dds.format,
                is_cube: dds.is_cube,
                face_count,
                pitch_alignment: WRITER_PITCH_ALIGNMENT,
                image_alignment: WRITER_IMAGE_ALIGNMENT,
                ..texture.descriptor.clone()
            };

            let archived = convert_to_archive(
                full_metadata.format,
                full_metadata.width,
                full_metadata.height,
                full_metadata.mipmap_count,
                full_metadata.face_count,
                full_metadata.pitch_alignment,
                full_metadata.image_alignment,
                pixels,
            )?;

            let offset = align_up_stream(writer)?;
            writer.write_all(&archived)?;

            let main = MainMetadata {
                compressed_size: archived.len() as u32,
                is_compressed: false,
                size: archived.len() as u32,
                reserved_flags2: 0,
                unknown: 0,
                offset_block: MainMetadata::from_offset(offset),
            };
            let (metadata_index, metadata_count) = metadata.push_image(&full_metadata, main)?;

            rows.push(EntryRowV2 {
                hash: hash_path(&texture.archive_path, self.salt),
                metadata_index,
                metadata_count,
                flags: 0,
            });
        }

        rows.sort_by_key(|r| r.hash);

        let entry_table_start = writer.stream_position()?;
        let entry_table_bytes = write_entry_table_v2(&rows, self.compression_level)?;
        writer.write_all(&entry_table_bytes)?;

        let metadata_table_start = writer.stream_position()?;
        let metadata_table_bytes = metadata.finish(self.compression_level)?;
        writer.write_all(&metadata_table_bytes)?;

        let header = HeaderV2 {
            salt: self.salt,
            entry_table_length: entry_table_bytes.len() as u32,
            num_metadata_entries: rows.len() as u32,
            metadata_table_length: metadata_table_bytes.len() as u32,
            entry_table_start,
            metadata_table_start,
            security_descriptor_offset: 0,
            platform: Platform::Pc,
        };
        header.write(writer)?;

        Ok(())
    }
}

/// Sampling parameters the opaque `.tobj` collaborator (spec §6) would
/// hand the writer; width/height/format/cube/face-count are read from
/// the surface file itself instead (spec §4.8 preconditions), so they
/// are not part of this caller-supplied struct.
#[derive(Debug, Clone, Copy)]
pub struct TextureSampling {
    pub mag_filter: crate::texture::TextureFilter,
    pub min_filter: crate::texture::TextureFilter,
    pub mip_filter: crate::texture::MipFilter,
    pub addr_u: crate::texture::AddressMode,
    pub addr_v: crate::texture::AddressMode,
    pub addr_w: crate::texture::AddressMode,
}

impl TextureSampling {
    fn into_metadata_stub(self) -> TextureMetadata {
        TextureMetadata {
            width: 0,
            height: 0,
            mipmap_count: 0,
            format: crate::texture::DxgiFormat::Bc1Unorm,
            is_cube: false,
            face_count: 0,
            pitch_alignment: WRITER_PITCH_ALIGNMENT,
            image_alignment: WRITER_IMAGE_ALIGNMENT,
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            mip_filter: self.mip_filter,
            addr_u: self.addr_u,
            addr_v: self.addr_v,
            addr_w: self.addr_w,
        }
    }
}

fn align_up_stream<W: Write + Seek>(writer: &mut W) -> Result<u64> {
    let pos = writer.stream_position()?;
    let aligned = (pos + 15) / 16 * 16;
    if aligned != pos {
        writer.write_all(&vec![0u8; (aligned - pos) as usize])?;
    }
    Ok(aligned)
}
