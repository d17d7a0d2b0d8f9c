//! The read-side facade (spec §4.9): open an archive, index its entries
//! by hash, and expose path-keyed lookup, listing, and extraction.
//!
//! Mirrors the teacher's `zip::Archive`/`rar::Archive` shape — a struct
//! wrapping the source stream plus whatever tables were parsed at
//! `open` time — generalized to support both on-disk revisions and
//! rebuilt over `std::io::{Read, Seek}` instead of `tokio` (spec §5 is
//! single-threaded synchronous I/O).

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::instrument;

use crate::compression::zlib_decompress;
use crate::directory::{decode_listing_v1, decode_listing_v2, DirectoryTree};
use crate::entry::{Entry, EntryV1, EntryV2};
use crate::entry_table::{v1 as entry_table_v1, v2 as entry_table_v2};
use crate::hash::hash_path;
use crate::header::{HeaderV1, HeaderV2, Prelude, Version};
use crate::metadata::{MetadataRecord, MetadataTable};
use crate::surface::{convert_from_archive, write_dds_header};
use crate::texture::TextureMetadata;
use crate::{Error, Result};

/// Result of [`Reader::entry_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    None,
    File,
    Directory,
}

/// A decoded entry, indexed by hash. Spec §9's "tagged union + shared
/// accessor trait" shape, one variant per on-disk revision.
#[derive(Debug, Clone)]
pub enum IndexedEntry {
    V1(EntryV1),
    V2(EntryV2),
}

impl Entry for IndexedEntry {
    fn hash(&self) -> u64 {
        match self {
            IndexedEntry::V1(e) => e.hash(),
            IndexedEntry::V2(e) => e.hash(),
        }
    }

    fn offset(&self) -> u64 {
        match self {
            IndexedEntry::V1(e) => e.offset(),
            IndexedEntry::V2(e) => e.offset(),
        }
    }

    fn size(&self) -> u32 {
        match self {
            IndexedEntry::V1(e) => e.size(),
            IndexedEntry::V2(e) => e.size(),
        }
    }

    fn compressed_size(&self) -> u32 {
        match self {
            IndexedEntry::V1(e) => e.compressed_size(),
            IndexedEntry::V2(e) => e.compressed_size(),
        }
    }

    fn is_directory(&self) -> bool {
        match self {
            IndexedEntry::V1(e) => e.is_directory(),
            IndexedEntry::V2(e) => e.is_directory(),
        }
    }

    fn is_compressed(&self) -> bool {
        match self {
            IndexedEntry::V1(e) => e.is_compressed(),
            IndexedEntry::V2(e) => e.is_compressed(),
        }
    }
}

impl IndexedEntry {
    pub fn texture(&self) -> Option<&TextureMetadata> {
        match self {
            IndexedEntry::V1(_) => None,
            IndexedEntry::V2(e) => e.texture.as_ref(),
        }
    }
}

pub struct Reader<S> {
    stream: Option<S>,
    version: Version,
    salt: u16,
    entries: HashMap<u64, IndexedEntry>,
}

impl Reader<File> {
    /// Opens a HashFS archive from a host path.
    pub fn open_path<P: AsRef<Path>>(path: P, force_entry_table_at_end: bool) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(file, force_entry_table_at_end)
    }
}

impl<S: Read + Seek> Reader<S> {
    #[instrument(skip(stream))]
    pub fn open(mut stream: S, force_entry_table_at_end: bool) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let prelude = Prelude::read(&mut stream)?;

        let (version, salt, entries) = match prelude.version {
            Version::V1 => {
                let header = HeaderV1::read(&mut stream, prelude)?;
                let rows = entry_table_v1::read(
                    &mut stream,
                    header.num_entries,
                    header.start_offset,
                    force_entry_table_at_end,
                )?;

                let mut entries = HashMap::with_capacity(rows.len());
                for row in rows {
                    entries.insert(row.hash, IndexedEntry::V1(row));
                }

                (Version::V1, header.salt, entries)
            }
            Version::V2 => {
                let header = HeaderV2::read(&mut stream, prelude)?;

                stream.seek(SeekFrom::Start(header.entry_table_start))?;
                let rows = entry_table_v2::read_sorted_by_metadata_index(
                    &mut stream,
                    header.entry_table_length,
                    header.num_metadata_entries,
                )?;

                stream.seek(SeekFrom::Start(header.metadata_table_start))?;
                let table = MetadataTable::from_compressed(&mut stream, header.metadata_table_length)?;

                let mut entries = HashMap::with_capacity(rows.len());
                for row in rows {
                    let record = table.read_record(row.metadata_index, row.metadata_count)?;
                    let main = *record.main();

                    let texture = match &record {
                        MetadataRecord::Image(texture, _) => Some(texture.clone()),
                        _ => None,
                    };

                    entries.insert(
                        row.hash,
                        IndexedEntry::V2(EntryV2 {
                            hash: row.hash,
                            offset: main.offset(),
                            size: main.size,
                            compressed_size: main.compressed_size,
                            is_directory: row.is_directory(),
                            is_compressed: main.is_compressed,
                            texture,
                        }),
                    );
                }

                (Version::V2, header.salt, entries)
            }
        };

        Ok(Self {
            stream: Some(stream),
            version,
            salt,
            entries,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn salt(&self) -> u16 {
        self.salt
    }

    /// Changing the salt does not recompute or re-key anything already
    /// indexed (spec §4.9) — only future `hash_path` calls are affected.
    pub fn set_salt(&mut self, salt: u16) {
        self.salt = salt;
    }

    pub fn hash_path(&self, path: &str, salt_override: Option<u16>) -> u64 {
        hash_path(path, salt_override.unwrap_or(self.salt))
    }

    pub fn entries(&self) -> &HashMap<u64, IndexedEntry> {
        &self.entries
    }

    pub fn entry_exists(&self, path: &str) -> EntryKind {
        match self.entries.get(&self.hash_path(path, None)) {
            None => EntryKind::None,
            Some(e) if e.is_directory() => EntryKind::Directory,
            Some(_) => EntryKind::File,
        }
    }

    pub fn try_get_entry(&self, path: &str) -> Option<&IndexedEntry> {
        self.entries.get(&self.hash_path(path, None))
    }

    pub fn get_entry(&self, path: &str) -> Result<&IndexedEntry> {
        self.try_get_entry(path).ok_or_else(|| Error::NotFound(path.to_string()))
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.entry_exists(path) == EntryKind::File
    }

    pub fn directory_exists(&self, path: &str) -> bool {
        self.entry_exists(path) == EntryKind::Directory
    }

    fn stream_mut(&mut self) -> Result<&mut S> {
        self.stream.as_mut().ok_or(Error::Closed)
    }

    fn read_raw_payload(&mut self, entry: &IndexedEntry) -> Result<Vec<u8>> {
        let offset = entry.offset();
        let read_len = if entry.is_compressed() {
            entry.compressed_size()
        } else {
            entry.size()
        };

        let mut buf = vec![0u8; read_len as usize];
        if read_len > 0 {
            let stream = self.stream_mut()?;
            stream.seek(SeekFrom::Start(offset))?;
            stream.read_exact(&mut buf)?;
        }

        if entry.is_compressed() {
            zlib_decompress(&buf)
        } else {
            Ok(buf)
        }
    }

    /// Decodes and returns the names in a directory entry (spec §4.9
    /// `getDirectoryListing`). `return_absolute` prefixes each name with
    /// `path` to produce full archive paths instead of bare names.
    #[instrument(skip(self))]
    pub fn get_directory_listing(&mut self, path: &str, files_only: bool, return_absolute: bool) -> Result<Vec<String>> {
        let entry = self.get_entry(path)?.clone();
        if !entry.is_directory() {
            return Err(Error::NotDirectory(path.to_string()));
        }

        let bytes = self.read_raw_payload(&entry)?;
        let names = match self.version {
            Version::V1 => decode_listing_v1(&bytes)?,
            Version::V2 => decode_listing_v2(&bytes)?,
        };

        let base = path.trim_end_matches('/');
        Ok(names
            .into_iter()
            .filter(|name| !files_only || !name.starts_with('/'))
            .map(|name| {
                let bare = name.trim_start_matches('/');
                if return_absolute {
                    format!("{base}/{bare}")
                } else {
                    name
                }
            })
            .collect())
    }

    /// Extracts a non-texture entry's bytes, or (for a texture entry) the
    /// synthesized descriptor bytes followed by the reconstructed surface
    /// bytes (spec §4.9).
    #[instrument(skip(self))]
    pub fn extract(&mut self, path: &str) -> Result<Vec<Vec<u8>>> {
        let entry = self.get_entry(path)?.clone();

        if entry.is_directory() {
            return Err(Error::IsDirectory(path.to_string()));
        }

        if let Some(texture) = entry.texture().cloned() {
            let archive_bytes = self.read_raw_payload(&entry)?;

            let surface_pixels = convert_from_archive(
                texture.format,
                texture.width,
                texture.height,
                texture.mipmap_count,
                texture.face_count,
                texture.pitch_alignment,
                texture.image_alignment,
                &archive_bytes,
            )?;

            let mut dds = Vec::new();
            write_dds_header(
                &mut dds,
                texture.format,
                texture.width,
                texture.height,
                texture.mipmap_count,
                texture.is_cube,
            )?;
            dds.extend_from_slice(&surface_pixels);

            let descriptor = texture.to_descriptor_bytes()?;

            return Ok(vec![descriptor, dds]);
        }

        Ok(vec![self.read_raw_payload(&entry)?])
    }

    /// Writes a non-texture entry to `output_path`, or a texture entry's
    /// descriptor to `output_path` and its surface to the sibling `.dds`
    /// path (spec §4.9).
    pub fn extract_to_file<P: AsRef<Path>>(&mut self, path: &str, output_path: P) -> Result<()> {
        let mut parts = self.extract(path)?;
        let output_path = output_path.as_ref();

        if parts.len() == 2 {
            let surface = parts.pop().expect("checked len");
            let descriptor = parts.pop().expect("checked len");

            std::fs::write(output_path, descriptor)?;

            let surface_path = output_path.with_extension("dds");
            std::fs::write(surface_path, surface)?;
        } else {
            std::fs::write(output_path, parts.pop().expect("checked len"))?;
        }

        Ok(())
    }

    pub fn read_all_text(&mut self, path: &str) -> Result<String> {
        let entry = self.get_entry(path)?.clone();
        let bytes = self.read_raw_payload(&entry)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Closes the reader; all further operations other than `close` fail
    /// with [`Error::Closed`] (spec §4.11).
    pub fn close(&mut self) {
        self.stream = None;
    }
}

/// Walks `tree` and writes a v1 or v2 listing blob per directory,
/// returning `(archive_path, bytes, hash)` triples in the depth-first
/// insertion order spec §4.7/§5 require.
pub(crate) fn synthesize_listings(tree: &DirectoryTree, version: Version, salt: u16) -> Result<Vec<(String, Vec<u8>, u64)>> {
    let mut out = Vec::new();

    for dir_path in tree.directories_depth_first() {
        let names = tree.names_in(&dir_path).unwrap_or(&[]);
        let bytes = match version {
            Version::V1 => crate::directory::encode_listing_v1(names),
            Version::V2 => crate::directory::encode_listing_v2(names)?,
        };
        let hash = hash_path(&dir_path, salt);
        out.push((dir_path, bytes, hash));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_table::v1::write as write_entry_table_v1;
    use crate::entry::{EntryFlagsV1 as Flags, EntryV1 as RawEntryV1};
    use crate::header::{Version as HVersion, PAYLOAD_REGION_START};
    use std::io::{Cursor, Write};

    fn build_v1_archive(salt: u16, files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut entries = Vec::new();
        let mut payload = Vec::new();

        for (path, bytes) in files {
            let offset = PAYLOAD_REGION_START + payload.len() as u64;
            payload.extend_from_slice(bytes);

            entries.push(RawEntryV1 {
                hash: hash_path(path, salt),
                offset,
                flags: Flags::empty(),
                crc32: 0,
                size: bytes.len() as u32,
                compressed_size: bytes.len() as u32,
            });
        }
        entries.sort_by_key(|e| e.hash);

        let mut buf = Cursor::new(Vec::new());
        buf.write_all(&[0u8; PAYLOAD_REGION_START as usize]).unwrap();
        buf.set_position(PAYLOAD_REGION_START);
        buf.write_all(&payload).unwrap();

        let start_offset = buf.position() as u32;
        let mut table = Vec::new();
        write_entry_table_v1(&mut table, &entries).unwrap();
        buf.write_all(&table).unwrap();

        let header = HeaderV1 {
            salt,
            num_entries: entries.len() as u32,
            start_offset,
        };
        header.write(&mut buf).unwrap();

        buf.into_inner()
    }

    #[test]
    fn opens_and_extracts_v1_roundtrip() {
        let archive = build_v1_archive(42, &[("/readme.txt", b"hello world")]);

        let mut reader = Reader::open(Cursor::new(archive), false).unwrap();
        assert_eq!(reader.version(), HVersion::V1);
        assert_eq!(reader.salt(), 42);

        assert!(reader.file_exists("/readme.txt"));
        let parts = reader.extract("/readme.txt").unwrap();
        assert_eq!(parts, vec![b"hello world".to_vec()]);
    }

    #[test]
    fn rejects_operations_after_close() {
        let archive = build_v1_archive(0, &[("/a.txt", b"x")]);
        let mut reader = Reader::open(Cursor::new(archive), false).unwrap();
        reader.close();

        assert!(matches!(reader.extract("/a.txt"), Err(Error::Closed)));
    }

    #[test]
    fn missing_entry_is_not_found() {
        let archive = build_v1_archive(0, &[("/a.txt", b"x")]);
        let mut reader = Reader::open(Cursor::new(archive), false).unwrap();

        assert!(matches!(reader.extract("/missing.txt"), Err(Error::NotFound(_))));
    }

    #[test]
    fn synthesized_listings_cover_every_prefix() {
        let mut tree = DirectoryTree::new();
        tree.insert_file("/a/b/c.txt");

        let listings = synthesize_listings(&tree, HVersion::V1, 0).unwrap();
        let paths: Vec<&str> = listings.iter().map(|(p, _, _)| p.as_str()).collect();

        assert_eq!(paths, vec!["/", "/a", "/a/b"]);
    }
}
