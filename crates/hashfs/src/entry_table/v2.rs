//! v2 entry table (spec §4.5) — a zlib-compressed, stride-16 array.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compression::{zlib_compress, zlib_decompress, CompressionLevel};
use crate::{Error, Result};

pub const STRIDE: usize = 16;

pub const FLAG_DIRECTORY: u16 = 1 << 0;

/// One row of the on-disk v2 entry table. Does not carry a payload size —
/// that lives in the metadata table's main-metadata record, addressed via
/// `metadata_index`.
#[derive(Debug, Clone, Copy)]
pub struct EntryRowV2 {
    pub hash: u64,
    pub metadata_index: u32,
    pub metadata_count: u16,
    pub flags: u16,
}

impl EntryRowV2 {
    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }
}

/// Decompresses and decodes the table, then returns it sorted by
/// `metadata_index` (spec §4.5: "the array is additionally sorted by
/// `metadataIndex` before walking the metadata table, so chunk-order side
/// effects are deterministic").
pub fn read_sorted_by_metadata_index<R: Read>(
    reader: &mut R,
    compressed_length: u32,
    num_entries: u32,
) -> Result<Vec<EntryRowV2>> {
    let mut compressed = vec![0u8; compressed_length as usize];
    reader.read_exact(&mut compressed)?;

    let decompressed = zlib_decompress(&compressed)?;
    if decompressed.len() != num_entries as usize * STRIDE {
        return Err(Error::CorruptTable("v2 entry table size mismatch after decompression"));
    }

    let mut rows = Vec::with_capacity(num_entries as usize);
    let mut cursor = &decompressed[..];

    for _ in 0..num_entries {
        let hash = cursor.read_u64::<LittleEndian>()?;
        let metadata_index = cursor.read_u32::<LittleEndian>()?;
        let metadata_count = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;

        rows.push(EntryRowV2 {
            hash,
            metadata_index,
            metadata_count,
            flags,
        });
    }

    rows.sort_by_key(|row| row.metadata_index);

    Ok(rows)
}

/// Encodes `rows` (which must already be sorted by hash, spec §3 invariant)
/// and zlib-compresses the result.
pub fn write_compressed(rows: &[EntryRowV2], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(rows.len() * STRIDE);

    for row in rows {
        raw.write_u64::<LittleEndian>(row.hash)?;
        raw.write_u32::<LittleEndian>(row.metadata_index)?;
        raw.write_u16::<LittleEndian>(row.metadata_count)?;
        raw.write_u16::<LittleEndian>(row.flags)?;
    }

    zlib_compress(&raw, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrips_and_sorts_by_metadata_index() {
        let rows = vec![
            EntryRowV2 { hash: 5, metadata_index: 3, metadata_count: 1, flags: 0 },
            EntryRowV2 { hash: 1, metadata_index: 0, metadata_count: 1, flags: FLAG_DIRECTORY },
            EntryRowV2 { hash: 9, metadata_index: 1, metadata_count: 2, flags: 0 },
        ];

        let compressed = write_compressed(&rows, CompressionLevel::Optimal).unwrap();

        let mut cur = Cursor::new(compressed.clone());
        let parsed = read_sorted_by_metadata_index(&mut cur, compressed.len() as u32, 3).unwrap();

        assert_eq!(parsed.iter().map(|r| r.metadata_index).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert!(parsed[0].is_directory());
    }
}
