//! v1 entry table (spec §4.4) — a flat, uncompressed, stride-32 array.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::entry::{EntryFlagsV1, EntryV1};
use crate::{Error, Result};

pub const STRIDE: u64 = 32;

pub fn read<R: Read + Seek>(
    reader: &mut R,
    num_entries: u32,
    start_offset: u32,
    force_at_end: bool,
) -> Result<Vec<EntryV1>> {
    let offset = if force_at_end {
        let file_len = reader.seek(SeekFrom::End(0))?;
        file_len
            .checked_sub(num_entries as u64 * STRIDE)
            .ok_or(Error::CorruptTable("v1 entry table does not fit before EOF"))?
    } else {
        start_offset as u64
    };

    reader.seek(SeekFrom::Start(offset))?;

    let mut entries = Vec::with_capacity(num_entries as usize);

    for _ in 0..num_entries {
        let hash = reader.read_u64::<LittleEndian>()?;
        let file_offset = reader.read_u64::<LittleEndian>()?;
        let flags_raw = reader.read_u32::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;

        let flags = EntryFlagsV1::from_bits_truncate(flags_raw);
        if flags.contains(EntryFlagsV1::ENCRYPTED) {
            return Err(Error::UnsupportedFeature("encrypted v1 entries"));
        }

        entries.push(EntryV1 {
            hash,
            offset: file_offset,
            flags,
            crc32,
            size,
            compressed_size,
        });
    }

    Ok(entries)
}

/// Writes entries in the order given; the writer facade is responsible
/// for sorting by hash beforehand (spec §3 invariant, §5 ordering rule).
pub fn write<W: Write>(writer: &mut W, entries: &[EntryV1]) -> Result<()> {
    for entry in entries {
        writer.write_u64::<LittleEndian>(entry.hash)?;
        writer.write_u64::<LittleEndian>(entry.offset)?;
        writer.write_u32::<LittleEndian>(entry.flags.bits())?;
        writer.write_u32::<LittleEndian>(entry.crc32)?;
        writer.write_u32::<LittleEndian>(entry.size)?;
        writer.write_u32::<LittleEndian>(entry.compressed_size)?;
    }

    Ok(())
}
