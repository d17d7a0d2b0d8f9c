//! v2 metadata table (spec §4.6).
//!
//! The table is a single zlib-compressed byte stream, addressed in 4-byte
//! "blocks" rather than bytes. Each entry owns `metadataCount` chunk-type
//! descriptors (4 bytes each: a 24-bit block index plus an 8-bit chunk
//! type), written contiguously; each descriptor's `nextMetaIndex` gives
//! the block index where *that* chunk's own payload begins, so on read we
//! can jump straight to each payload without recomputing sizes (the advance
//! table in spec §4.6 is only needed to compute those indices when
//! writing, since the payload region for chunk *i* doesn't exist yet at
//! the point its descriptor is emitted).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::compression::{zlib_compress, zlib_decompress, CompressionLevel};
use crate::texture::TextureMetadata;
use crate::{Error, Result};

pub const BLOCK_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ChunkType {
    Image = 1,
    Sample = 2,
    MipProxy = 3,
    InlineDirectory = 4,
    Unknown6 = 6,
    Plain = 128,
    Directory = 129,
    Mip0 = 130,
    Mip1 = 131,
    MipTail = 132,
}

impl ChunkType {
    /// Block-stride advance used to lay out a chunk's payload on write
    /// (spec §4.6).
    pub fn block_advance(self) -> u32 {
        match self {
            ChunkType::Plain => 4,
            ChunkType::Unknown6 => 2,
            ChunkType::Directory => 4,
            ChunkType::Image => 2,
            ChunkType::Sample => 1,
            ChunkType::MipTail => 4,
            ChunkType::MipProxy | ChunkType::InlineDirectory | ChunkType::Mip0 | ChunkType::Mip1 => 1,
        }
    }
}

/// Spec §4.6 "MainMetadata record (16 bytes)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainMetadata {
    pub compressed_size: u32,
    /// Bit 4 of the flags nibble; spec §4.6 "low nibble = bits 24-27 of
    /// compressedSize; high nibble = flags, bit 4 of flags1 = compressed".
    pub is_compressed: bool,
    pub size: u32,
    /// High nibble of the second size byte; reserved, replicated verbatim.
    pub reserved_flags2: u8,
    /// Preserved verbatim on rewrite (spec §9a); never interpreted.
    pub unknown: u32,
    pub offset_block: u32,
}

impl MainMetadata {
    pub const SIZE: usize = 16;

    pub fn offset(&self) -> u64 {
        self.offset_block as u64 * 16
    }

    pub fn from_offset(offset: u64) -> u32 {
        debug_assert!(offset % 16 == 0, "v2 payload offsets are 16-byte aligned");
        (offset / 16) as u32
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let compressed_size_lo = read_u24(reader)?;
        let msb_and_flags1 = reader.read_u8()?;
        let size_lo = read_u24(reader)?;
        let msb_and_flags2 = reader.read_u8()?;
        let unknown = reader.read_u32::<LittleEndian>()?;
        let offset_block = reader.read_u32::<LittleEndian>()?;

        let compressed_size = compressed_size_lo | ((msb_and_flags1 as u32 & 0x0F) << 24);
        let size = size_lo | ((msb_and_flags2 as u32 & 0x0F) << 24);
        let is_compressed = msb_and_flags1 & 0x10 != 0;
        let reserved_flags2 = msb_and_flags2 >> 4;

        Ok(Self {
            compressed_size,
            is_compressed,
            size,
            reserved_flags2,
            unknown,
            offset_block,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u24(writer, self.compressed_size & 0x00FF_FFFF)?;

        let msb_flags1 = ((self.compressed_size >> 24) & 0x0F) as u8
            | ((self.is_compressed as u8) << 4);
        writer.write_u8(msb_flags1)?;

        write_u24(writer, self.size & 0x00FF_FFFF)?;

        let msb_flags2 = ((self.size >> 24) & 0x0F) as u8 | (self.reserved_flags2 << 4);
        writer.write_u8(msb_flags2)?;

        writer.write_u32::<LittleEndian>(self.unknown)?;
        writer.write_u32::<LittleEndian>(self.offset_block)?;

        Ok(())
    }
}

fn read_u24<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 3];
    reader.read_exact(&mut buf)?;
    Ok(u32::from(buf[0]) | (u32::from(buf[1]) << 8) | (u32::from(buf[2]) << 16))
}

fn write_u24<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&[value as u8, (value >> 8) as u8, (value >> 16) as u8])?;
    Ok(())
}

/// Constant observed in the upper nibble of `ImageTrailer`'s second word's
/// most significant byte (spec §9c); preserved verbatim on rewrite.
pub const IMAGE_TRAILER_RESERVED_NIBBLE: u8 = 0x3;

/// The 8-byte region following an Image entry's main-metadata. Spec §3
/// states width/height are stored as `value - 1` 16-bit integers
/// alongside the bit-packed word pair; this is where that library places
/// them (see `DESIGN.md`'s Open Question decision for the reasoning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTrailer {
    pub width: u32,
    pub height: u32,
    pub reserved: u32,
}

impl ImageTrailer {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let width = reader.read_u16::<LittleEndian>()? as u32 + 1;
        let height = reader.read_u16::<LittleEndian>()? as u32 + 1;
        let reserved = reader.read_u32::<LittleEndian>()?;

        Ok(Self { width, height, reserved })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>((self.width - 1) as u16)?;
        writer.write_u16::<LittleEndian>((self.height - 1) as u16)?;
        writer.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            reserved: (IMAGE_TRAILER_RESERVED_NIBBLE as u32) << 28,
        }
    }
}

/// A decoded top-level metadata record, classified by its leading chunk
/// (spec §4.6).
#[derive(Debug, Clone)]
pub enum MetadataRecord {
    Plain(MainMetadata),
    /// A `.pmg` sibling's Unknown6 service chunk, carrying 8 reserved
    /// zero bytes (spec §4.6, §9a); preserved verbatim, never interpreted.
    PlainWithService(MainMetadata, [u8; 8]),
    Directory(MainMetadata),
    Image(TextureMetadata, MainMetadata),
}

impl MetadataRecord {
    pub fn main(&self) -> &MainMetadata {
        match self {
            MetadataRecord::Plain(m) => m,
            MetadataRecord::PlainWithService(m, _) => m,
            MetadataRecord::Directory(m) => m,
            MetadataRecord::Image(_, m) => m,
        }
    }
}

/// One chunk-type descriptor (spec §4.6): 24-bit block index + chunk type.
struct ChunkDescriptor {
    next_meta_index: u32,
    chunk_type: ChunkType,
}

impl ChunkDescriptor {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let next_meta_index = read_u24(reader)?;
        let raw_type = reader.read_u8()?;
        let chunk_type = ChunkType::try_from(raw_type).map_err(|_| Error::UnsupportedFeature("unknown chunk type"))?;

        Ok(Self { next_meta_index, chunk_type })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u24(writer, self.next_meta_index)?;
        writer.write_u8(self.chunk_type.into())?;
        Ok(())
    }
}

/// Decompressed v2 metadata table, addressed by block index.
pub struct MetadataTable {
    bytes: Vec<u8>,
}

impl MetadataTable {
    pub fn from_compressed(reader: &mut impl Read, compressed_length: u32) -> Result<Self> {
        let mut compressed = vec![0u8; compressed_length as usize];
        reader.read_exact(&mut compressed)?;
        let bytes = zlib_decompress(&compressed)?;

        Ok(Self { bytes })
    }

    fn block_offset(index: u32) -> usize {
        index as usize * BLOCK_SIZE as usize
    }

    /// Reads the record rooted at `metadata_index` with `metadata_count`
    /// leading chunk descriptors (spec §4.6).
    pub fn read_record(&self, metadata_index: u32, metadata_count: u16) -> Result<MetadataRecord> {
        let start = Self::block_offset(metadata_index);
        let mut cursor = self
            .bytes
            .get(start..)
            .ok_or(Error::CorruptTable("metadata index out of range"))?;

        if metadata_count == 0 {
            return Err(Error::CorruptTable("entry with zero metadata chunks"));
        }

        let mut descriptors = Vec::with_capacity(metadata_count as usize);
        for _ in 0..metadata_count {
            descriptors.push(ChunkDescriptor::read(&mut cursor)?);
        }

        let leading = descriptors[0].chunk_type;

        match leading {
            ChunkType::Plain => {
                let mut payload = self.payload_at(descriptors[0].next_meta_index, MainMetadata::SIZE)?;
                let main = MainMetadata::read(&mut payload)?;

                if metadata_count == 1 {
                    Ok(MetadataRecord::Plain(main))
                } else if metadata_count == 2 && descriptors[1].chunk_type == ChunkType::Unknown6 {
                    let mut service_payload = self.payload_at(descriptors[1].next_meta_index, 8)?;
                    let mut service = [0u8; 8];
                    service_payload.read_exact(&mut service)?;

                    Ok(MetadataRecord::PlainWithService(main, service))
                } else {
                    Err(Error::CorruptTable("unexpected chunk chain after Plain"))
                }
            }

            ChunkType::Directory => {
                let mut payload = self.payload_at(descriptors[0].next_meta_index, MainMetadata::SIZE)?;
                let main = MainMetadata::read(&mut payload)?;
                Ok(MetadataRecord::Directory(main))
            }

            ChunkType::Image => {
                let mut payload = self.payload_at(
                    descriptors[0].next_meta_index,
                    8 + MainMetadata::SIZE + 8,
                )?;

                let word_a = payload.read_u32::<LittleEndian>()?;
                let word_b = payload.read_u32::<LittleEndian>()?;
                let main = MainMetadata::read(&mut payload)?;
                let trailer = ImageTrailer::read(&mut payload)?;

                let texture = TextureMetadata::decode_words(word_a, word_b, trailer.width, trailer.height)?;

                Ok(MetadataRecord::Image(texture, main))
            }

            _ => Err(Error::UnsupportedFeature("unsupported leading chunk type")),
        }
    }

    fn payload_at(&self, block_index: u32, len: usize) -> Result<&[u8]> {
        let start = Self::block_offset(block_index);
        self.bytes
            .get(start..start + len)
            .ok_or(Error::CorruptTable("metadata payload out of range"))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Builds the v2 metadata table in insertion order (spec §5: "metadata-
/// table entries written in insertion order because chunk-index chains
/// depend on it").
#[derive(Default)]
pub struct MetadataTableBuilder {
    bytes: Vec<u8>,
}

impl MetadataTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_block(&self) -> u32 {
        (self.bytes.len() / BLOCK_SIZE as usize) as u32
    }

    /// Appends a plain file record; returns `(metadata_index, metadata_count)`
    /// for the caller's entry-table row.
    pub fn push_plain(&mut self, main: MainMetadata) -> Result<(u32, u16)> {
        let entry_start = self.current_block();
        let payload_start = entry_start + 1;

        ChunkDescriptor {
            next_meta_index: payload_start,
            chunk_type: ChunkType::Plain,
        }
        .write(&mut self.bytes)?;

        main.write(&mut self.bytes)?;
        pad_to_block(&mut self.bytes);

        Ok((entry_start, 1))
    }

    /// Appends a `.pmg` sibling's two-chunk record: a Plain descriptor
    /// followed by an Unknown6 descriptor carrying the 8-byte service
    /// payload, mirroring what `MetadataTable::read_record` decodes back
    /// into `MetadataRecord::PlainWithService`.
    pub fn push_plain_with_service(&mut self, main: MainMetadata, service: [u8; 8]) -> Result<(u32, u16)> {
        let entry_start = self.current_block();
        let main_payload_start = entry_start + 2;
        let main_payload_blocks = MainMetadata::SIZE as u32 / BLOCK_SIZE;
        let service_payload_start = main_payload_start + main_payload_blocks;

        ChunkDescriptor {
            next_meta_index: main_payload_start,
            chunk_type: ChunkType::Plain,
        }
        .write(&mut self.bytes)?;

        ChunkDescriptor {
            next_meta_index: service_payload_start,
            chunk_type: ChunkType::Unknown6,
        }
        .write(&mut self.bytes)?;

        main.write(&mut self.bytes)?;
        self.bytes.write_all(&service)?;
        pad_to_block(&mut self.bytes);

        Ok((entry_start, 2))
    }

    pub fn push_directory(&mut self, main: MainMetadata) -> Result<(u32, u16)> {
        let entry_start = self.current_block();
        let payload_start = entry_start + 1;

        ChunkDescriptor {
            next_meta_index: payload_start,
            chunk_type: ChunkType::Directory,
        }
        .write(&mut self.bytes)?;

        main.write(&mut self.bytes)?;
        pad_to_block(&mut self.bytes);

        Ok((entry_start, 1))
    }

    pub fn push_image(&mut self, texture: &TextureMetadata, main: MainMetadata) -> Result<(u32, u16)> {
        let entry_start = self.current_block();
        let payload_start = entry_start + 1;

        ChunkDescriptor {
            next_meta_index: payload_start,
            chunk_type: ChunkType::Image,
        }
        .write(&mut self.bytes)?;

        let (word_a, word_b) = texture.encode_words();
        self.bytes.write_u32::<LittleEndian>(word_a)?;
        self.bytes.write_u32::<LittleEndian>(word_b)?;

        main.write(&mut self.bytes)?;

        ImageTrailer::new(texture.width, texture.height).write(&mut self.bytes)?;
        pad_to_block(&mut self.bytes);

        Ok((entry_start, 1))
    }

    pub fn finish(self, level: CompressionLevel) -> Result<Vec<u8>> {
        zlib_compress(&self.bytes, level)
    }

    pub fn uncompressed_len(&self) -> usize {
        self.bytes.len()
    }
}

fn pad_to_block(bytes: &mut Vec<u8>) {
    let remainder = bytes.len() % BLOCK_SIZE as usize;
    if remainder != 0 {
        bytes.resize(bytes.len() + (BLOCK_SIZE as usize - remainder), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_main(offset: u64) -> MainMetadata {
        MainMetadata {
            compressed_size: 1234,
            is_compressed: true,
            size: 5678,
            reserved_flags2: 0,
            unknown: 0,
            offset_block: MainMetadata::from_offset(offset),
        }
    }

    #[test]
    fn main_metadata_roundtrips_including_flag_nibbles() {
        let main = sample_main(4096);

        let mut buf = Vec::new();
        main.write(&mut buf).unwrap();
        assert_eq!(buf.len(), MainMetadata::SIZE);

        let mut cur = Cursor::new(buf);
        let parsed = MainMetadata::read(&mut cur).unwrap();

        assert_eq!(parsed, main);
        assert_eq!(parsed.offset(), 4096);
    }

    #[test]
    fn large_size_spanning_msb_nibble_roundtrips() {
        let mut main = sample_main(0);
        main.compressed_size = 0x0F12_3456;
        main.size = 0x0ABC_DEF0;

        let mut buf = Vec::new();
        main.write(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let parsed = MainMetadata::read(&mut cur).unwrap();

        assert_eq!(parsed.compressed_size, 0x0F12_3456);
        assert_eq!(parsed.size, 0x0ABC_DEF0);
    }

    #[test]
    fn builder_roundtrips_plain_directory_and_image() {
        let mut builder = MetadataTableBuilder::new();

        let (plain_idx, plain_count) = builder.push_plain(sample_main(4096)).unwrap();
        let (dir_idx, dir_count) = builder.push_directory(sample_main(0)).unwrap();

        let texture = TextureMetadata {
            width: 256,
            height: 256,
            mipmap_count: 9,
            format: crate::texture::DxgiFormat::Bc1UnormSrgb,
            is_cube: false,
            face_count: 1,
            pitch_alignment: 256,
            image_alignment: 512,
            mag_filter: crate::texture::TextureFilter::Linear,
            min_filter: crate::texture::TextureFilter::Linear,
            mip_filter: crate::texture::MipFilter::Trilinear,
            addr_u: crate::texture::AddressMode::Repeat,
            addr_v: crate::texture::AddressMode::Repeat,
            addr_w: crate::texture::AddressMode::Clamp,
        };
        let (img_idx, img_count) = builder.push_image(&texture, sample_main(8192)).unwrap();

        let compressed = builder.finish(CompressionLevel::Optimal).unwrap();

        let mut cur = Cursor::new(compressed.clone());
        let table = MetadataTable::from_compressed(&mut cur, compressed.len() as u32).unwrap();

        match table.read_record(plain_idx, plain_count).unwrap() {
            MetadataRecord::Plain(main) => assert_eq!(main.offset(), 4096),
            other => panic!("expected Plain, got {other:?}"),
        }

        match table.read_record(dir_idx, dir_count).unwrap() {
            MetadataRecord::Directory(main) => assert_eq!(main.offset(), 0),
            other => panic!("expected Directory, got {other:?}"),
        }

        match table.read_record(img_idx, img_count).unwrap() {
            MetadataRecord::Image(parsed_texture, main) => {
                assert_eq!(parsed_texture, texture);
                assert_eq!(main.offset(), 8192);
            }
            other => panic!("expected Image, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_leading_chunk_type_errors() {
        let mut bytes = Vec::new();
        ChunkDescriptor {
            next_meta_index: 1,
            chunk_type: ChunkType::Sample,
        }
        .write(&mut bytes)
        .unwrap();

        let compressed = zlib_compress(&bytes, CompressionLevel::Optimal).unwrap();
        let mut cur = Cursor::new(compressed.clone());
        let table = MetadataTable::from_compressed(&mut cur, compressed.len() as u32).unwrap();

        assert!(matches!(table.read_record(0, 1), Err(Error::UnsupportedFeature(_))));
    }
}
