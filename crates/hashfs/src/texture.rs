//! v2 texture descriptor metadata (spec §3, §4.6 "Image" chunk).
//!
//! `width`/`height`/`mipmapCount`/`faceCount` are all stored as `value - 1`
//! so that the common case (1 mip, 1 face) fits the smallest possible
//! field; the rest pack into two 32-bit words read/written through
//! [`crate::bitfield::BitFlagField`], the same "bitfield wrapper over a
//! plain integer" shape as the teacher's `FileCompressionInfo`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::bitfield::BitFlagField;
use crate::{Error, Result};

/// DXGI format identifiers for the block-compressed and uncompressed
/// surface formats this codec needs to compute pitches for (spec §4.8).
/// Numeric values match the public `DXGI_FORMAT` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DxgiFormat {
    R32G32B32A32Float = 2,
    R16G16B16A16Float = 10,
    R8G8B8A8Unorm = 28,
    R8G8B8A8UnormSrgb = 29,
    R8G8Unorm = 49,
    R8Unorm = 61,
    Bc1Unorm = 71,
    Bc1UnormSrgb = 72,
    Bc2Unorm = 74,
    Bc2UnormSrgb = 75,
    Bc3Unorm = 77,
    Bc3UnormSrgb = 78,
    Bc4Unorm = 80,
    Bc4Snorm = 81,
    Bc5Unorm = 83,
    Bc5Snorm = 84,
    Bc6hUf16 = 95,
    Bc6hSf16 = 96,
    Bc7Unorm = 98,
    Bc7UnormSrgb = 99,
    /// Packed 4:2:2 format; two pixels share one `G` sample pair.
    R8G8B8G8UnormPacked = 68,
    /// Planar 4:2:0 video format; luma plane followed by a half-resolution
    /// interleaved chroma plane.
    Nv12Planar = 103,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TextureFilter {
    Nearest = 0,
    Linear = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MipFilter {
    Nearest = 0,
    Linear = 1,
    Trilinear = 2,
    None = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AddressMode {
    Repeat = 0,
    Mirror = 1,
    Clamp = 2,
    Border = 3,
    MirrorOnce = 4,
    Reserved5 = 5,
    Reserved6 = 6,
    Reserved7 = 7,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    pub format: DxgiFormat,
    pub is_cube: bool,
    pub face_count: u32,
    pub pitch_alignment: u32,
    pub image_alignment: u32,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub mip_filter: MipFilter,
    pub addr_u: AddressMode,
    pub addr_v: AddressMode,
    pub addr_w: AddressMode,
}

impl TextureMetadata {
    /// Decodes the two packed words (spec §3). `width`/`height` arrive
    /// separately — they are stored in the Image chunk's trailing 8-byte
    /// region rather than the word-pair itself (see `metadata.rs`'s
    /// `ImageTrailer`, and the Open Question decision in `DESIGN.md`).
    pub fn decode_words(word_a: u32, word_b: u32, width: u32, height: u32) -> Result<Self> {
        let word_a = BitFlagField::new(word_a);
        let word_b = BitFlagField::new(word_b);

        let mipmap_count = word_a.get(0, 4) + 1;
        let format_raw = word_a.get(4, 8) as u8;
        let is_cube = word_a.get(12, 2) != 0;
        let face_count = word_a.get(14, 6) + 1;
        let pitch_alignment = 1u32 << word_a.get(20, 4);
        let image_alignment = 1u32 << word_a.get(24, 4);

        let format = DxgiFormat::try_from(format_raw)
            .map_err(|_| Error::CorruptTable("unrecognized DXGI format in texture metadata"))?;

        let mag_filter = TextureFilter::try_from(word_b.get(0, 1) as u8).expect("1-bit field");
        let min_filter = TextureFilter::try_from(word_b.get(1, 1) as u8).expect("1-bit field");
        let mip_filter = MipFilter::try_from(word_b.get(2, 2) as u8).expect("2-bit field");
        let addr_u = AddressMode::try_from(word_b.get(4, 3) as u8).expect("3-bit field");
        let addr_v = AddressMode::try_from(word_b.get(7, 3) as u8).expect("3-bit field");
        let addr_w = AddressMode::try_from(word_b.get(10, 3) as u8).expect("3-bit field");

        Ok(Self {
            width,
            height,
            mipmap_count,
            format,
            is_cube,
            face_count,
            pitch_alignment,
            image_alignment,
            mag_filter,
            min_filter,
            mip_filter,
            addr_u,
            addr_v,
            addr_w,
        })
    }

    pub fn encode_words(&self) -> (u32, u32) {
        let mut word_a = BitFlagField::new(0);
        word_a.set(0, 4, self.mipmap_count - 1);
        word_a.set(4, 8, u8::from(self.format) as u32);
        word_a.set(12, 2, self.is_cube as u32);
        word_a.set(14, 6, self.face_count - 1);
        word_a.set(20, 4, self.pitch_alignment.trailing_zeros());
        word_a.set(24, 4, self.image_alignment.trailing_zeros());

        let mut word_b = BitFlagField::new(0);
        word_b.set(0, 1, u8::from(self.mag_filter) as u32);
        word_b.set(1, 1, u8::from(self.min_filter) as u32);
        word_b.set(2, 2, u8::from(self.mip_filter) as u32);
        word_b.set(4, 3, u8::from(self.addr_u) as u32);
        word_b.set(7, 3, u8::from(self.addr_v) as u32);
        word_b.set(10, 3, u8::from(self.addr_w) as u32);

        (word_a.raw(), word_b.raw())
    }

    /// A canonical flat encoding of every sampling field, used when the
    /// reader synthesizes a standalone descriptor file on extraction
    /// (spec §4.9). The original `.tobj` binary layout is an opaque
    /// collaborator format (spec §6) this library never parses or
    /// reproduces byte-for-byte; this is our own encoding of the fields
    /// we do carry.
    pub fn to_descriptor_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(self.width)?;
        out.write_u32::<LittleEndian>(self.height)?;
        out.write_u32::<LittleEndian>(self.mipmap_count)?;
        out.write_u8(self.format.into())?;
        out.write_u8(self.is_cube as u8)?;
        out.write_u32::<LittleEndian>(self.face_count)?;
        out.write_u32::<LittleEndian>(self.pitch_alignment)?;
        out.write_u32::<LittleEndian>(self.image_alignment)?;
        out.write_u8(self.mag_filter.into())?;
        out.write_u8(self.min_filter.into())?;
        out.write_u8(self.mip_filter.into())?;
        out.write_u8(self.addr_u.into())?;
        out.write_u8(self.addr_v.into())?;
        out.write_u8(self.addr_w.into())?;
        Ok(out)
    }

    pub fn from_descriptor_bytes(mut bytes: &[u8]) -> Result<Self> {
        let width = bytes.read_u32::<LittleEndian>()?;
        let height = bytes.read_u32::<LittleEndian>()?;
        let mipmap_count = bytes.read_u32::<LittleEndian>()?;
        let format = DxgiFormat::try_from(bytes.read_u8()?)
            .map_err(|_| Error::CorruptTable("unrecognized DXGI format in descriptor"))?;
        let is_cube = bytes.read_u8()? != 0;
        let face_count = bytes.read_u32::<LittleEndian>()?;
        let pitch_alignment = bytes.read_u32::<LittleEndian>()?;
        let image_alignment = bytes.read_u32::<LittleEndian>()?;
        let mag_filter = TextureFilter::try_from(bytes.read_u8()?).expect("1-bit field");
        let min_filter = TextureFilter::try_from(bytes.read_u8()?).expect("1-bit field");
        let mip_filter = MipFilter::try_from(bytes.read_u8()?).expect("2-bit field");
        let addr_u = AddressMode::try_from(bytes.read_u8()?).expect("3-bit field");
        let addr_v = AddressMode::try_from(bytes.read_u8()?).expect("3-bit field");
        let addr_w = AddressMode::try_from(bytes.read_u8()?).expect("3-bit field");

        Ok(Self {
            width,
            height,
            mipmap_count,
            format,
            is_cube,
            face_count,
            pitch_alignment,
            image_alignment,
            mag_filter,
            min_filter,
            mip_filter,
            addr_u,
            addr_v,
            addr_w,
        })
    }
}
