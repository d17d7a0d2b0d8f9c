//! Surface (DDS) repacking between an external texture file's tight
//! layout and the archive's pitch/image-aligned layout (spec §4.8).
//!
//! The byte-for-byte DDS container format itself is not the subject of
//! this codec — only enough of its header is read to locate pixel data
//! and validate the DX10-extended-header precondition spec §4.8 demands.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::texture::DxgiFormat;
use crate::{Error, Result};

const DDS_MAGIC: u32 = 0x2053_4444; // "DDS "
const DDS_HEADER_SIZE: u32 = 124;
const DDS_PIXELFORMAT_FOURCC_DX10: u32 = 0x3031_5844; // "DX10"
const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const D3D10_RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;
const D3D10_MISC_TEXTURECUBE: u32 = 0x4;

/// Byte offset of pixel data in a DX10-extended DDS file: magic (4) +
/// `DDS_HEADER` (124) + `DDS_HEADER_DXT10` (20).
pub const DX10_PIXEL_DATA_OFFSET: u64 = 4 + 124 + 20;

pub struct DdsInfo {
    pub format: DxgiFormat,
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    pub is_cube: bool,
}

/// Parses just enough of a DDS file to validate it and extract the fields
/// the repacker needs. Legacy fourcc-only files (no `DX10` header) fail
/// with `TexturePacking` per spec §4.8's required preconditions.
pub fn parse_dds_header(path: &str, bytes: &[u8]) -> Result<DdsInfo> {
    let fail = |reason: &'static str| Error::TexturePacking {
        path: path.to_string(),
        reason,
    };

    if bytes.len() < DX10_PIXEL_DATA_OFFSET as usize {
        return Err(fail("surface file is too short to contain a DX10 header"));
    }

    let mut cursor = bytes;

    let magic = cursor.read_u32::<LittleEndian>().map_err(|_| fail("invalid surface byte stream"))?;
    if magic != DDS_MAGIC {
        return Err(fail("not a DDS surface file"));
    }

    let header_size = cursor.read_u32::<LittleEndian>()?;
    if header_size != DDS_HEADER_SIZE {
        return Err(fail("invalid surface byte stream"));
    }

    let _flags = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_u32::<LittleEndian>()?;
    let width = cursor.read_u32::<LittleEndian>()?;
    let _pitch_or_linear_size = cursor.read_u32::<LittleEndian>()?;
    let _depth = cursor.read_u32::<LittleEndian>()?;
    let mipmap_count = cursor.read_u32::<LittleEndian>()?.max(1);

    let mut reserved1 = [0u8; 11 * 4];
    cursor.read_exact(&mut reserved1)?;

    let _pf_size = cursor.read_u32::<LittleEndian>()?;
    let pf_flags = cursor.read_u32::<LittleEndian>()?;
    let pf_four_cc = cursor.read_u32::<LittleEndian>()?;
    let mut pf_rest = [0u8; 5 * 4];
    cursor.read_exact(&mut pf_rest)?;

    if pf_flags & DDPF_FOURCC == 0 || pf_four_cc != DDS_PIXELFORMAT_FOURCC_DX10 {
        return Err(fail("legacy fourcc-only surface (DX10 header required)"));
    }

    let _caps = cursor.read_u32::<LittleEndian>()?;
    let caps2 = cursor.read_u32::<LittleEndian>()?;
    let _caps3 = cursor.read_u32::<LittleEndian>()?;
    let _caps4 = cursor.read_u32::<LittleEndian>()?;
    let _reserved2 = cursor.read_u32::<LittleEndian>()?;

    let dxgi_format_raw = cursor.read_u32::<LittleEndian>()?;
    let _resource_dimension = cursor.read_u32::<LittleEndian>()?;
    let misc_flag = cursor.read_u32::<LittleEndian>()?;
    let _array_size = cursor.read_u32::<LittleEndian>()?;
    let _misc_flags2 = cursor.read_u32::<LittleEndian>()?;

    let format = DxgiFormat::try_from(dxgi_format_raw as u8)
        .map_err(|_| fail("unsupported surface subformat"))?;

    let is_cube = (caps2 & DDSCAPS2_CUBEMAP != 0) || (misc_flag & D3D10_MISC_TEXTURECUBE != 0);

    Ok(DdsInfo {
        format,
        width,
        height,
        mipmap_count,
        is_cube,
    })
}

/// Writes a minimal, valid DX10-extended DDS container around `pixels`,
/// the inverse of [`parse_dds_header`]'s precondition.
pub fn write_dds_header<W: Write>(
    writer: &mut W,
    format: DxgiFormat,
    width: u32,
    height: u32,
    mipmap_count: u32,
    is_cube: bool,
) -> Result<()> {
    const DDSD_CAPS: u32 = 0x1;
    const DDSD_HEIGHT: u32 = 0x2;
    const DDSD_WIDTH: u32 = 0x4;
    const DDSD_PIXELFORMAT: u32 = 0x1000;
    const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
    const DDSD_LINEARSIZE: u32 = 0x8_0000;
    const DDSCAPS_TEXTURE: u32 = 0x1000;
    const DDSCAPS_MIPMAP: u32 = 0x40_0000;
    const DDSCAPS_COMPLEX: u32 = 0x8;

    writer.write_u32::<LittleEndian>(DDS_MAGIC)?;
    writer.write_u32::<LittleEndian>(DDS_HEADER_SIZE)?;
    writer.write_u32::<LittleEndian>(DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_MIPMAPCOUNT | DDSD_LINEARSIZE)?;
    writer.write_u32::<LittleEndian>(height)?;
    writer.write_u32::<LittleEndian>(width)?;

    let info = SurfaceInfo::for_format(format);
    let linear_size = info.slice_pitch(width, height);
    writer.write_u32::<LittleEndian>(linear_size)?;
    writer.write_u32::<LittleEndian>(0)?; // depth
    writer.write_u32::<LittleEndian>(mipmap_count)?;
    writer.write_all(&[0u8; 11 * 4])?; // reserved1

    writer.write_u32::<LittleEndian>(32)?; // pixelformat.size
    writer.write_u32::<LittleEndian>(DDPF_FOURCC)?;
    writer.write_u32::<LittleEndian>(DDS_PIXELFORMAT_FOURCC_DX10)?;
    writer.write_all(&[0u8; 5 * 4])?;

    let caps = DDSCAPS_TEXTURE | if mipmap_count > 1 { DDSCAPS_MIPMAP | DDSCAPS_COMPLEX } else { 0 };
    writer.write_u32::<LittleEndian>(caps)?;
    writer.write_u32::<LittleEndian>(if is_cube { DDSCAPS2_CUBEMAP } else { 0 })?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(0)?;

    writer.write_u32::<LittleEndian>(u8::from(format) as u32)?;
    writer.write_u32::<LittleEndian>(D3D10_RESOURCE_DIMENSION_TEXTURE2D)?;
    writer.write_u32::<LittleEndian>(if is_cube { D3D10_MISC_TEXTURECUBE } else { 0 })?;
    writer.write_u32::<LittleEndian>(if is_cube { 6 } else { 1 })?;
    writer.write_u32::<LittleEndian>(0)?;

    Ok(())
}

/// Classification of the per-format row/plane layout rules spec §4.8
/// describes in prose.
#[derive(Debug, Clone, Copy)]
enum SurfaceFamily {
    BlockCompressed { block_bytes: u32 },
    Packed { bytes_per_pixel: u32 },
    Planar,
    Generic { bits_per_pixel: u32 },
}

pub struct SurfaceInfo {
    family: SurfaceFamily,
}

impl SurfaceInfo {
    pub fn for_format(format: DxgiFormat) -> Self {
        use DxgiFormat::*;

        let family = match format {
            Bc1Unorm | Bc1UnormSrgb | Bc4Unorm | Bc4Snorm => SurfaceFamily::BlockCompressed { block_bytes: 8 },
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc5Unorm | Bc5Snorm | Bc6hUf16 | Bc6hSf16
            | Bc7Unorm | Bc7UnormSrgb => SurfaceFamily::BlockCompressed { block_bytes: 16 },
            R8G8B8G8UnormPacked => SurfaceFamily::Packed { bytes_per_pixel: 4 },
            Nv12Planar => SurfaceFamily::Planar,
            R32G32B32A32Float => SurfaceFamily::Generic { bits_per_pixel: 128 },
            R16G16B16A16Float => SurfaceFamily::Generic { bits_per_pixel: 64 },
            R8G8B8A8Unorm | R8G8B8A8UnormSrgb => SurfaceFamily::Generic { bits_per_pixel: 32 },
            R8G8Unorm => SurfaceFamily::Generic { bits_per_pixel: 16 },
            R8Unorm => SurfaceFamily::Generic { bits_per_pixel: 8 },
        };

        Self { family }
    }

    /// `(row_pitch, row_count)` pairs, one per plane (block-compressed,
    /// packed, and generic formats have exactly one; planar formats have
    /// two — luma then chroma).
    fn planes(&self, width: u32, height: u32) -> Vec<(u32, u32)> {
        match self.family {
            SurfaceFamily::BlockCompressed { block_bytes } => {
                let blocks_wide = (width + 3) / 4;
                let blocks_high = (height + 3) / 4;
                vec![(blocks_wide * block_bytes, blocks_high)]
            }
            SurfaceFamily::Packed { bytes_per_pixel } => {
                vec![(((width + 1) >> 1) * bytes_per_pixel, height)]
            }
            SurfaceFamily::Planar => {
                let luma_row = width;
                let chroma_height = (height + 1) / 2;
                vec![(luma_row, height), (luma_row, chroma_height)]
            }
            SurfaceFamily::Generic { bits_per_pixel } => {
                vec![((width * bits_per_pixel + 7) / 8, height)]
            }
        }
    }

    pub fn slice_pitch(&self, width: u32, height: u32) -> u32 {
        self.planes(width, height).into_iter().map(|(pitch, rows)| pitch * rows).sum()
    }
}

fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    (value + alignment - 1) / alignment * alignment
}

fn mip_extent(full: u32, level: u32) -> u32 {
    (full >> level).max(1)
}

/// One packed-row copy, direction-agnostic: reads `row_pitch` bytes from
/// `src` starting at `src_offset` and writes them to `dst` at `dst_offset`,
/// zero-filling any padding already present in `dst`'s backing buffer.
fn copy_row(src: &[u8], src_offset: usize, dst: &mut [u8], dst_offset: usize, row_pitch: usize) -> Result<()> {
    let src_slice = src
        .get(src_offset..src_offset + row_pitch)
        .ok_or(Error::CorruptTable("surface repack read past end of source"))?;
    let dst_slice = dst
        .get_mut(dst_offset..dst_offset + row_pitch)
        .ok_or(Error::CorruptTable("surface repack wrote past end of destination"))?;
    dst_slice.copy_from_slice(src_slice);
    Ok(())
}

/// Computes the total aligned size a face×mip grid occupies in the
/// archive's aligned layout, and (for `ConvertToArchive`) walks `source`
/// (tightly packed, face-major then mip-minor, per spec §4.8) into that
/// layout. Shared by both directions: `tightly_packed_is_source` selects
/// which side owns the natural (unaligned) pitch.
fn repack(
    format: DxgiFormat,
    width: u32,
    height: u32,
    mipmap_count: u32,
    face_count: u32,
    pitch_alignment: u32,
    image_alignment: u32,
    tight: &[u8],
    tight_is_source: bool,
) -> Result<Vec<u8>> {
    let info = SurfaceInfo::for_format(format);

    // First pass: compute the aligned total size.
    let mut aligned_len = 0u32;
    for _face in 0..face_count {
        for level in 0..mipmap_count {
            let w = mip_extent(width, level);
            let h = mip_extent(height, level);
            aligned_len = align_up(aligned_len, image_alignment);
            for (natural_pitch, rows) in info.planes(w, h) {
                let aligned_pitch = align_up(natural_pitch, pitch_alignment);
                aligned_len += aligned_pitch * rows;
            }
        }
    }

    let (aligned, tight_out_len) = if tight_is_source {
        (vec![0u8; aligned_len as usize], 0usize)
    } else {
        let mut total = 0usize;
        for _face in 0..face_count {
            for level in 0..mipmap_count {
                let w = mip_extent(width, level);
                let h = mip_extent(height, level);
                for (natural_pitch, rows) in info.planes(w, h) {
                    total += (natural_pitch * rows) as usize;
                }
            }
        }
        (vec![0u8; aligned_len as usize], total)
    };

    let mut aligned = aligned;
    let mut tight_out = vec![0u8; tight_out_len];

    let mut aligned_cursor = 0usize;
    let mut tight_cursor = 0usize;

    for _face in 0..face_count {
        for level in 0..mipmap_count {
            let w = mip_extent(width, level);
            let h = mip_extent(height, level);

            aligned_cursor = align_up(aligned_cursor as u32, image_alignment) as usize;

            for (natural_pitch, rows) in info.planes(w, h) {
                let aligned_pitch = align_up(natural_pitch, pitch_alignment) as usize;
                let natural_pitch = natural_pitch as usize;

                for _row in 0..rows {
                    if tight_is_source {
                        copy_row(tight, tight_cursor, &mut aligned, aligned_cursor, natural_pitch)?;
                    } else {
                        copy_row(&aligned, aligned_cursor, &mut tight_out, tight_cursor, natural_pitch)?;
                    }

                    aligned_cursor += aligned_pitch;
                    tight_cursor += natural_pitch;
                }
            }
        }
    }

    if tight_is_source {
        Ok(aligned)
    } else {
        Ok(tight_out)
    }
}

/// Packs a tightly-packed external surface into the archive's aligned
/// layout (spec §4.8 `ConvertToArchive`).
pub fn convert_to_archive(
    format: DxgiFormat,
    width: u32,
    height: u32,
    mipmap_count: u32,
    face_count: u32,
    pitch_alignment: u32,
    image_alignment: u32,
    surface_pixels: &[u8],
) -> Result<Vec<u8>> {
    repack(format, width, height, mipmap_count, face_count, pitch_alignment, image_alignment, surface_pixels, true)
}

/// Unpacks archive-aligned bytes back into a tightly-packed surface
/// (spec §4.8 `ConvertFromArchive`).
pub fn convert_from_archive(
    format: DxgiFormat,
    width: u32,
    height: u32,
    mipmap_count: u32,
    face_count: u32,
    pitch_alignment: u32,
    image_alignment: u32,
    archive_bytes: &[u8],
) -> Result<Vec<u8>> {
    repack(format, width, height, mipmap_count, face_count, pitch_alignment, image_alignment, archive_bytes, false)
}
