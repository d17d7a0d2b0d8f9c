//! HashFS archive reader/writer: a flat, hash-keyed container format with
//! two on-disk revisions (v1, v2) and a v2 texture-packing path that
//! fuses a descriptor + surface pair into one entry.
//!
//! Open an archive with [`reader::Reader`]; build one with
//! [`writer::WriterV1`] or [`writer::WriterV2`] (the revision is fixed by
//! type, never by a runtime flag).

mod bitfield;
mod compression;
mod directory;
mod entry;
mod entry_table;
mod error;
mod hash;
mod header;
mod metadata;
mod reader;
mod surface;
mod texture;
mod writer;

pub use bitfield::BitFlagField;
pub use compression::{CompressionLevel, GDeflate};
pub use entry::{Entry, EntryFlagsV1, EntryV1, EntryV2};
pub use entry_table::{v1 as entry_table_v1, v2 as entry_table_v2};
pub use error::{Error, Result};
pub use hash::hash_path;
pub use header::{HeaderV1, HeaderV2, Platform, Prelude, Version, HASH_METHOD_CITY, MAGIC, PAYLOAD_REGION_START};
pub use metadata::{ChunkType, MainMetadata, MetadataRecord, MetadataTable, MetadataTableBuilder};
pub use reader::{EntryKind, IndexedEntry, Reader};
pub use surface::{
    convert_from_archive, convert_to_archive, parse_dds_header, write_dds_header, DdsInfo, SurfaceInfo,
    DX10_PIXEL_DATA_OFFSET,
};
pub use texture::{AddressMode, DxgiFormat, MipFilter, TextureFilter, TextureMetadata};
pub use writer::{TextureSampling, WriterV1, WriterV2, DEFAULT_COMPRESSION_THRESHOLD, WRITER_IMAGE_ALIGNMENT, WRITER_PITCH_ALIGNMENT};
