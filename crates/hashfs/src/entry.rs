//! In-archive entries (spec §3, §9).
//!
//! v1 and v2 entries carry different fields, so each gets its own struct;
//! a small capability trait gives read-side code (extraction, directory
//! listing) a uniform view without forcing a single field layout on both
//! versions — the "tagged union + shared accessor trait" shape spec §9
//! recommends.

use bitflags::bitflags;

use crate::texture::TextureMetadata;

/// Shared read-side accessors across `EntryV1` and `EntryV2`.
pub trait Entry {
    fn hash(&self) -> u64;
    fn offset(&self) -> u64;
    fn size(&self) -> u32;
    fn compressed_size(&self) -> u32;
    fn is_directory(&self) -> bool;
    fn is_compressed(&self) -> bool;
}

bitflags! {
    /// v1 entry flag word (spec §3, §9(b): unknown bits are preserved,
    /// never interpreted).
    pub struct EntryFlagsV1: u32 {
        const DIRECTORY = 0b0000_0001;
        const COMPRESSED = 0b0000_0010;
        const VERIFY = 0b0000_0100;
        const ENCRYPTED = 0b0000_1000;
    }
}

impl EntryFlagsV1 {
    pub fn with(mut self, flag: EntryFlagsV1, set: bool) -> Self {
        self.set(flag, set);
        self
    }
}

/// Spec §3 `EntryV1` — additionally carries `crc32` and a raw flag word.
#[derive(Debug, Clone)]
pub struct EntryV1 {
    pub hash: u64,
    pub offset: u64,
    pub flags: EntryFlagsV1,
    pub crc32: u32,
    pub size: u32,
    pub compressed_size: u32,
}

impl Entry for EntryV1 {
    fn hash(&self) -> u64 {
        self.hash
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    fn is_directory(&self) -> bool {
        self.flags.contains(EntryFlagsV1::DIRECTORY)
    }

    fn is_compressed(&self) -> bool {
        self.flags.contains(EntryFlagsV1::COMPRESSED)
    }
}

impl EntryV1 {
    /// Bit 2 of the flag word; spec §9(b): "preserve, do not interpret".
    pub fn verify_flag(&self) -> bool {
        self.flags.contains(EntryFlagsV1::VERIFY)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(EntryFlagsV1::ENCRYPTED)
    }
}

/// Spec §3 `EntryV2` — may additionally carry a `TextureMetadata`.
///
/// For texture entries, `size` equals `compressed_size`: the archive only
/// stores the repacked surface bytes and the logical size is meaningless
/// (spec §3, a faithfully replicated quirk of the source format).
#[derive(Debug, Clone)]
pub struct EntryV2 {
    pub hash: u64,
    pub offset: u64,
    pub size: u32,
    pub compressed_size: u32,
    pub is_directory: bool,
    pub is_compressed: bool,
    pub texture: Option<TextureMetadata>,
}

impl Entry for EntryV2 {
    fn hash(&self) -> u64 {
        self.hash
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }

    fn is_compressed(&self) -> bool {
        self.is_compressed
    }
}

impl EntryV2 {
    pub fn is_texture(&self) -> bool {
        self.texture.is_some()
    }
}
