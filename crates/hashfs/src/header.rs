//! Archive header codec (spec §4.3).
//!
//! Shared prelude (`magic`, `version`, `salt`, `hashMethod`) then a
//! version-specific tail, mirroring how `rar-archiver`'s `GeneralHeader`
//! parses a common prefix before dispatching on `HeaderType`.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{Error, Result};

/// The four ASCII bytes `"SCS#"`, read as a little-endian `u32`.
pub const MAGIC: u32 = 0x2353_4353;

/// The only supported `hashMethod` value.
pub const HASH_METHOD_CITY: [u8; 4] = *b"CITY";

/// Payload region always starts here, in both versions.
pub const PAYLOAD_REGION_START: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Version {
    V1 = 1,
    V2 = 2,
}

/// PC is the only supported v2 platform (spec §4.3, §7 `UnsupportedFeature`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Platform {
    Pc = 0,
}

#[derive(Debug, Clone, Copy)]
pub struct Prelude {
    pub version: Version,
    pub salt: u16,
}

impl Prelude {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(Error::NotHashFs);
        }

        let version_raw = reader.read_u16::<LittleEndian>()?;
        let salt = reader.read_u16::<LittleEndian>()?;

        let mut hash_method = [0u8; 4];
        reader.read_exact(&mut hash_method)?;
        if hash_method != HASH_METHOD_CITY {
            return Err(Error::UnsupportedHashMethod(hash_method));
        }

        let version = Version::try_from(version_raw).map_err(|_| Error::UnsupportedVersion(version_raw))?;

        Ok(Self { version, salt })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(MAGIC)?;
        writer.write_u16::<LittleEndian>(self.version.into())?;
        writer.write_u16::<LittleEndian>(self.salt)?;
        writer.write_all(&HASH_METHOD_CITY)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderV1 {
    pub salt: u16,
    pub num_entries: u32,
    pub start_offset: u32,
}

impl HeaderV1 {
    pub fn read<R: Read>(reader: &mut R, prelude: Prelude) -> Result<Self> {
        let num_entries = reader.read_u32::<LittleEndian>()?;
        let start_offset = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            salt: prelude.salt,
            num_entries,
            start_offset,
        })
    }

    /// Writes the full header, including the shared prelude, then seeks
    /// back to the prior position — used for the writer's back-patch at
    /// the very end of `save` (spec §2, §4.3 "Writers emit the header
    /// last").
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let pos = writer.stream_position()?;
        writer.seek(SeekFrom::Start(0))?;

        Prelude {
            version: Version::V1,
            salt: self.salt,
        }
        .write(writer)?;

        writer.write_u32::<LittleEndian>(self.num_entries)?;
        writer.write_u32::<LittleEndian>(self.start_offset)?;

        writer.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderV2 {
    pub salt: u16,
    pub entry_table_length: u32,
    pub num_metadata_entries: u32,
    pub metadata_table_length: u32,
    pub entry_table_start: u64,
    pub metadata_table_start: u64,
    pub security_descriptor_offset: u64,
    pub platform: Platform,
}

impl HeaderV2 {
    pub fn read<R: Read>(reader: &mut R, prelude: Prelude) -> Result<Self> {
        let entry_table_length = reader.read_u32::<LittleEndian>()?;
        let num_metadata_entries = reader.read_u32::<LittleEndian>()?;
        let metadata_table_length = reader.read_u32::<LittleEndian>()?;
        let entry_table_start = reader.read_u64::<LittleEndian>()?;
        let metadata_table_start = reader.read_u64::<LittleEndian>()?;
        let security_descriptor_offset = reader.read_u64::<LittleEndian>()?;
        let platform_raw = reader.read_u16::<LittleEndian>()?;

        let platform = Platform::try_from(platform_raw)
            .map_err(|_| Error::UnsupportedFeature("non-PC platform"))?;

        Ok(Self {
            salt: prelude.salt,
            entry_table_length,
            num_metadata_entries,
            metadata_table_length,
            entry_table_start,
            metadata_table_start,
            security_descriptor_offset,
            platform,
        })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let pos = writer.stream_position()?;
        writer.seek(SeekFrom::Start(0))?;

        Prelude {
            version: Version::V2,
            salt: self.salt,
        }
        .write(writer)?;

        writer.write_u32::<LittleEndian>(self.entry_table_length)?;
        writer.write_u32::<LittleEndian>(self.num_metadata_entries)?;
        writer.write_u32::<LittleEndian>(self.metadata_table_length)?;
        writer.write_u64::<LittleEndian>(self.entry_table_start)?;
        writer.write_u64::<LittleEndian>(self.metadata_table_start)?;
        writer.write_u64::<LittleEndian>(self.security_descriptor_offset)?;
        writer.write_u16::<LittleEndian>(self.platform.into())?;

        writer.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 16];
        let mut cur = Cursor::new(bytes);
        assert!(matches!(Prelude::read(&mut cur), Err(Error::NotHashFs)));
    }

    #[test]
    fn rejects_unknown_hash_method() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(b"MD5!");

        let mut cur = Cursor::new(bytes);
        assert!(matches!(Prelude::read(&mut cur), Err(Error::UnsupportedHashMethod(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&9u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&HASH_METHOD_CITY);

        let mut cur = Cursor::new(bytes);
        assert!(matches!(Prelude::read(&mut cur), Err(Error::UnsupportedVersion(9))));
    }

    #[test]
    fn v1_header_roundtrips_through_backpatch() {
        let header = HeaderV1 {
            salt: 42,
            num_entries: 7,
            start_offset: 5000,
        };

        let mut buf = Cursor::new(vec![0u8; 16]);
        buf.seek(SeekFrom::Start(16)).unwrap();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.stream_position().unwrap(), 16);

        buf.seek(SeekFrom::Start(0)).unwrap();
        let prelude = Prelude::read(&mut buf).unwrap();
        let parsed = HeaderV1::read(&mut buf, prelude).unwrap();

        assert_eq!(parsed.salt, 42);
        assert_eq!(parsed.num_entries, 7);
        assert_eq!(parsed.start_offset, 5000);
    }
}
