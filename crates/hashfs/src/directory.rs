//! Directory-tree synthesis and listing codecs (spec §3, §4.7).
//!
//! Hash-keyed archives have no inherent notion of a directory; this
//! module builds one from the set of registered paths so the writer can
//! emit a listing blob per directory, and the reader can decode one back
//! into names.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ChildName {
    name: String,
    is_dir: bool,
}

/// Tracks every directory implied by the set of registered file paths,
/// including the root, and each directory's immediate children.
#[derive(Debug, Default)]
pub struct DirectoryTree {
    children: BTreeMap<String, Vec<ChildName>>,
}

impl DirectoryTree {
    pub fn new() -> Self {
        let mut children = BTreeMap::new();
        children.insert("/".to_string(), Vec::new());
        Self { children }
    }

    /// Registers a file path, ensuring a directory node exists for every
    /// `/`-separated prefix (spec §4.7).
    pub fn insert_file(&mut self, archive_path: &str) {
        let components: Vec<&str> = archive_path.trim_start_matches('/').split('/').collect();

        let mut parent = String::from("/");
        for (i, component) in components.iter().enumerate() {
            let is_last = i == components.len() - 1;

            self.children.entry(parent.clone()).or_default();

            let child = ChildName {
                name: component.to_string(),
                is_dir: !is_last,
            };
            let siblings = self.children.get_mut(&parent).expect("just ensured");
            if !siblings.contains(&child) {
                siblings.push(child);
            }

            if !is_last {
                parent = if parent == "/" {
                    format!("/{component}")
                } else {
                    format!("{parent}/{component}")
                };
                self.children.entry(parent.clone()).or_default();
            }
        }
    }

    /// Depth-first pre-order directory paths, root first (spec §4.7,
    /// §5's insertion-order ordering guarantee).
    pub fn directories_depth_first(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.visit("/", &mut out);
        out
    }

    fn visit(&self, path: &str, out: &mut Vec<String>) {
        out.push(path.to_string());

        if let Some(children) = self.children.get(path) {
            for child in children {
                if child.is_dir {
                    let child_path = if path == "/" {
                        format!("/{}", child.name)
                    } else {
                        format!("{path}/{}", child.name)
                    };
                    self.visit(&child_path, out);
                }
            }
        }
    }

    pub fn names_in(&self, path: &str) -> Option<&[ChildName]> {
        self.children.get(path).map(|v| v.as_slice())
    }
}

impl ChildName {
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("/{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Encodes a directory's listing as v1 text (spec §3): one name per line,
/// subdirectories prefixed with `/`.
pub fn encode_listing_v1(names: &[ChildName]) -> Vec<u8> {
    let mut text = String::new();
    for name in names {
        text.push_str(&name.display_name());
        text.push('\n');
    }
    text.into_bytes()
}

pub fn decode_listing_v1(bytes: &[u8]) -> Result<Vec<String>> {
    let text = String::from_utf8(bytes.to_vec())?;
    Ok(text.lines().map(|s| s.to_string()).collect())
}

/// Encodes a directory's listing as v2 binary (spec §3): `u32 count`,
/// then `count` single-byte length-prefixed UTF-8 names.
pub fn encode_listing_v2(names: &[ChildName]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(names.len() as u32)?;

    for name in names {
        let text = name.display_name();
        let bytes = text.as_bytes();
        if bytes.len() > u8::MAX as usize {
            return Err(Error::CorruptTable("directory entry name too long for v2 listing"));
        }
        out.write_u8(bytes.len() as u8)?;
        out.write_all(bytes)?;
    }

    Ok(out)
}

pub fn decode_listing_v2(bytes: &[u8]) -> Result<Vec<String>> {
    let mut cursor = bytes;
    let count = cursor.read_u32::<LittleEndian>()?;

    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = cursor.read_u8()? as usize;
        let mut buf = vec![0u8; len];
        cursor.read_exact(&mut buf)?;
        names.push(String::from_utf8(buf)?);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_intermediate_prefix() {
        let mut tree = DirectoryTree::new();
        tree.insert_file("/a/b/c.txt");

        let dirs = tree.directories_depth_first();
        assert_eq!(dirs, vec!["/".to_string(), "/a".to_string(), "/a/b".to_string()]);
    }

    #[test]
    fn root_listing_contains_top_level_entries() {
        let mut tree = DirectoryTree::new();
        tree.insert_file("/def/world/model.tests.sii");
        tree.insert_file("/readme.txt");

        let root_names = tree.names_in("/").unwrap();
        let displayed: Vec<String> = root_names.iter().map(|c| c.display_name()).collect();

        assert!(displayed.contains(&"/def".to_string()));
        assert!(displayed.contains(&"readme.txt".to_string()));
    }

    #[test]
    fn v1_listing_roundtrips() {
        let mut tree = DirectoryTree::new();
        tree.insert_file("/a/b.txt");
        tree.insert_file("/a/c/d.txt");

        let names = tree.names_in("/a").unwrap();
        let encoded = encode_listing_v1(names);
        let decoded = decode_listing_v1(&encoded).unwrap();

        assert_eq!(decoded, vec!["b.txt".to_string(), "/c".to_string()]);
    }

    #[test]
    fn v2_listing_roundtrips() {
        let mut tree = DirectoryTree::new();
        tree.insert_file("/a/b.txt");
        tree.insert_file("/a/c/d.txt");

        let names = tree.names_in("/a").unwrap();
        let encoded = encode_listing_v2(names).unwrap();
        let decoded = decode_listing_v2(&encoded).unwrap();

        assert_eq!(decoded, vec!["b.txt".to_string(), "/c".to_string()]);
    }
}
