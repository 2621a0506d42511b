//! Tagged stream metadata.
//!
//! A count byte followed by `{tag, length, value}` triples in a fixed
//! order. SIZE, COMPRESSED, and DIRECTORY are always present; BLOCKED and
//! FILENAME only when they apply. A tag this build does not know is fatal:
//! it means the container was written by a newer revision than the header
//! admitted.

use std::io::{Read, Write};

use crate::config::MAX_FILENAME_LEN;
use crate::error::{Error, Result};
use crate::wire;

const TAG_SIZE: u8 = 0x01;
const TAG_BLOCKED: u8 = 0x02;
const TAG_COMPRESSED: u8 = 0x03;
const TAG_DIRECTORY: u8 = 0x04;
const TAG_FILENAME: u8 = 0x05;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Logical payload size: bytes for a file, entry count for a tree.
    pub size: u64,
    pub compressed: bool,
    pub directory: bool,
    /// Chunk size of a length-chunked payload.
    pub blocked: Option<u64>,
    /// Original file name, carried for single-file containers.
    pub file_name: Option<String>,
}

impl Metadata {
    fn triples(&self) -> Vec<(u8, Vec<u8>)> {
        let mut triples = vec![(TAG_SIZE, self.size.to_be_bytes().to_vec())];
        if let Some(chunk) = self.blocked {
            triples.push((TAG_BLOCKED, chunk.to_be_bytes().to_vec()));
        }
        triples.push((TAG_COMPRESSED, vec![u8::from(self.compressed)]));
        triples.push((TAG_DIRECTORY, vec![u8::from(self.directory)]));
        if let Some(name) = &self.file_name {
            triples.push((TAG_FILENAME, name.as_bytes().to_vec()));
        }
        triples
    }
}

pub fn write_metadata<W: Write>(w: &mut W, metadata: &Metadata) -> Result<()> {
    if let Some(name) = &metadata.file_name
        && name.len() > MAX_FILENAME_LEN
    {
        return Err(Error::Malformed(format!("file name of {} bytes exceeds the limit", name.len())));
    }

    let triples = metadata.triples();
    wire::write_u8(w, triples.len() as u8)?;
    for (tag, value) in triples {
        wire::write_u8(w, tag)?;
        wire::write_u16(w, value.len() as u16)?;
        wire::write_exact(w, &value)?;
    }
    Ok(())
}

pub fn read_metadata<R: Read>(r: &mut R) -> Result<Metadata> {
    let count = wire::read_u8(r)?;
    let mut size = None;
    let mut compressed = None;
    let mut directory = None;
    let mut blocked = None;
    let mut file_name = None;

    for _ in 0..count {
        let tag = wire::read_u8(r)?;
        let len = wire::read_u16(r)? as usize;
        let value = wire::read_exact(r, len)?;
        match tag {
            TAG_SIZE => size = Some(parse_u64(&value)?),
            TAG_BLOCKED => blocked = Some(parse_u64(&value)?),
            TAG_COMPRESSED => compressed = Some(parse_bool(&value)?),
            TAG_DIRECTORY => directory = Some(parse_bool(&value)?),
            TAG_FILENAME => {
                if value.len() > MAX_FILENAME_LEN {
                    return Err(Error::Malformed("stored file name exceeds the limit".into()));
                }
                let name = String::from_utf8(value)
                    .map_err(|_| Error::Malformed("stored file name is not UTF-8".into()))?;
                file_name = Some(name);
            }
            other => return Err(Error::UnknownTag(other)),
        }
    }

    let missing = |what: &str| Error::Malformed(format!("metadata is missing the {what} tag"));
    Ok(Metadata {
        size: size.ok_or_else(|| missing("SIZE"))?,
        compressed: compressed.ok_or_else(|| missing("COMPRESSED"))?,
        directory: directory.ok_or_else(|| missing("DIRECTORY"))?,
        blocked,
        file_name,
    })
}

fn parse_u64(value: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| Error::Malformed("integer tag with a bad length".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn parse_bool(value: &[u8]) -> Result<bool> {
    match value {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(Error::Malformed("flag tag with a bad value".into())),
    }
}
