//! Fixed-width big-endian codecs for the container wire format.
//!
//! Every integer in the format goes through these helpers so the byte order
//! is decided in exactly one place.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

pub fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<()> {
    w.write_u8(value)?;
    Ok(())
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(r.read_u8()?)
}

pub fn write_u16<W: Write>(w: &mut W, value: u16) -> Result<()> {
    w.write_u16::<BigEndian>(value)?;
    Ok(())
}

pub fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    Ok(r.read_u16::<BigEndian>()?)
}

pub fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_u32::<BigEndian>(value)?;
    Ok(())
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    Ok(r.read_u32::<BigEndian>()?)
}

pub fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<()> {
    w.write_u64::<BigEndian>(value)?;
    Ok(())
}

pub fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    Ok(r.read_u64::<BigEndian>()?)
}

pub fn write_exact<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    w.write_all(bytes)?;
    Ok(())
}

pub fn read_exact<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes a u16 length prefix followed by the UTF-8 bytes.
pub fn write_string<W: Write>(w: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let len = u16::try_from(bytes.len())
        .map_err(|_| Error::Malformed(format!("string of {} bytes exceeds the wire limit", bytes.len())))?;
    write_u16(w, len)?;
    write_exact(w, bytes)
}

/// Reads a u16-length-prefixed UTF-8 string, capped at `max_len` bytes.
pub fn read_string<R: Read>(r: &mut R, max_len: usize) -> Result<String> {
    let len = read_u16(r)? as usize;
    if len > max_len {
        return Err(Error::Malformed(format!("string length {len} exceeds cap {max_len}")));
    }
    let bytes = read_exact(r, len)?;
    String::from_utf8(bytes).map_err(|_| Error::Malformed("string is not valid UTF-8".into()))
}
