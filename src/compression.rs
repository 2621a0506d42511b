//! Opaque compression filter for payload chunks.
//!
//! The container treats compression as a black box: bytes in, bytes out.
//! Zstd does the actual work; nothing here inspects the stream.

use anyhow::Context;

use crate::config::COMPRESSION_LEVEL;
use crate::error::{Error, Result};

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, COMPRESSION_LEVEL)
        .context("compression filter failed")
        .map_err(|e| Error::Malformed(e.to_string()))
}

pub fn decompress(data: &[u8], capacity: usize) -> Result<Vec<u8>> {
    zstd::bulk::decompress(data, capacity)
        .context("decompression filter failed")
        .map_err(|e| Error::Malformed(e.to_string()))
}
