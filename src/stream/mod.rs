//! Generic block-buffering stream adapters.
//!
//! One reader/writer pair serves every fixed-block layer in the pipeline:
//! the cipher (16 -> 16 bytes) and the FEC codec (249 -> 255 bytes). A
//! layer plugs in as a [`BlockTransform`]; the adapters own the buffering,
//! the final-block fill, and the strictly forward read/write contract.

use std::io::{self, Read, Write};

use crate::config::COPY_BUF;
use crate::error::{Error, Result};
use crate::progress::Monitor;

pub mod chunk;

/// Copies until EOF in bursts, checking for cancellation and publishing
/// byte progress before each one. Returns the number of bytes copied.
pub fn copy_all<R: Read, W: Write>(r: &mut R, w: &mut W, monitor: &Monitor) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUF];
    let mut copied = 0u64;
    loop {
        monitor.checkpoint()?;
        let n = r.read(&mut buf)?;
        if n == 0 {
            return Ok(copied);
        }
        w.write_all(&buf[..n])?;
        copied += n as u64;
        monitor.add_bytes(n as u64);
    }
}

/// Copies exactly `len` bytes; a premature end of input is an error.
pub fn copy_exact<R: Read, W: Write>(r: &mut R, w: &mut W, len: u64, monitor: &Monitor) -> Result<()> {
    let mut buf = vec![0u8; COPY_BUF];
    let mut remaining = len;
    while remaining > 0 {
        monitor.checkpoint()?;
        let want = (remaining as usize).min(buf.len());
        let n = r.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended mid-payload")));
        }
        w.write_all(&buf[..n])?;
        remaining -= n as u64;
        monitor.add_bytes(n as u64);
    }
    Ok(())
}

/// A fixed-geometry transform between logical data blocks and raw blocks.
///
/// `forward` is the write direction (data -> raw), `inverse` the read
/// direction (raw -> data). `fill` pads a trailing partial data block up to
/// `data_len` before the last `forward` call.
pub trait BlockTransform {
    /// Logical block size accumulated before each `forward` call.
    fn data_len(&self) -> usize;

    /// Raw block size produced by `forward` and consumed by `inverse`.
    fn raw_len(&self) -> usize;

    fn forward(&mut self, data: &[u8], raw: &mut Vec<u8>) -> Result<()>;

    fn inverse(&mut self, raw: &[u8], data: &mut Vec<u8>) -> Result<()>;

    fn fill(&mut self, partial: &mut Vec<u8>);
}

/// Buffers arbitrary writes into fixed data blocks, transforms each full
/// block, and forwards the raw bytes to the sink.
pub struct BlockWriter<W: Write, T: BlockTransform> {
    inner: W,
    transform: T,
    pending: Vec<u8>,
    raw: Vec<u8>,
}

impl<W: Write, T: BlockTransform> BlockWriter<W, T> {
    pub fn new(inner: W, transform: T) -> Self {
        let data_len = transform.data_len();
        let raw_len = transform.raw_len();
        Self { inner, transform, pending: Vec::with_capacity(data_len), raw: Vec::with_capacity(raw_len) }
    }

    fn emit(&mut self) -> io::Result<()> {
        self.raw.clear();
        self.transform.forward(&self.pending, &mut self.raw).map_err(Error::into_io)?;
        self.inner.write_all(&self.raw)?;
        self.pending.clear();
        Ok(())
    }

    /// Pads and flushes the trailing partial block, then hands back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            self.transform.fill(&mut self.pending);
            debug_assert_eq!(self.pending.len(), self.transform.data_len());
            self.emit()?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write, T: BlockTransform> Write for BlockWriter<W, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data_len = self.transform.data_len();
        let mut consumed = 0;
        while consumed < buf.len() {
            let room = data_len - self.pending.len();
            let take = room.min(buf.len() - consumed);
            self.pending.extend_from_slice(&buf[consumed..consumed + take]);
            consumed += take;
            if self.pending.len() == data_len {
                self.emit()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial blocks stay buffered until finish(); only the sink flushes.
        self.inner.flush()
    }
}

/// Reads raw blocks on demand, inverts each, and serves logical bytes.
pub struct BlockReader<R: Read, T: BlockTransform> {
    inner: R,
    transform: T,
    raw: Vec<u8>,
    data: Vec<u8>,
    pos: usize,
}

impl<R: Read, T: BlockTransform> BlockReader<R, T> {
    pub fn new(inner: R, transform: T) -> Self {
        let raw_len = transform.raw_len();
        let data_len = transform.data_len();
        Self { inner, transform, raw: vec![0u8; raw_len], data: Vec::with_capacity(data_len), pos: 0 }
    }

    /// Hands back the source. Bytes already decoded but not served are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Pulls and inverts the next raw block. `Ok(false)` means clean EOF.
    fn fill_block(&mut self) -> io::Result<bool> {
        let mut filled = 0;
        while filled < self.raw.len() {
            let n = self.inner.read(&mut self.raw[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated block"));
            }
            filled += n;
        }
        self.data.clear();
        self.transform.inverse(&self.raw, &mut self.data).map_err(Error::into_io)?;
        self.pos = 0;
        Ok(true)
    }
}

impl<R: Read, T: BlockTransform> Read for BlockReader<R, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        // Requests larger than one block loop instead of returning short.
        while written < buf.len() {
            if self.pos == self.data.len() && !self.fill_block()? {
                break;
            }
            let take = (buf.len() - written).min(self.data.len() - self.pos);
            buf[written..written + take].copy_from_slice(&self.data[self.pos..self.pos + take]);
            self.pos += take;
            written += take;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Adds a one-byte XOR mask and a marker byte; exercises unequal
    /// data/raw sizes without any cryptography.
    struct Shift;

    impl BlockTransform for Shift {
        fn data_len(&self) -> usize {
            4
        }

        fn raw_len(&self) -> usize {
            5
        }

        fn forward(&mut self, data: &[u8], raw: &mut Vec<u8>) -> Result<()> {
            raw.extend(data.iter().map(|b| b ^ 0x55));
            raw.push(0xEE);
            Ok(())
        }

        fn inverse(&mut self, raw: &[u8], data: &mut Vec<u8>) -> Result<()> {
            if raw[4] != 0xEE {
                return Err(Error::Malformed("bad marker".into()));
            }
            data.extend(raw[..4].iter().map(|b| b ^ 0x55));
            Ok(())
        }

        fn fill(&mut self, partial: &mut Vec<u8>) {
            partial.resize(self.data_len(), 0);
        }
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut writer = BlockWriter::new(Vec::new(), Shift);
        writer.write_all(b"hello world").unwrap();
        let encoded = writer.finish().unwrap();

        // 11 bytes -> 3 blocks of 5 raw bytes, last one zero-filled.
        assert_eq!(encoded.len(), 15);

        let mut reader = BlockReader::new(Cursor::new(encoded), Shift);
        let mut out = vec![0u8; 11];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"hello world");
    }

    #[test]
    fn test_exact_multiple_has_no_fill_block() {
        let mut writer = BlockWriter::new(Vec::new(), Shift);
        writer.write_all(b"12345678").unwrap();
        let encoded = writer.finish().unwrap();
        assert_eq!(encoded.len(), 10);
    }

    #[test]
    fn test_multi_block_read_loops() {
        let mut writer = BlockWriter::new(Vec::new(), Shift);
        writer.write_all(&[7u8; 64]).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = BlockReader::new(Cursor::new(encoded), Shift);
        let mut out = vec![0u8; 64];
        // One call spans 16 blocks.
        reader.read_exact(&mut out).unwrap();
        assert_eq!(out, [7u8; 64]);
    }

    #[test]
    fn test_truncated_block_errors() {
        let mut writer = BlockWriter::new(Vec::new(), Shift);
        writer.write_all(b"abcd").unwrap();
        let mut encoded = writer.finish().unwrap();
        encoded.pop();

        let mut reader = BlockReader::new(Cursor::new(encoded), Shift);
        let mut out = [0u8; 4];
        let err = reader.read_exact(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_transform_failure_surfaces() {
        let mut encoded = Vec::new();
        {
            let mut writer = BlockWriter::new(&mut encoded, Shift);
            writer.write_all(b"abcd").unwrap();
            writer.finish().unwrap();
        }
        encoded[4] = 0; // clobber the marker

        let mut reader = BlockReader::new(Cursor::new(encoded), Shift);
        let mut out = [0u8; 4];
        assert!(reader.read_exact(&mut out).is_err());
    }
}
