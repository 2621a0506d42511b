//! Length-prefixed payload chunking.
//!
//! A chunked payload is a run of `u32 length + body` records closed by a
//! zero length. Bodies hold up to the negotiated chunk size of logical
//! bytes and go through the opaque compression filter when the container
//! says so. The frame exists so a compressed payload stays self-delimiting
//! inside the cipher stream.

use std::io::{self, Read, Write};

use crate::compression;
use crate::error::{Error, Result};
use crate::wire;

pub struct ChunkWriter<W: Write> {
    inner: W,
    chunk_size: usize,
    compress: bool,
    pending: Vec<u8>,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W, chunk_size: usize, compress: bool) -> Self {
        Self { inner, chunk_size, compress, pending: Vec::with_capacity(chunk_size) }
    }

    fn emit(&mut self) -> Result<()> {
        let body = if self.compress {
            compression::compress(&self.pending)?
        } else {
            std::mem::take(&mut self.pending)
        };
        wire::write_u32(&mut self.inner, body.len() as u32)?;
        wire::write_exact(&mut self.inner, &body)?;
        self.pending.clear();
        Ok(())
    }

    /// Flushes the trailing partial chunk, writes the terminator record,
    /// and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        if !self.pending.is_empty() {
            self.emit()?;
        }
        wire::write_u32(&mut self.inner, 0)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut consumed = 0;
        while consumed < buf.len() {
            let room = self.chunk_size - self.pending.len();
            let take = room.min(buf.len() - consumed);
            self.pending.extend_from_slice(&buf[consumed..consumed + take]);
            consumed += take;
            if self.pending.len() == self.chunk_size {
                self.emit().map_err(Error::into_io)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct ChunkReader<R: Read> {
    inner: R,
    chunk_size: usize,
    compress: bool,
    data: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, chunk_size: usize, compress: bool) -> Self {
        Self { inner, chunk_size, compress, data: Vec::new(), pos: 0, done: false }
    }

    fn fill_chunk(&mut self) -> Result<bool> {
        let len = wire::read_u32(&mut self.inner)? as usize;
        if len == 0 {
            self.done = true;
            return Ok(false);
        }
        // A compressed body can exceed the chunk size slightly, never double it.
        if len > self.chunk_size * 2 {
            return Err(Error::Malformed(format!("chunk of {len} bytes exceeds the negotiated size")));
        }
        let body = wire::read_exact(&mut self.inner, len)?;
        self.data = if self.compress {
            compression::decompress(&body, self.chunk_size)?
        } else {
            body
        };
        if self.data.len() > self.chunk_size {
            return Err(Error::Malformed("chunk inflated past the negotiated size".into()));
        }
        self.pos = 0;
        Ok(true)
    }

    /// Verifies the payload ended exactly on the terminator record and
    /// hands back the source.
    pub fn finish(mut self) -> Result<R> {
        if self.pos != self.data.len() {
            return Err(Error::Malformed("payload shorter than the chunked stream".into()));
        }
        if !self.done {
            let len = wire::read_u32(&mut self.inner)?;
            if len != 0 {
                return Err(Error::Malformed("payload longer than declared".into()));
            }
        }
        Ok(self.inner)
    }
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.pos == self.data.len() {
                if self.done || !self.fill_chunk().map_err(Error::into_io)? {
                    break;
                }
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

    fn round_trip(data: &[u8], chunk_size: usize, compress: bool) -> Vec<u8> {
        let mut writer = ChunkWriter::new(Vec::new(), chunk_size, compress);
        writer.write_all(data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = ChunkReader::new(Cursor::new(encoded), chunk_size, compress);
        let mut out = vec![0u8; data.len()];
        reader.read_exact(&mut out).unwrap();
        reader.finish().unwrap();
        out
    }

    #[test]
    fn test_round_trip_plain() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(round_trip(&data, 64, false), data);
    }

    #[test]
    fn test_round_trip_compressed() {
        let data = vec![42u8; 10_000];
        assert_eq!(round_trip(&data, 256, true), data);
    }

    #[test]
    fn test_terminator_required() {
        let mut writer = ChunkWriter::new(Vec::new(), 16, false);
        writer.write_all(b"abc").unwrap();
        let mut encoded = writer.finish().unwrap();
        encoded.truncate(encoded.len() - 4); // drop the terminator

        let mut reader = ChunkReader::new(Cursor::new(encoded), 16, false);
        let mut out = [0u8; 3];
        reader.read_exact(&mut out).unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let mut encoded = Vec::new();
        wire::write_u32(&mut encoded, 1 << 20).unwrap();
        encoded.extend_from_slice(&[0u8; 64]);

        let mut reader = ChunkReader::new(Cursor::new(encoded), 16, false);
        let mut out = [0u8; 1];
        assert!(reader.read_exact(&mut out).is_err());
    }
}
