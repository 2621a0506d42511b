//! Cryptographic engine: algorithm resolution, key derivation, block
//! ciphers with chaining modes, hashing, and MAC.

use std::io::{self, Read, Write};

use crate::crypto::hash::Hasher;
use crate::crypto::mac::MacEngine;
use crate::crypto::suite::HashKind;
use crate::error::Result;
use crate::secret::SecretBytes;

pub mod cipher;
pub mod engine;
pub mod hash;
pub mod kdf;
pub mod mac;
pub mod suite;

/// The running content digests: hash always, MAC when the version carries
/// one. Both are fed the same logical bytes.
pub struct Digests {
    pub hash: Hasher,
    pub mac: Option<MacEngine>,
}

impl Digests {
    pub fn new(kind: HashKind, mac_key: Option<&SecretBytes>) -> Result<Self> {
        let mac = match mac_key {
            Some(key) => Some(MacEngine::new(kind, key.expose())?),
            None => None,
        };
        Ok(Self { hash: Hasher::new(kind), mac })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hash.update(data);
        if let Some(mac) = &mut self.mac {
            mac.update(data);
        }
    }
}

/// Write passthrough that feeds every byte to the running digests.
pub struct TeeWriter<'a, W: Write> {
    inner: W,
    digests: &'a mut Digests,
}

impl<'a, W: Write> TeeWriter<'a, W> {
    pub fn new(inner: W, digests: &'a mut Digests) -> Self {
        Self { inner, digests }
    }
}

impl<W: Write> Write for TeeWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digests.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read passthrough that feeds every served byte to the running digests.
pub struct TeeReader<'a, R: Read> {
    inner: R,
    digests: &'a mut Digests,
}

impl<'a, R: Read> TeeReader<'a, R> {
    pub fn new(inner: R, digests: &'a mut Digests) -> Self {
        Self { inner, digests }
    }
}

impl<R: Read> Read for TeeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digests.update(&buf[..n]);
        Ok(n)
    }
}
