//! Verification nonce and random structural padding.

use std::io::{Read, Write};

use rand::RngExt;

use crate::crypto::Digests;
use crate::error::{Error, Result};
use crate::wire;

/// The fail-fast key check: `{x, y, x⊕y}` written inside the cipher
/// stream. A wrong key decrypts it to values that almost surely break the
/// relation, which aborts the run before any payload byte is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    pub x: u64,
    pub y: u64,
}

impl Nonce {
    pub fn generate() -> Self {
        let mut x = [0u8; 8];
        let mut y = [0u8; 8];
        rand::rng().fill(&mut x[..]);
        rand::rng().fill(&mut y[..]);
        Self { x: u64::from_be_bytes(x), y: u64::from_be_bytes(y) }
    }

    pub const fn z(&self) -> u64 {
        self.x ^ self.y
    }
}

pub fn write_nonce<W: Write>(w: &mut W, nonce: &Nonce) -> Result<()> {
    wire::write_u64(w, nonce.x)?;
    wire::write_u64(w, nonce.y)?;
    wire::write_u64(w, nonce.z())
}

pub fn read_nonce<R: Read>(r: &mut R) -> Result<Nonce> {
    let x = wire::read_u64(r)?;
    let y = wire::read_u64(r)?;
    let z = wire::read_u64(r)?;
    let nonce = Nonce { x, y };
    if z != nonce.z() {
        return Err(Error::Integrity);
    }
    Ok(nonce)
}

/// Writes one random padding run: a length byte from the CRNG followed by
/// that many random bytes. Padding emitted past the payload start is fed
/// to the running digests like real content.
pub fn write_padding<W: Write>(w: &mut W, digests: Option<&mut Digests>) -> Result<()> {
    let mut len = [0u8; 1];
    rand::rng().fill(&mut len[..]);
    let mut pad = vec![0u8; len[0] as usize];
    rand::rng().fill(&mut pad[..]);

    wire::write_u8(w, len[0])?;
    wire::write_exact(w, &pad)?;
    if let Some(digests) = digests {
        digests.update(&pad);
    }
    Ok(())
}

/// Consumes one padding run written by [`write_padding`].
pub fn read_padding<R: Read>(r: &mut R, digests: Option<&mut Digests>) -> Result<()> {
    let len = wire::read_u8(r)?;
    let pad = wire::read_exact(r, len as usize)?;
    if let Some(digests) = digests {
        digests.update(&pad);
    }
    Ok(())
}
