//! Iterated HMAC key derivation.
//!
//! Stretches the hashed key source into cipher and MAC keys. Each output
//! block is the XOR-fold of an HMAC iteration chain seeded with
//! `salt || label || block-counter`; the label gives cipher and MAC keys
//! independent derivations from the same secret.

use rand::RngExt;

use crate::config::MAX_KDF_ITERATIONS;
use crate::crypto::mac::MacEngine;
use crate::crypto::suite::HashKind;
use crate::error::{Error, Result};

pub fn derive(
    key_source: &[u8],
    salt: &[u8],
    label: &[u8],
    iterations: u32,
    out_len: usize,
    hash: HashKind,
) -> Result<Vec<u8>> {
    if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
        return Err(Error::KdfLimit);
    }
    let hash_len = hash.output_len();
    let blocks = out_len.div_ceil(hash_len);
    if blocks > u8::MAX as usize {
        return Err(Error::KdfLimit);
    }

    let mut out = Vec::with_capacity(blocks * hash_len);
    for counter in 1..=blocks as u32 {
        let mut mac = MacEngine::new(hash, key_source)?;
        mac.update(salt);
        mac.update(label);
        mac.update(&counter.to_be_bytes());
        let mut round = mac.finalize();
        let mut acc = round.clone();

        for _ in 1..iterations {
            let mut mac = MacEngine::new(hash, key_source)?;
            mac.update(&round);
            round = mac.finalize();
            for (a, r) in acc.iter_mut().zip(&round) {
                *a ^= r;
            }
        }
        out.extend_from_slice(&acc);
    }
    out.truncate(out_len);
    Ok(out)
}

/// Fresh random salt sized to the cipher key length.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::rng().fill(&mut salt[..]);
    salt
}
