//! Block ciphers and chaining modes.
//!
//! [`BlockCipher`] dispatches one 16-byte block transform over the
//! supported families; [`CipherTransform`] wraps it in a chaining mode and
//! plugs into the generic stream adapters. `forward` is the encrypt
//! direction, `inverse` the decrypt direction; one instance only ever runs
//! in one of them.

use aes::{Aes128, Aes192, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use rand::RngExt;
use twofish::Twofish;

use crate::config::CIPHER_BLOCK;
use crate::crypto::suite::{CipherKind, ModeKind};
use crate::error::{Error, Result};
use crate::stream::BlockTransform;

#[derive(Debug)]
pub enum BlockCipher {
    Aes128(Box<Aes128>),
    Aes192(Box<Aes192>),
    Aes256(Box<Aes256>),
    Twofish256(Box<Twofish>),
}

impl BlockCipher {
    pub fn new(kind: CipherKind, key: &[u8]) -> Result<Self> {
        if key.len() != kind.key_len() {
            return Err(Error::InvalidKey(format!(
                "{kind} expects a {}-byte key, got {}",
                kind.key_len(),
                key.len()
            )));
        }
        let rejected = |_| Error::InvalidKey(format!("{kind} rejected the derived key"));
        Ok(match kind {
            CipherKind::Aes128 => Self::Aes128(Box::new(Aes128::new_from_slice(key).map_err(rejected)?)),
            CipherKind::Aes192 => Self::Aes192(Box::new(Aes192::new_from_slice(key).map_err(rejected)?)),
            CipherKind::Aes256 => Self::Aes256(Box::new(Aes256::new_from_slice(key).map_err(rejected)?)),
            CipherKind::Twofish256 => Self::Twofish256(Box::new(Twofish::new_from_slice(key).map_err(rejected)?)),
        })
    }

    fn encrypt_block(&self, block: &mut [u8; CIPHER_BLOCK]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
            Self::Twofish256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; CIPHER_BLOCK]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
            Self::Twofish256(c) => c.decrypt_block(block),
        }
    }
}

/// One chaining-mode stream over a block cipher, seeded with an IV.
pub struct CipherTransform {
    cipher: BlockCipher,
    mode: ModeKind,
    state: [u8; CIPHER_BLOCK],
}

impl CipherTransform {
    pub fn new(cipher: BlockCipher, mode: ModeKind, iv: [u8; CIPHER_BLOCK]) -> Self {
        Self { cipher, mode, state: iv }
    }

    fn keystream_block(&mut self) -> [u8; CIPHER_BLOCK] {
        let mut k = self.state;
        self.cipher.encrypt_block(&mut k);
        k
    }

    fn bump_counter(&mut self) {
        for b in self.state.iter_mut().rev() {
            let (next, carry) = b.overflowing_add(1);
            *b = next;
            if !carry {
                break;
            }
        }
    }
}

impl BlockTransform for CipherTransform {
    fn data_len(&self) -> usize {
        CIPHER_BLOCK
    }

    fn raw_len(&self) -> usize {
        CIPHER_BLOCK
    }

    fn forward(&mut self, data: &[u8], raw: &mut Vec<u8>) -> Result<()> {
        let mut block = [0u8; CIPHER_BLOCK];
        block.copy_from_slice(data);
        match self.mode {
            ModeKind::Cbc => {
                for (b, s) in block.iter_mut().zip(&self.state) {
                    *b ^= s;
                }
                self.cipher.encrypt_block(&mut block);
                self.state = block;
            }
            ModeKind::Cfb => {
                let k = self.keystream_block();
                for (b, k) in block.iter_mut().zip(&k) {
                    *b ^= k;
                }
                self.state = block;
            }
            ModeKind::Ctr => {
                let k = self.keystream_block();
                for (b, k) in block.iter_mut().zip(&k) {
                    *b ^= k;
                }
                self.bump_counter();
            }
        }
        raw.extend_from_slice(&block);
        Ok(())
    }

    fn inverse(&mut self, raw: &[u8], data: &mut Vec<u8>) -> Result<()> {
        let mut block = [0u8; CIPHER_BLOCK];
        block.copy_from_slice(raw);
        match self.mode {
            ModeKind::Cbc => {
                let ciphertext = block;
                self.cipher.decrypt_block(&mut block);
                for (b, s) in block.iter_mut().zip(&self.state) {
                    *b ^= s;
                }
                self.state = ciphertext;
            }
            ModeKind::Cfb => {
                let k = self.keystream_block();
                let ciphertext = block;
                for (b, k) in block.iter_mut().zip(&k) {
                    *b ^= k;
                }
                self.state = ciphertext;
            }
            ModeKind::Ctr => {
                let k = self.keystream_block();
                for (b, k) in block.iter_mut().zip(&k) {
                    *b ^= k;
                }
                self.bump_counter();
            }
        }
        data.extend_from_slice(&block);
        Ok(())
    }

    /// Final partial blocks are filled with random bytes, not zeros, so the
    /// true payload length is not visible from the last block.
    fn fill(&mut self, partial: &mut Vec<u8>) {
        let missing = CIPHER_BLOCK - partial.len();
        let mut pad = vec![0u8; missing];
        rand::rng().fill(&mut pad[..]);
        partial.extend_from_slice(&pad);
    }
}
