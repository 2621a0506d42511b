//! Hash dispatch over the supported digest families.

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::crypto::suite::HashKind;

pub enum Hasher {
    Sha256(Box<Sha256>),
    Sha384(Box<Sha384>),
    Sha512(Box<Sha512>),
}

impl Hasher {
    pub fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Sha256 => Self::Sha256(Box::new(Sha256::new())),
            HashKind::Sha384 => Self::Sha384(Box::new(Sha384::new())),
            HashKind::Sha512 => Self::Sha512(Box::new(Sha512::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// One-shot digest.
pub fn digest(kind: HashKind, data: &[u8]) -> Vec<u8> {
    let mut h = Hasher::new(kind);
    h.update(data);
    h.finalize()
}
