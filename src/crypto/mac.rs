//! HMAC dispatch and constant-time digest comparison.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::crypto::suite::HashKind;
use crate::error::{Error, Result};

pub enum MacEngine {
    Sha256(Box<Hmac<Sha256>>),
    Sha384(Box<Hmac<Sha384>>),
    Sha512(Box<Hmac<Sha512>>),
}

impl MacEngine {
    pub fn new(hash: HashKind, key: &[u8]) -> Result<Self> {
        let rejected = |_| Error::InvalidKey("MAC rejected the derived key".into());
        Ok(match hash {
            HashKind::Sha256 => Self::Sha256(Box::new(Hmac::new_from_slice(key).map_err(rejected)?)),
            HashKind::Sha384 => Self::Sha384(Box::new(Hmac::new_from_slice(key).map_err(rejected)?)),
            HashKind::Sha512 => Self::Sha512(Box::new(Hmac::new_from_slice(key).map_err(rejected)?)),
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(m) => m.update(data),
            Self::Sha384(m) => m.update(data),
            Self::Sha512(m) => m.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha384(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }
}

/// Constant-time equality for digest and MAC comparisons.
pub fn verify(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}
