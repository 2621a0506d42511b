//! Key material initialization.
//!
//! Turns raw key bytes into a ready chaining-mode transform plus the salt,
//! IV, and MAC key the container needs, following the version policy for
//! IV derivation and KDF use.

use rand::RngExt;

use crate::config::{CIPHER_BLOCK, KDF_LABEL_CIPHER, KDF_LABEL_MAC};
use crate::crypto::cipher::{BlockCipher, CipherTransform};
use crate::crypto::hash;
use crate::crypto::kdf;
use crate::crypto::suite::Suite;
use crate::error::{Error, Result};
use crate::secret::SecretBytes;

/// How the IV is produced. The first two are preserved legacy behavior:
/// deriving the IV from the key source alone repeats it across containers
/// sealed with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvScheme {
    /// Leading key-source bytes, unhashed. Earliest revisions only.
    Broken,

    /// Key source hashed once, truncated to the block size.
    Simple,

    /// Fresh random IV, written to the wire in cleartext.
    Random,
}

pub struct InitParams<'a> {
    pub suite: Suite,
    pub iv_scheme: IvScheme,
    pub use_kdf: bool,
    pub uses_mac: bool,
    pub raw_key: &'a SecretBytes,
}

/// Everything the container codec needs from the key material.
pub struct Material {
    pub transform: CipherTransform,
    /// KDF salt, present when the KDF is in force; written to the wire.
    pub salt: Option<Vec<u8>>,
    /// IV to write in cleartext, present only for [`IvScheme::Random`].
    pub wire_iv: Option<[u8; CIPHER_BLOCK]>,
    pub mac_key: Option<SecretBytes>,
}

/// Initializes key material for sealing; generates salt and IV as needed.
pub fn init_encryption(params: &InitParams<'_>) -> Result<Material> {
    materialize(params, None, None)
}

/// Initializes key material for opening, with the salt and IV read from
/// the wire (where the policy put them there).
pub fn init_decryption(
    params: &InitParams<'_>,
    salt: Option<Vec<u8>>,
    wire_iv: Option<[u8; CIPHER_BLOCK]>,
) -> Result<Material> {
    if params.use_kdf && salt.is_none() {
        return Err(Error::Malformed("container requires a KDF salt but carries none".into()));
    }
    materialize(params, salt, wire_iv)
}

fn materialize(
    params: &InitParams<'_>,
    salt: Option<Vec<u8>>,
    wire_iv: Option<[u8; CIPHER_BLOCK]>,
) -> Result<Material> {
    let raw = params.raw_key.expose();
    if raw.is_empty() {
        return Err(Error::InvalidKey("empty key material".into()));
    }

    let suite = params.suite;
    // One hash normalizes passphrases and keyfiles of any length.
    let key_source = hash::digest(suite.hash, raw);
    let key_len = suite.cipher.key_len();

    let (salt, cipher_key) = if params.use_kdf {
        let salt = match salt {
            Some(salt) => salt,
            None => kdf::generate_salt(key_len),
        };
        let key = kdf::derive(&key_source, &salt, KDF_LABEL_CIPHER, suite.kdf_iterations, key_len, suite.hash)?;
        (Some(salt), key)
    } else {
        // Legacy path: truncate or zero-pad the key source directly.
        let mut key = key_source.clone();
        key.resize(key_len, 0);
        (None, key)
    };

    let (iv, iv_on_wire) = match params.iv_scheme {
        IvScheme::Broken => (truncate_block(&key_source), None),
        IvScheme::Simple => (truncate_block(&hash::digest(suite.hash, &key_source)), None),
        IvScheme::Random => {
            let iv = match wire_iv {
                Some(iv) => iv,
                None => {
                    let mut iv = [0u8; CIPHER_BLOCK];
                    rand::rng().fill(&mut iv[..]);
                    iv
                }
            };
            (iv, Some(iv))
        }
    };

    let mac_key = if params.uses_mac {
        let salt_bytes: &[u8] = salt.as_deref().unwrap_or_default();
        let key = kdf::derive(
            &key_source,
            salt_bytes,
            KDF_LABEL_MAC,
            suite.kdf_iterations.max(1),
            suite.hash.output_len(),
            suite.hash,
        )?;
        Some(SecretBytes::from_vec(key))
    } else {
        None
    };

    let cipher = BlockCipher::new(suite.cipher, &cipher_key)?;
    let transform = CipherTransform::new(cipher, suite.mode, iv);

    Ok(Material { transform, salt, wire_iv: iv_on_wire, mac_key })
}

fn truncate_block(bytes: &[u8]) -> [u8; CIPHER_BLOCK] {
    let mut block = [0u8; CIPHER_BLOCK];
    block.copy_from_slice(&bytes[..CIPHER_BLOCK]);
    block
}
