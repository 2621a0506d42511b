//! Algorithm families and name resolution.
//!
//! Wire names are uppercase; resolution is case-insensitive and accepts the
//! legacy aliases older containers were written with. A keysize-suffixed
//! name only resolves to a family with exactly that key length.

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum CipherKind {
    #[strum(to_string = "AES128")]
    Aes128,

    #[strum(to_string = "AES192")]
    Aes192,

    /// "RIJNDAEL" is the historical name the earliest containers carry.
    #[strum(to_string = "AES256", serialize = "RIJNDAEL")]
    Aes256,

    #[strum(to_string = "TWOFISH256", serialize = "TWOFISH")]
    Twofish256,
}

impl CipherKind {
    /// Key length in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 | Self::Twofish256 => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum HashKind {
    #[strum(to_string = "SHA-256", serialize = "SHA256")]
    Sha256,

    #[strum(to_string = "SHA-384", serialize = "SHA384")]
    Sha384,

    #[strum(to_string = "SHA-512", serialize = "SHA512")]
    Sha512,
}

impl HashKind {
    /// Digest length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ModeKind {
    #[strum(to_string = "CBC")]
    Cbc,

    #[strum(to_string = "CFB")]
    Cfb,

    #[strum(to_string = "CTR")]
    Ctr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum MacKind {
    #[strum(to_string = "HMAC")]
    Hmac,
}

/// The negotiated algorithm set for one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suite {
    pub cipher: CipherKind,
    pub hash: HashKind,
    pub mode: ModeKind,
    pub mac: MacKind,
    pub kdf_iterations: u32,
}

pub fn parse_cipher(name: &str) -> Result<CipherKind> {
    name.trim().parse().map_err(|_| Error::UnknownAlgorithm(name.to_owned()))
}

pub fn parse_hash(name: &str) -> Result<HashKind> {
    name.trim().parse().map_err(|_| Error::UnknownAlgorithm(name.to_owned()))
}

pub fn parse_mode(name: &str) -> Result<ModeKind> {
    name.trim().parse().map_err(|_| Error::UnknownAlgorithm(name.to_owned()))
}

pub fn parse_mac(name: &str) -> Result<MacKind> {
    name.trim().parse().map_err(|_| Error::UnknownAlgorithm(name.to_owned()))
}

/// Supported name sets, for populating a chooser UI.
#[derive(Debug, Clone)]
pub struct SupportedAlgorithms {
    pub ciphers: Vec<String>,
    pub hashes: Vec<String>,
    pub modes: Vec<String>,
    pub macs: Vec<String>,
}

pub fn supported_algorithms() -> SupportedAlgorithms {
    SupportedAlgorithms {
        ciphers: CipherKind::iter().map(|k| k.to_string()).collect(),
        hashes: HashKind::iter().map(|k| k.to_string()).collect(),
        modes: ModeKind::iter().map(|k| k.to_string()).collect(),
        macs: MacKind::iter().map(|k| k.to_string()).collect(),
    }
}
