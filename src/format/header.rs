//! Container header: magic constants, version magic, algorithm descriptor.
//!
//! The descriptor is a `/`-joined string whose field count is fixed by the
//! version: `cipher/hash` before V3, `cipher/hash/mode/mac` in V3, and
//! `cipher/hash/mode/mac/iterations-hex` from V4 on. Pre-mode revisions
//! imply CBC.

use std::io::{Read, Write};

use crate::config::{MAGIC_PRIMARY, MAGIC_SECONDARY, MAX_KDF_ITERATIONS};
use crate::crypto::suite::{self, MacKind, ModeKind, Suite};
use crate::error::{Error, Result};
use crate::format::version::Version;
use crate::wire;

/// Longest descriptor we will read before declaring the stream garbage.
const MAX_DESCRIPTOR_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub suite: Suite,
}

pub fn write_header<W: Write>(w: &mut W, header: &Header) -> Result<()> {
    wire::write_u64(w, MAGIC_PRIMARY)?;
    wire::write_u64(w, MAGIC_SECONDARY)?;
    wire::write_u64(w, header.version.magic())?;
    wire::write_string(w, &build_descriptor(header))
}

pub fn read_header<R: Read>(r: &mut R) -> Result<Header> {
    if wire::read_u64(r)? != MAGIC_PRIMARY || wire::read_u64(r)? != MAGIC_SECONDARY {
        return Err(Error::Malformed("not a casket container".into()));
    }
    let version = Version::from_magic(wire::read_u64(r)?)?;
    let descriptor = wire::read_string(r, MAX_DESCRIPTOR_LEN)?;
    let suite = parse_descriptor(version, &descriptor)?;
    Ok(Header { version, suite })
}

fn build_descriptor(header: &Header) -> String {
    let suite = &header.suite;
    let mut parts = vec![suite.cipher.to_string(), suite.hash.to_string()];
    if header.version >= Version::V3 {
        parts.push(suite.mode.to_string());
        parts.push(suite.mac.to_string());
    }
    if header.version >= Version::V4 {
        parts.push(format!("{:x}", suite.kdf_iterations));
    }
    parts.join("/")
}

fn parse_descriptor(version: Version, descriptor: &str) -> Result<Suite> {
    let fields: Vec<&str> = descriptor.split('/').collect();
    let expected = version.descriptor_fields();
    if fields.len() != expected {
        return Err(Error::Malformed(format!(
            "descriptor carries {} fields, version expects {expected}",
            fields.len()
        )));
    }

    let cipher = suite::parse_cipher(fields[0])?;
    let hash = suite::parse_hash(fields[1])?;
    let mode = if expected >= 4 { suite::parse_mode(fields[2])? } else { ModeKind::Cbc };
    let mac = if expected >= 4 { suite::parse_mac(fields[3])? } else { MacKind::Hmac };

    let policy = version.policy();
    let kdf_iterations = if expected >= 5 {
        u32::from_str_radix(fields[4], 16)
            .map_err(|_| Error::Malformed(format!("bad iteration field {:?}", fields[4])))?
    } else {
        policy.kdf_iterations
    };
    if policy.uses_kdf() && (kdf_iterations == 0 || kdf_iterations > MAX_KDF_ITERATIONS) {
        return Err(Error::KdfLimit);
    }

    Ok(Suite { cipher, hash, mode, mac, kdf_iterations })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::crypto::suite::{CipherKind, HashKind};

    fn suite(iterations: u32) -> Suite {
        Suite {
            cipher: CipherKind::Aes256,
            hash: HashKind::Sha256,
            mode: ModeKind::Cbc,
            mac: MacKind::Hmac,
            kdf_iterations: iterations,
        }
    }

    #[test]
    fn test_round_trip_all_versions() {
        for version in Version::iter() {
            let iterations = version.policy().kdf_iterations;
            let header = Header { version, suite: suite(iterations) };
            let mut buf = Vec::new();
            write_header(&mut buf, &header).unwrap();
            let parsed = read_header(&mut Cursor::new(buf)).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_descriptor_field_gating() {
        let header = Header { version: Version::V1, suite: suite(0) };
        assert_eq!(build_descriptor(&header), "AES256/SHA-256");

        let header = Header { version: Version::V3, suite: suite(4096) };
        assert_eq!(build_descriptor(&header), "AES256/SHA-256/CBC/HMAC");

        let header = Header { version: Version::V5, suite: suite(0x1000) };
        assert_eq!(build_descriptor(&header), "AES256/SHA-256/CBC/HMAC/1000");
    }

    #[test]
    fn test_pre_mode_versions_imply_cbc() {
        let parsed = parse_descriptor(Version::V2, "RIJNDAEL/SHA256").unwrap();
        assert_eq!(parsed.mode, ModeKind::Cbc);
        assert_eq!(parsed.cipher, CipherKind::Aes256);
        assert_eq!(parsed.kdf_iterations, 0);
    }

    #[test]
    fn test_field_count_enforced() {
        assert!(parse_descriptor(Version::V1, "AES256/SHA-256/CBC").is_err());
        assert!(parse_descriptor(Version::V5, "AES256/SHA-256/CBC/HMAC").is_err());
    }

    #[test]
    fn test_iteration_limits() {
        assert!(matches!(parse_descriptor(Version::V5, "AES256/SHA-256/CBC/HMAC/0"), Err(Error::KdfLimit)));
        assert!(matches!(
            parse_descriptor(Version::V5, "AES256/SHA-256/CBC/HMAC/ffffffff"),
            Err(Error::KdfLimit)
        ));
        assert!(parse_descriptor(Version::V5, "AES256/SHA-256/CBC/HMAC/zz").is_err());
    }

    #[test]
    fn test_bad_magic() {
        let header = Header { version: Version::V5, suite: suite(64) };
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();

        let mut wrong = buf.clone();
        wrong[0] ^= 0xFF;
        assert!(matches!(read_header(&mut Cursor::new(wrong)), Err(Error::Malformed(_))));

        let mut unknown_version = buf;
        unknown_version[23] = 0x7F;
        assert!(matches!(
            read_header(&mut Cursor::new(unknown_version)),
            Err(Error::UnknownVersion(_))
        ));
    }
}
