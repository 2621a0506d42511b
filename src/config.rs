//! Global configuration constants.
//!
//! Everything here is a fixed parameter of the container format or of the
//! runtime. Per-version behavior lives in the policy table in
//! [`crate::format::version`], not here.

/// Application name used in user-facing output.
pub const APP_NAME: &str = "casket";

/// File extension for sealed containers.
pub const FILE_EXTENSION: &str = ".csk";

// === Container magic numbers ===

/// First fixed magic constant, ASCII "casket" followed by a CRLF guard.
///
/// The trailing `\r\n` detects line-ending translation by transfer tools,
/// the same trick the PNG signature uses.
pub const MAGIC_PRIMARY: u64 = 0x6361_736B_6574_0D0A;

/// Second fixed magic constant, starting with a `\x1a` (DOS EOF) guard.
pub const MAGIC_SECONDARY: u64 = 0x1A0A_5EA1_CA5C_E700;

// === Cipher geometry ===

/// Block size shared by every supported block cipher, in bytes.
pub const CIPHER_BLOCK: usize = 16;

// === Key derivation ===

/// Upper bound on the KDF iteration count.
///
/// A wire value above this is rejected as `KdfLimit` instead of letting a
/// hostile header pin the CPU for hours.
pub const MAX_KDF_ITERATIONS: u32 = 1 << 24;

/// Domain-separation label for the cipher key derivation.
pub const KDF_LABEL_CIPHER: &[u8] = b"cipher-key";

/// Domain-separation label for the MAC key derivation.
pub const KDF_LABEL_MAC: &[u8] = b"mac-key";

// === Forward error correction ===

/// Logical payload bytes carried by one codeword.
pub const FEC_PAYLOAD: usize = 249;

/// Redundancy symbols appended to each codeword.
pub const FEC_PARITY: usize = 6;

/// Total codeword size on the wire.
pub const FEC_CAPACITY: usize = FEC_PAYLOAD + FEC_PARITY;

/// Maximum number of symbol errors one codeword can recover from.
pub const FEC_MAX_ERRORS: usize = FEC_PARITY / 2;

// === Payload framing ===

/// Logical bytes per length-prefixed payload chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Buffer size for raw source/destination copies.
pub const COPY_BUF: usize = 64 * 1024;

/// Longest relative path accepted in an archive entry.
pub const MAX_PATH_LEN: usize = 4096;

/// Longest original file name stored in metadata.
pub const MAX_FILENAME_LEN: usize = 255;

// === Runtime ===

/// Interval at which the reporter task samples the progress counters.
pub const REPORT_INTERVAL_MS: u64 = 100;

/// Zstd level for the payload chunk filter.
pub const COMPRESSION_LEVEL: i32 = 3;
