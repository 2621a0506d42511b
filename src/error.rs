//! Error taxonomy and run outcomes.
//!
//! Fatal conditions are [`Error`] variants and abort the run; recoverable
//! findings are [`Warning`]s and the run completes as success-with-warnings,
//! leaving whatever output was produced on disk.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal engine errors. Each maps to a terminal `FAILED_*` status.
#[derive(Debug, Error)]
pub enum Error {
    /// The version magic did not resolve to any known format revision.
    #[error("unknown container version magic {0:#018x}")]
    UnknownVersion(u64),

    /// An algorithm name in the descriptor is not supported.
    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// A metadata tag this build does not understand.
    #[error("unknown metadata tag {0:#04x}")]
    UnknownTag(u8),

    /// Key material was rejected before any processing started.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The KDF iteration or output counter would overflow.
    #[error("key derivation limit reached")]
    KdfLimit,

    /// The verification nonce did not hold; wrong key or corrupted stream.
    #[error("verification failed: wrong key or corrupted container")]
    Integrity,

    /// The requested feature cannot be represented in the target version.
    #[error("not representable in target version: {0}")]
    Compatibility(String),

    /// A codeword carried more errors than the code can correct.
    #[error("unrecoverable corruption: more than {max} errors in one block", max = crate::config::FEC_MAX_ERRORS)]
    Unrecoverable,

    /// A structural violation of the container layout.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// The run was cancelled at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Short machine-readable status label for the terminal state.
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::UnknownVersion(_) => "FAILED_UNKNOWN_VERSION",
            Self::UnknownAlgorithm(_) => "FAILED_UNKNOWN_ALGORITHM",
            Self::UnknownTag(_) => "FAILED_UNKNOWN_TAG",
            Self::InvalidKey(_) | Self::KdfLimit => "FAILED_INIT",
            Self::Integrity => "FAILED_DECRYPTION",
            Self::Compatibility(_) => "FAILURE_COMPATIBILITY",
            Self::Unrecoverable | Self::Io(_) => "FAILED_IO",
            Self::Malformed(_) => "FAILED_FORMAT",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Recovers a core error smuggled through an `io::Error` by the stream
    /// adapters, so FEC failures surface as themselves instead of as I/O.
    pub fn from_io(err: io::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(inner) => inner,
            Err(err) => Self::Io(err),
        }
    }

    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal findings reported alongside a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Trailing content hash did not match the recomputed digest.
    Digest,

    /// Trailing MAC did not match the recomputed digest.
    Mac,

    /// A link entry could not be materialized on this platform.
    Link(PathBuf),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Digest => f.write_str("content hash mismatch: output may be corrupted"),
            Self::Mac => f.write_str("content MAC mismatch: output may be tampered with"),
            Self::Link(path) => write!(f, "link entry not materialized: {}", path.display()),
        }
    }
}
