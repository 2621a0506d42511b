//! The sealing/opening engine.
//!
//! One invocation runs one job: a single worker drives the
//! read/transform/write pipeline from source to destination, publishing
//! progress through the shared [`Monitor`] and honoring cancellation at
//! block and entry checkpoints. Layering, outermost to innermost: FEC
//! framing (unless raw mode), the cipher stream, optional chunking with
//! the compression filter, and the payload itself.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive;
use crate::config::{CHUNK_SIZE, CIPHER_BLOCK, MAGIC_PRIMARY, MAX_KDF_ITERATIONS};
use crate::crypto::engine::{self as keys, InitParams, IvScheme};
use crate::crypto::suite::{ModeKind, Suite};
use crate::crypto::{Digests, TeeReader, TeeWriter, mac};
use crate::error::{Error, Result, Warning};
use crate::fec;
use crate::format::envelope::{self, Nonce};
use crate::format::header::{Header, read_header, write_header};
use crate::format::metadata::{Metadata, read_metadata, write_metadata};
use crate::format::version::Version;
use crate::progress::{Monitor, Status};
use crate::secret::SecretBytes;
use crate::stream::chunk::{ChunkReader, ChunkWriter};
use crate::stream::{BlockReader, BlockWriter, copy_all, copy_exact};
use crate::wire;

/// Upper bound accepted for a wire-negotiated chunk size.
const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

pub struct EncodeRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub suite: Suite,
    pub version: Version,
    pub compress: bool,
    pub follow_links: bool,
    /// Raw mode: skip the FEC physical framing.
    pub raw_frame: bool,
    pub overwrite: bool,
    pub key: SecretBytes,
}

pub struct DecodeRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub overwrite: bool,
    pub key: SecretBytes,
}

/// Terminal outcome of one run.
pub struct RunReport {
    pub status: Status,
    pub status_label: &'static str,
    pub warnings: Vec<Warning>,
    pub message: String,
}

/// What [`inspect`] can tell without key material.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub version: Version,
    pub suite: Suite,
    pub fec_framed: bool,
}

pub fn encode(req: &EncodeRequest, monitor: &Monitor) -> RunReport {
    monitor.begin();
    report(try_encode(req, monitor), monitor, "sealed")
}

pub fn decode(req: &DecodeRequest, monitor: &Monitor) -> RunReport {
    monitor.begin();
    report(try_decode(req, monitor), monitor, "opened")
}

/// Reads the cleartext header portion of a container.
pub fn inspect(path: &Path) -> Result<Inspection> {
    let fec_framed = detect_framing(path)?;
    let mut source = PhysicalReader::open(path, fec_framed)?;
    let header = read_header(&mut source).map_err(normalize)?;
    Ok(Inspection { version: header.version, suite: header.suite, fec_framed })
}

fn report(result: Result<Vec<Warning>>, monitor: &Monitor, verb: &str) -> RunReport {
    match result.map_err(normalize) {
        Ok(warnings) => {
            monitor.finish(Status::Success);
            for w in &warnings {
                warn!(warning = %w, "completed with warning");
            }
            let message = if warnings.is_empty() {
                format!("{verb} successfully")
            } else {
                format!("{verb} with {} warning(s)", warnings.len())
            };
            RunReport { status: Status::Success, status_label: "SUCCESS", warnings, message }
        }
        Err(Error::Cancelled) => {
            monitor.finish(Status::Cancelled);
            RunReport {
                status: Status::Cancelled,
                status_label: Error::Cancelled.status_label(),
                warnings: Vec::new(),
                message: "cancelled".into(),
            }
        }
        Err(err) => {
            monitor.finish(Status::Failed);
            let label = err.status_label();
            RunReport { status: Status::Failed, status_label: label, warnings: Vec::new(), message: err.to_string() }
        }
    }
}

/// Unwraps core errors the stream adapters smuggled through `io::Error`.
fn normalize(err: Error) -> Error {
    match err {
        Error::Io(io) => Error::from_io(io),
        other => other,
    }
}

// ── Physical layer ───────────────────────────────────────────────────────

enum PhysicalWriter {
    Plain(BufWriter<File>),
    Framed(BlockWriter<BufWriter<File>, fec::Codec>),
}

impl PhysicalWriter {
    fn create(path: &Path, overwrite: bool, framed: bool) -> Result<Self> {
        let file = if overwrite {
            File::create(path)?
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)?
        };
        let buffered = BufWriter::new(file);
        Ok(if framed {
            Self::Framed(BlockWriter::new(buffered, fec::Codec::new()))
        } else {
            Self::Plain(buffered)
        })
    }

    fn finish(self) -> Result<()> {
        let mut buffered = match self {
            Self::Plain(w) => w,
            Self::Framed(w) => w.finish()?,
        };
        buffered.flush()?;
        Ok(())
    }
}

impl Write for PhysicalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Framed(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Framed(w) => w.flush(),
        }
    }
}

enum PhysicalReader {
    Plain(BufReader<File>),
    Framed(BlockReader<BufReader<File>, fec::Codec>),
}

impl PhysicalReader {
    fn open(path: &Path, framed: bool) -> Result<Self> {
        let buffered = BufReader::new(File::open(path)?);
        Ok(if framed {
            Self::Framed(BlockReader::new(buffered, fec::Codec::new()))
        } else {
            Self::Plain(buffered)
        })
    }
}

impl Read for PhysicalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Framed(r) => r.read(buf),
        }
    }
}

/// A container that opens with the cleartext magic is unframed; anything
/// else is assumed to be FEC codewords.
fn detect_framing(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut prefix = [0u8; 8];
    file.read_exact(&mut prefix)
        .map_err(|_| Error::Malformed("file too short to be a container".into()))?;
    Ok(u64::from_be_bytes(prefix) != MAGIC_PRIMARY)
}

// ── Sealing ──────────────────────────────────────────────────────────────

fn try_encode(req: &EncodeRequest, monitor: &Monitor) -> Result<Vec<Warning>> {
    let policy = req.version.policy();
    let src_meta = fs::metadata(&req.source)?;
    let is_dir = src_meta.is_dir();

    if is_dir && !policy.allows_directory {
        return Err(Error::Compatibility(format!(
            "version {} cannot archive directories",
            req.version.number()
        )));
    }
    if policy.cbc_only && req.suite.mode != ModeKind::Cbc {
        return Err(Error::Compatibility(format!(
            "version {} only supports CBC",
            req.version.number()
        )));
    }

    let suite = normalize_suite(&req.suite, req.version)?;

    let tree_stats = if is_dir { Some(archive::survey(&req.source, req.follow_links)?) } else { None };
    let (bytes_total, entries_total, file_name) = match &tree_stats {
        Some(stats) => (stats.bytes, stats.entries, None),
        None => {
            let name = req.source.file_name().map(|n| n.to_string_lossy().into_owned());
            (src_meta.len(), 1, name)
        }
    };
    monitor.set_totals(bytes_total, entries_total);
    info!(
        source = %req.source.display(),
        version = req.version.number(),
        entries = entries_total,
        bytes = bytes_total,
        "sealing"
    );

    let metadata = Metadata {
        size: if is_dir { entries_total } else { bytes_total },
        compressed: req.compress,
        directory: is_dir,
        blocked: req.compress.then_some(CHUNK_SIZE as u64),
        file_name,
    };

    let material = keys::init_encryption(&InitParams {
        suite,
        iv_scheme: policy.iv_scheme,
        use_kdf: policy.uses_kdf(),
        uses_mac: policy.uses_mac,
        raw_key: &req.key,
    })?;

    let mut sink = PhysicalWriter::create(&req.destination, req.overwrite, !req.raw_frame)?;
    write_header(&mut sink, &Header { version: req.version, suite })?;
    if let Some(salt) = &material.salt {
        wire::write_exact(&mut sink, salt)?;
    }
    if let Some(iv) = &material.wire_iv {
        wire::write_exact(&mut sink, iv)?;
    }

    let mut cipher = BlockWriter::new(sink, material.transform);
    let mut digests = Digests::new(suite.hash, material.mac_key.as_ref())?;

    if policy.random_padding {
        envelope::write_padding(&mut cipher, None)?;
    }
    envelope::write_nonce(&mut cipher, &Nonce::generate())?;
    if policy.random_padding {
        envelope::write_padding(&mut cipher, None)?;
    }
    write_metadata(&mut cipher, &metadata)?;
    if policy.random_padding {
        // Masks where the payload starts; fed to the digests like content.
        envelope::write_padding(&mut cipher, Some(&mut digests))?;
    }

    if let Some(chunk) = metadata.blocked {
        let mut chunker = ChunkWriter::new(&mut cipher, chunk as usize, metadata.compressed);
        produce_payload(&mut chunker, req, tree_stats.as_ref(), bytes_total, &mut digests, monitor)?;
        chunker.finish()?;
    } else {
        produce_payload(&mut cipher, req, tree_stats.as_ref(), bytes_total, &mut digests, monitor)?;
    }

    let Digests { hash, mac } = digests;
    let content_hash = hash.finalize();
    wire::write_exact(&mut cipher, &content_hash)?;
    if policy.random_padding {
        envelope::write_padding(&mut cipher, None)?;
    }
    if let Some(mut mac) = mac {
        mac.update(&content_hash);
        wire::write_exact(&mut cipher, &mac.finalize())?;
    }

    let sink = cipher.finish()?;
    sink.finish()?;
    debug!(
        destination = %req.destination.display(),
        content_hash = %hex::encode(&content_hash),
        "container finished"
    );
    Ok(Vec::new())
}

fn produce_payload<W: Write>(
    out: &mut W,
    req: &EncodeRequest,
    tree: Option<&archive::TreeStats>,
    expected_bytes: u64,
    digests: &mut Digests,
    monitor: &Monitor,
) -> Result<()> {
    let mut tee = TeeWriter::new(out, digests);
    if let Some(stats) = tree {
        archive::write_tree(&mut tee, &req.source, req.follow_links, stats, monitor)?;
        return Ok(());
    }
    let mut source = BufReader::new(File::open(&req.source)?);
    let copied = copy_all(&mut source, &mut tee, monitor)?;
    if copied != expected_bytes {
        return Err(Error::Malformed(format!("{} changed size during the run", req.source.display())));
    }
    monitor.add_entry();
    Ok(())
}

/// Clamps the requested suite to what the target version can express.
fn normalize_suite(requested: &Suite, version: Version) -> Result<Suite> {
    let policy = version.policy();
    let mut suite = *requested;
    suite.kdf_iterations = if !policy.uses_kdf() {
        0
    } else if version.descriptor_fields() >= 5 && requested.kdf_iterations > 0 {
        requested.kdf_iterations
    } else {
        // Revisions without a wire iteration field always use their default.
        policy.kdf_iterations
    };
    if policy.uses_kdf() && suite.kdf_iterations > MAX_KDF_ITERATIONS {
        return Err(Error::KdfLimit);
    }
    Ok(suite)
}

// ── Opening ──────────────────────────────────────────────────────────────

fn try_decode(req: &DecodeRequest, monitor: &Monitor) -> Result<Vec<Warning>> {
    if req.destination.exists() && !req.overwrite {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", req.destination.display()),
        )));
    }

    let fec_framed = detect_framing(&req.source)?;
    let mut source = PhysicalReader::open(&req.source, fec_framed)?;
    let header = read_header(&mut source)?;
    let policy = header.version.policy();
    let suite = header.suite;
    info!(
        source = %req.source.display(),
        version = header.version.number(),
        fec = fec_framed,
        "opening"
    );

    let salt = if policy.uses_kdf() {
        Some(wire::read_exact(&mut source, suite.cipher.key_len())?)
    } else {
        None
    };
    let wire_iv = if matches!(policy.iv_scheme, IvScheme::Random) {
        let bytes = wire::read_exact(&mut source, CIPHER_BLOCK)?;
        let mut iv = [0u8; CIPHER_BLOCK];
        iv.copy_from_slice(&bytes);
        Some(iv)
    } else {
        None
    };

    let material = keys::init_decryption(
        &InitParams {
            suite,
            iv_scheme: policy.iv_scheme,
            use_kdf: policy.uses_kdf(),
            uses_mac: policy.uses_mac,
            raw_key: &req.key,
        },
        salt,
        wire_iv,
    )?;

    let mut cipher = BlockReader::new(source, material.transform);

    if policy.random_padding {
        envelope::read_padding(&mut cipher, None)?;
    }
    // Fails fast on a wrong key, before the destination is touched.
    envelope::read_nonce(&mut cipher)?;
    if policy.random_padding {
        envelope::read_padding(&mut cipher, None)?;
    }
    let metadata = read_metadata(&mut cipher)?;
    let mut digests = Digests::new(suite.hash, material.mac_key.as_ref())?;
    if policy.random_padding {
        envelope::read_padding(&mut cipher, Some(&mut digests))?;
    }

    if metadata.directory {
        monitor.set_totals(0, metadata.size);
    } else {
        monitor.set_totals(metadata.size, 1);
    }

    let mut warnings = if let Some(chunk) = metadata.blocked {
        if chunk == 0 || chunk > MAX_CHUNK_SIZE {
            return Err(Error::Malformed(format!("unreasonable chunk size {chunk}")));
        }
        let mut chunker = ChunkReader::new(&mut cipher, chunk as usize, metadata.compressed);
        let warnings = consume_payload(&mut chunker, &metadata, &req.destination, &mut digests, monitor)?;
        chunker.finish()?;
        warnings
    } else {
        if metadata.compressed {
            return Err(Error::Malformed("compressed payload without chunking".into()));
        }
        consume_payload(&mut cipher, &metadata, &req.destination, &mut digests, monitor)?
    };

    let Digests { hash, mac } = digests;
    let computed_hash = hash.finalize();
    let stored_hash = wire::read_exact(&mut cipher, suite.hash.output_len())?;
    if !mac::verify(&stored_hash, &computed_hash) {
        warnings.push(Warning::Digest);
    }
    if policy.random_padding {
        envelope::read_padding(&mut cipher, None)?;
    }
    if let Some(mut mac_engine) = mac {
        mac_engine.update(&stored_hash);
        let computed_mac = mac_engine.finalize();
        let stored_mac = wire::read_exact(&mut cipher, suite.hash.output_len())?;
        if !mac::verify(&stored_mac, &computed_mac) {
            warnings.push(Warning::Mac);
        }
    }

    Ok(warnings)
}

fn consume_payload<R: Read>(
    input: &mut R,
    metadata: &Metadata,
    dest: &Path,
    digests: &mut Digests,
    monitor: &Monitor,
) -> Result<Vec<Warning>> {
    let mut tee = TeeReader::new(input, digests);
    if metadata.directory {
        archive::read_tree(&mut tee, dest, metadata.size, monitor)
    } else {
        let mut out = BufWriter::new(File::create(dest)?);
        copy_exact(&mut tee, &mut out, metadata.size, monitor)?;
        out.flush()?;
        monitor.add_entry();
        Ok(Vec::new())
    }
}
