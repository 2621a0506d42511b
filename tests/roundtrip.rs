//! End-to-end container round trips across versions, suites, and damage
//! scenarios.

use std::fs;
use std::path::Path;

use strum::IntoEnumIterator;

use casket::crypto::suite::{CipherKind, HashKind, MacKind, ModeKind, Suite};
use casket::engine::{self, DecodeRequest, EncodeRequest, RunReport};
use casket::error::Warning;
use casket::format::version::Version;
use casket::progress::{Monitor, Status};
use casket::secret::SecretBytes;

const PASSWORD: &[u8] = b"correct horse battery staple";

fn suite(cipher: CipherKind, hash: HashKind, mode: ModeKind) -> Suite {
    // Small iteration count keeps the KDF cheap where the wire carries it.
    Suite { cipher, hash, mode, mac: MacKind::Hmac, kdf_iterations: 64 }
}

fn default_suite() -> Suite {
    suite(CipherKind::Aes256, HashKind::Sha256, ModeKind::Cbc)
}

fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 253) % 256) as u8).collect()
}

struct Job {
    version: Version,
    suite: Suite,
    compress: bool,
    raw_frame: bool,
}

impl Default for Job {
    fn default() -> Self {
        Self { version: Version::CURRENT, suite: default_suite(), compress: false, raw_frame: false }
    }
}

fn seal(source: &Path, destination: &Path, job: &Job) -> (RunReport, Monitor) {
    let request = EncodeRequest {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        suite: job.suite,
        version: job.version,
        compress: job.compress,
        follow_links: false,
        raw_frame: job.raw_frame,
        overwrite: false,
        key: SecretBytes::new(PASSWORD),
    };
    let monitor = Monitor::new();
    let report = engine::encode(&request, &monitor);
    (report, monitor)
}

fn open_with_key(source: &Path, destination: &Path, key: &[u8]) -> (RunReport, Monitor) {
    let request = DecodeRequest {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        overwrite: false,
        key: SecretBytes::new(key),
    };
    let monitor = Monitor::new();
    let report = engine::decode(&request, &monitor);
    (report, monitor)
}

fn open(source: &Path, destination: &Path) -> (RunReport, Monitor) {
    open_with_key(source, destination, PASSWORD)
}

/// Seals `content`, applies `mangle` to the container bytes, opens it.
fn mangled_run(job: &Job, content: &[u8], mangle: impl FnOnce(&mut Vec<u8>)) -> (RunReport, Option<Vec<u8>>) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("plain.bin");
    let container = dir.path().join("plain.bin.csk");
    let restored = dir.path().join("restored.bin");
    fs::write(&source, content).unwrap();

    let (report, _) = seal(&source, &container, job);
    assert_eq!(report.status, Status::Success, "seal failed: {}", report.message);

    let mut bytes = fs::read(&container).unwrap();
    mangle(&mut bytes);
    fs::write(&container, &bytes).unwrap();

    let (report, _) = open(&container, &restored);
    let output = restored.exists().then(|| fs::read(&restored).unwrap());
    (report, output)
}

#[test]
fn round_trip_every_version() {
    let content = sample_content(100_000);
    for version in Version::iter() {
        let job = Job { version, ..Job::default() };
        let (report, output) = mangled_run(&job, &content, |_| {});
        assert_eq!(report.status, Status::Success, "version {}: {}", version.number(), report.message);
        assert!(report.warnings.is_empty(), "version {} warned: {:?}", version.number(), report.warnings);
        assert_eq!(output.unwrap(), content, "version {}", version.number());
    }
}

#[test]
fn round_trip_cipher_and_mode_matrix() {
    let content = sample_content(40_000);
    let combos = [
        suite(CipherKind::Aes128, HashKind::Sha256, ModeKind::Cfb),
        suite(CipherKind::Aes192, HashKind::Sha384, ModeKind::Ctr),
        suite(CipherKind::Twofish256, HashKind::Sha512, ModeKind::Cbc),
        suite(CipherKind::Twofish256, HashKind::Sha256, ModeKind::Ctr),
    ];
    for combo in combos {
        let job = Job { suite: combo, ..Job::default() };
        let (report, output) = mangled_run(&job, &content, |_| {});
        assert_eq!(report.status, Status::Success, "suite {combo:?}: {}", report.message);
        assert_eq!(output.unwrap(), content, "suite {combo:?}");
    }
}

#[test]
fn round_trip_compressed() {
    let mut content = vec![0xABu8; 200_000];
    content.extend(sample_content(50_000));
    let job = Job { compress: true, ..Job::default() };
    let (report, output) = mangled_run(&job, &content, |_| {});
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert!(report.warnings.is_empty());
    assert_eq!(output.unwrap(), content);
}

#[test]
fn round_trip_raw_frame() {
    let content = sample_content(10_000);
    let job = Job { raw_frame: true, ..Job::default() };
    let (report, output) = mangled_run(&job, &content, |_| {});
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert_eq!(output.unwrap(), content);
}

#[test]
fn fec_corrects_scattered_damage() {
    let content = sample_content(30_000);
    let (report, output) = mangled_run(&Job::default(), &content, |bytes| {
        // One corrupted symbol in each of three different codewords.
        bytes[300] ^= 0xFF;
        bytes[700] ^= 0x40;
        bytes[5_000] ^= 0x01;
    });
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert!(report.warnings.is_empty(), "FEC should hide the damage: {:?}", report.warnings);
    assert_eq!(output.unwrap(), content);
}

#[test]
fn fec_corrects_three_errors_in_one_block() {
    let content = sample_content(30_000);
    let (report, output) = mangled_run(&Job::default(), &content, |bytes| {
        // Codeword #1 spans bytes 255..510.
        bytes[260] ^= 0x11;
        bytes[300] ^= 0x22;
        bytes[400] ^= 0x33;
    });
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert!(report.warnings.is_empty());
    assert_eq!(output.unwrap(), content);
}

#[test]
fn fec_reports_unrecoverable_block() {
    let content = sample_content(30_000);
    let (report, _) = mangled_run(&Job::default(), &content, |bytes| {
        for offset in 300..310 {
            bytes[offset] ^= 0x5A;
        }
    });
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILED_IO");
}

#[test]
fn tampered_payload_warns_never_silent() {
    let content = sample_content(50_000);
    let job = Job { raw_frame: true, ..Job::default() };
    let (report, output) = mangled_run(&job, &content, |bytes| {
        // Without FEC framing a flipped ciphertext byte must surface as a
        // digest warning. Offset 2000 is well inside the payload region.
        bytes[2_000] ^= 0x01;
    });
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert!(
        report.warnings.iter().any(|w| matches!(w, Warning::Digest | Warning::Mac)),
        "tampering went unnoticed"
    );
    // Output stays on disk for the caller to judge.
    assert!(output.is_some());
}

#[test]
fn tampered_nonce_region_aborts_before_output() {
    let content = sample_content(5_000);
    let job = Job {
        version: Version::V2,
        suite: suite(CipherKind::Aes256, HashKind::Sha256, ModeKind::Cbc),
        raw_frame: true,
        ..Job::default()
    };
    let (report, output) = mangled_run(&job, &content, |bytes| {
        // V2 layout: 24 bytes of magic, 2-byte descriptor length, a
        // 14-byte descriptor, then the cipher stream opens with the nonce.
        bytes[45] ^= 0x80;
    });
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILED_DECRYPTION");
    assert!(output.is_none(), "no output byte may be produced after a nonce mismatch");
}

#[test]
fn wrong_key_is_a_decryption_failure() {
    let content = sample_content(5_000);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("plain.bin");
    let container = dir.path().join("plain.bin.csk");
    fs::write(&source, &content).unwrap();

    let (report, _) = seal(&source, &container, &Job::default());
    assert_eq!(report.status, Status::Success);

    let restored = dir.path().join("restored.bin");
    let (report, _) = open_with_key(&container, &restored, b"not the password");
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILED_DECRYPTION");
    assert!(!restored.exists());
}

#[test]
fn unknown_version_magic_rejected() {
    let content = sample_content(2_000);
    let job = Job { raw_frame: true, ..Job::default() };
    let (report, _) = mangled_run(&job, &content, |bytes| {
        bytes[23] = 0x7F; // low byte of the version magic
    });
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILED_UNKNOWN_VERSION");
}

#[test]
fn directory_round_trip_preserves_tree() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir_all(root.join("c")).unwrap();
    fs::write(root.join("top.txt"), b"top").unwrap();
    fs::write(root.join("a/mid.txt"), sample_content(10_000)).unwrap();
    fs::write(root.join("a/b/deep.bin"), sample_content(70_000)).unwrap();

    let container = dir.path().join("tree.csk");
    let (report, monitor) = seal(&root, &container, &Job::default());
    assert_eq!(report.status, Status::Success, "{}", report.message);
    // 3 files + 3 dirs + root
    assert_eq!(monitor.entries(), (7, 7));

    let out = dir.path().join("restored");
    let (report, monitor) = open(&container, &out);
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert!(report.warnings.is_empty());
    assert_eq!(monitor.entries(), (7, 7));

    assert_eq!(fs::read(out.join("top.txt")).unwrap(), b"top");
    assert_eq!(fs::read(out.join("a/mid.txt")).unwrap(), sample_content(10_000));
    assert_eq!(fs::read(out.join("a/b/deep.bin")).unwrap(), sample_content(70_000));
    assert!(out.join("c").is_dir());
}

#[test]
fn directory_round_trip_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::write(root.join("nested/data.bin"), vec![9u8; 120_000]).unwrap();

    let container = dir.path().join("tree.csk");
    let job = Job { compress: true, ..Job::default() };
    let (report, _) = seal(&root, &container, &job);
    assert_eq!(report.status, Status::Success, "{}", report.message);

    let out = dir.path().join("restored");
    let (report, _) = open(&container, &out);
    assert_eq!(report.status, Status::Success, "{}", report.message);
    assert_eq!(fs::read(out.join("nested/data.bin")).unwrap(), vec![9u8; 120_000]);
}

#[test]
fn directory_refused_by_old_versions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("f.txt"), b"x").unwrap();

    let container = dir.path().join("tree.csk");
    let job = Job { version: Version::V3, ..Job::default() };
    let (report, _) = seal(&root, &container, &job);
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILURE_COMPATIBILITY");
    assert!(!container.exists());
}

#[test]
fn non_cbc_mode_refused_by_cbc_only_versions() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("f.txt");
    fs::write(&source, b"payload").unwrap();

    let job = Job {
        version: Version::V1,
        suite: suite(CipherKind::Aes256, HashKind::Sha256, ModeKind::Ctr),
        ..Job::default()
    };
    let (report, _) = seal(&source, &dir.path().join("f.csk"), &job);
    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.status_label, "FAILURE_COMPATIBILITY");
}

#[test]
fn existing_destination_refused() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("f.txt");
    let container = dir.path().join("f.csk");
    fs::write(&source, b"payload").unwrap();
    fs::write(&container, b"already here").unwrap();

    let (report, _) = seal(&source, &container, &Job::default());
    assert_eq!(report.status, Status::Failed);
    assert_eq!(fs::read(&container).unwrap(), b"already here");
}

#[test]
fn cancellation_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("f.bin");
    fs::write(&source, sample_content(500_000)).unwrap();

    let request = EncodeRequest {
        source: source.clone(),
        destination: dir.path().join("f.csk"),
        suite: default_suite(),
        version: Version::CURRENT,
        compress: false,
        follow_links: false,
        raw_frame: false,
        overwrite: false,
        key: SecretBytes::new(PASSWORD),
    };
    let monitor = Monitor::new();
    monitor.cancel();
    let report = engine::encode(&request, &monitor);
    assert_eq!(report.status, Status::Cancelled);
    assert_eq!(monitor.status(), Status::Cancelled);
}

#[test]
fn inspect_reads_cleartext_header() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("f.bin");
    let container = dir.path().join("f.csk");
    fs::write(&source, sample_content(1_000)).unwrap();

    let job = Job {
        suite: suite(CipherKind::Twofish256, HashKind::Sha512, ModeKind::Ctr),
        ..Job::default()
    };
    let (report, _) = seal(&source, &container, &job);
    assert_eq!(report.status, Status::Success);

    let inspection = engine::inspect(&container).unwrap();
    assert_eq!(inspection.version, Version::CURRENT);
    assert_eq!(inspection.suite.cipher, CipherKind::Twofish256);
    assert_eq!(inspection.suite.hash, HashKind::Sha512);
    assert_eq!(inspection.suite.mode, ModeKind::Ctr);
    assert!(inspection.fec_framed);
}

#[test]
fn progress_counters_reach_totals() {
    let content = sample_content(80_000);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("f.bin");
    let container = dir.path().join("f.csk");
    fs::write(&source, &content).unwrap();

    let (report, monitor) = seal(&source, &container, &Job::default());
    assert_eq!(report.status, Status::Success);
    assert_eq!(monitor.bytes(), (content.len() as u64, content.len() as u64));
    assert_eq!(monitor.entries(), (1, 1));

    let (report, monitor) = open(&container, &dir.path().join("out.bin"));
    assert_eq!(report.status, Status::Success);
    assert_eq!(monitor.bytes(), (content.len() as u64, content.len() as u64));
}
