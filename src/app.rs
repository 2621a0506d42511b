//! Command-line shell around the engine.
//!
//! The shell resolves paths and key material, then hands the job to a
//! dedicated blocking worker while a reporter task renders progress and a
//! signal listener wires Ctrl-C to cooperative cancellation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::config::FILE_EXTENSION;
use crate::crypto::suite::{self, MacKind, Suite};
use crate::engine::{self, DecodeRequest, EncodeRequest, RunReport};
use crate::format::version::Version;
use crate::progress::{Monitor, Status};
use crate::secret::SecretBytes;
use crate::ui;
use crate::ui::progress::{Bar, report_loop};

#[derive(Parser)]
#[command(
    name = "casket",
    version,
    about = "Seal files and directory trees into versioned, authenticated, error-corrected containers."
)]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seal a file or directory into a container.
    Seal {
        /// Source file or directory.
        input: PathBuf,

        /// Output container path (defaults to the input plus ".csk").
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Passphrase used as key material.
        #[arg(short, long)]
        password: Option<String>,

        /// File whose raw bytes are the key material.
        #[arg(long, conflicts_with = "password")]
        key_file: Option<PathBuf>,

        /// Cipher family (see `casket algorithms`).
        #[arg(long, default_value = "AES256")]
        cipher: String,

        /// Hash family.
        #[arg(long, default_value = "SHA-256")]
        hash: String,

        /// Chaining mode.
        #[arg(long, default_value = "CBC")]
        mode: String,

        /// KDF iteration count (defaults to the version's policy).
        #[arg(long)]
        iterations: Option<u32>,

        /// Pass the payload through the compression filter.
        #[arg(short, long)]
        compress: bool,

        /// Follow symlinks while archiving a directory.
        #[arg(long)]
        follow_links: bool,

        /// Raw mode: skip the error-correction framing.
        #[arg(long)]
        raw: bool,

        /// Target an older format revision.
        #[arg(long)]
        format_version: Option<u8>,

        /// Overwrite an existing destination.
        #[arg(short, long)]
        force: bool,
    },

    /// Open a container back into a file or directory.
    Open {
        /// Container path.
        input: PathBuf,

        /// Output path (defaults to the input without ".csk").
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Passphrase used as key material.
        #[arg(short, long)]
        password: Option<String>,

        /// File whose raw bytes are the key material.
        #[arg(long, conflicts_with = "password")]
        key_file: Option<PathBuf>,

        /// Overwrite an existing destination.
        #[arg(short, long)]
        force: bool,
    },

    /// Show the cleartext header of a container.
    Inspect { input: PathBuf },

    /// List the supported algorithm names.
    Algorithms,
}

impl App {
    pub fn init() -> Result<Self> {
        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Self::parse())
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Seal {
                input,
                output,
                password,
                key_file,
                cipher,
                hash,
                mode,
                iterations,
                compress,
                follow_links,
                raw,
                format_version,
                force,
            } => {
                let key = load_key(password, key_file)?;
                let version = resolve_version(format_version)?;
                let suite = Suite {
                    cipher: suite::parse_cipher(&cipher)?,
                    hash: suite::parse_hash(&hash)?,
                    mode: suite::parse_mode(&mode)?,
                    mac: MacKind::Hmac,
                    kdf_iterations: iterations.unwrap_or(0),
                };
                let destination = output.unwrap_or_else(|| sealed_path(&input));
                let request = EncodeRequest {
                    source: input,
                    destination,
                    suite,
                    version,
                    compress,
                    follow_links,
                    raw_frame: raw,
                    overwrite: force,
                    key,
                };
                run_job("Sealing", move |monitor| engine::encode(&request, &monitor)).await
            }

            Commands::Open { input, output, password, key_file, force } => {
                let key = load_key(password, key_file)?;
                let destination = output.unwrap_or_else(|| opened_path(&input));
                let request = DecodeRequest { source: input, destination, overwrite: force, key };
                run_job("Opening", move |monitor| engine::decode(&request, &monitor)).await
            }

            Commands::Inspect { input } => {
                let size = std::fs::metadata(&input)
                    .with_context(|| format!("cannot stat {}", input.display()))?
                    .len();
                let inspection = engine::inspect(&input)?;
                ui::show_inspection(&input, size, &inspection);
                Ok(())
            }

            Commands::Algorithms => {
                ui::show_algorithms();
                Ok(())
            }
        }
    }
}

/// Runs one engine job on a dedicated blocking worker, with the reporter
/// task and Ctrl-C listener alongside it.
async fn run_job<F>(label: &str, job: F) -> Result<()>
where
    F: FnOnce(Arc<Monitor>) -> RunReport + Send + 'static,
{
    let monitor = Arc::new(Monitor::new());

    let reporter = tokio::spawn(report_loop(monitor.clone(), Bar::new(label)));
    let canceller = {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                monitor.cancel();
            }
        })
    };

    let worker_monitor = monitor.clone();
    let report = tokio::task::spawn_blocking(move || job(worker_monitor))
        .await
        .context("worker panicked")?;

    canceller.abort();
    reporter.await.ok();

    ui::show_report(&report);
    match report.status {
        Status::Success => Ok(()),
        Status::Cancelled => bail!("cancelled"),
        _ => bail!("{} [{}]", report.message, report.status_label),
    }
}

fn load_key(password: Option<String>, key_file: Option<PathBuf>) -> Result<SecretBytes> {
    match (password, key_file) {
        (Some(password), None) => Ok(SecretBytes::from_vec(password.into_bytes())),
        (None, Some(path)) => {
            let bytes = std::fs::read(&path).with_context(|| format!("cannot read key file {}", path.display()))?;
            Ok(SecretBytes::from_vec(bytes))
        }
        (None, None) => bail!("provide key material with --password or --key-file"),
        (Some(_), Some(_)) => bail!("--password and --key-file are mutually exclusive"),
    }
}

fn resolve_version(requested: Option<u8>) -> Result<Version> {
    match requested {
        None => Ok(Version::CURRENT),
        Some(n) => Version::from_number(n).with_context(|| format!("unknown format version {n}")),
    }
}

fn sealed_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}

fn opened_path(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if *ext == *FILE_EXTENSION.trim_start_matches('.') => input.with_extension(""),
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push(".out");
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_path_appends_extension() {
        assert_eq!(sealed_path(Path::new("notes.txt")), PathBuf::from("notes.txt.csk"));
        assert_eq!(sealed_path(Path::new("tree")), PathBuf::from("tree.csk"));
    }

    #[test]
    fn test_opened_path_strips_extension() {
        assert_eq!(opened_path(Path::new("notes.txt.csk")), PathBuf::from("notes.txt"));
        assert_eq!(opened_path(Path::new("oddball.bin")), PathBuf::from("oddball.bin.out"));
    }

    #[test]
    fn test_load_key_requires_material() {
        assert!(load_key(None, None).is_err());
        assert_eq!(load_key(Some("pw".into()), None).unwrap().expose(), b"pw");
    }

    #[test]
    fn test_resolve_version() {
        assert_eq!(resolve_version(None).unwrap(), Version::CURRENT);
        assert_eq!(resolve_version(Some(3)).unwrap(), Version::V3);
        assert!(resolve_version(Some(42)).is_err());
    }
}
