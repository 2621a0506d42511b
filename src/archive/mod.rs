//! Depth-first archive serialization.
//!
//! A tree payload is the entries in pre-order: the root directory first
//! (path "."), then each child subtree fully before its siblings. An entry
//! is `{kind, path-length, path}`; regular files append `{size, bytes}`
//! inline, symlinks append their target. The entry count travels in the
//! container metadata and is files + directories + 1 for the root.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use hashbrown::HashSet;
use walkdir::WalkDir;

use crate::config::MAX_PATH_LEN;
use crate::error::{Error, Result, Warning};
use crate::progress::Monitor;
use crate::stream::{copy_all, copy_exact};
use crate::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    Hardlink,
    Symlink,
}

impl EntryKind {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Directory => 0,
            Self::Regular => 1,
            Self::Hardlink => 2,
            Self::Symlink => 3,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Directory),
            1 => Ok(Self::Regular),
            2 => Ok(Self::Hardlink),
            3 => Ok(Self::Symlink),
            other => Err(Error::Malformed(format!("unknown archive entry kind {other:#04x}"))),
        }
    }
}

/// Byte and entry totals gathered before encoding starts, so progress can
/// report against a fixed denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub entries: u64,
    pub bytes: u64,
}

/// Walks the tree once, counting what [`write_tree`] will emit.
pub fn survey(root: &Path, follow_links: bool) -> Result<TreeStats> {
    let mut stats = TreeStats { entries: 1, bytes: 0 };
    for entry in walk(root, follow_links) {
        let entry = entry.map_err(io_of_walk)?;
        stats.entries += 1;
        if entry.file_type().is_file() {
            stats.bytes += entry.metadata().map_err(io_of_walk)?.len();
        }
    }
    Ok(stats)
}

/// Serializes the tree under `root` into `out`, depth-first pre-order.
/// `stats` is the survey taken before encoding started; the walk must
/// still match it, or the container would lie about its own shape.
pub fn write_tree<W: Write>(
    out: &mut W,
    root: &Path,
    follow_links: bool,
    stats: &TreeStats,
    monitor: &Monitor,
) -> Result<()> {
    write_entry_header(out, EntryKind::Directory, ".")?;
    monitor.add_entry();
    let mut written = 1u64;

    for entry in walk(root, follow_links) {
        monitor.checkpoint()?;
        let entry = entry.map_err(io_of_walk)?;
        let rel = relative_name(root, entry.path())?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            write_entry_header(out, EntryKind::Directory, &rel)?;
        } else if file_type.is_file() {
            write_entry_header(out, EntryKind::Regular, &rel)?;
            let size = entry.metadata().map_err(io_of_walk)?.len();
            wire::write_u64(out, size)?;
            let mut source = BufReader::new(File::open(entry.path())?);
            let copied = copy_all(&mut source, out, monitor)?;
            if copied != size {
                return Err(Error::Malformed(format!(
                    "{} changed size during the run",
                    entry.path().display()
                )));
            }
        } else {
            // Symlink (or anything else the platform reports): record the
            // path and target without following it.
            write_entry_header(out, EntryKind::Symlink, &rel)?;
            let target = fs::read_link(entry.path())
                .map(|t| t.to_string_lossy().into_owned())
                .unwrap_or_default();
            wire::write_string(out, &target)?;
        }
        monitor.add_entry();
        written += 1;
    }
    if written != stats.entries {
        return Err(Error::Malformed(format!(
            "tree changed during the run: surveyed {} entries, wrote {written}",
            stats.entries
        )));
    }
    Ok(())
}

/// Reads exactly `total` entries, recreating the tree under `dest`. Link
/// entries are reported as warnings, not errors.
pub fn read_tree<R: Read>(input: &mut R, dest: &Path, total: u64, monitor: &Monitor) -> Result<Vec<Warning>> {
    if total == 0 {
        return Err(Error::Malformed("archive with no entries".into()));
    }

    let mut created: HashSet<PathBuf> = HashSet::new();
    let mut warnings = Vec::new();

    for _ in 0..total {
        monitor.checkpoint()?;
        let kind = EntryKind::from_u8(wire::read_u8(input)?)?;
        let rel = wire::read_string(input, MAX_PATH_LEN)?;
        let rel_path = sanitize(&rel)?;
        let full = dest.join(&rel_path);

        match kind {
            EntryKind::Directory => {
                ensure_dir(&full, &mut created)?;
            }
            EntryKind::Regular => {
                if let Some(parent) = full.parent() {
                    ensure_dir(parent, &mut created)?;
                }
                let size = wire::read_u64(input)?;
                let mut out = BufWriter::new(File::create(&full)?);
                copy_exact(input, &mut out, size, monitor)?;
                out.flush()?;
            }
            EntryKind::Hardlink | EntryKind::Symlink => {
                let _target = wire::read_string(input, MAX_PATH_LEN)?;
                tracing::warn!(path = %full.display(), "skipping link entry");
                warnings.push(Warning::Link(full));
            }
        }
        monitor.add_entry();
    }
    Ok(warnings)
}

fn walk(root: &Path, follow_links: bool) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
}

fn write_entry_header<W: Write>(out: &mut W, kind: EntryKind, rel: &str) -> Result<()> {
    wire::write_u8(out, kind.as_u8())?;
    wire::write_string(out, rel)
}

fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| Error::Malformed(format!("{} escapes the archive root", path.display())))?;
    let name = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if name.len() > MAX_PATH_LEN {
        return Err(Error::Malformed(format!("path of {} bytes exceeds the limit", name.len())));
    }
    Ok(name)
}

/// Rejects entry paths that would land outside the destination.
fn sanitize(rel: &str) -> Result<PathBuf> {
    if rel == "." {
        return Ok(PathBuf::new());
    }
    let path = Path::new(rel);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(Error::Malformed(format!("entry path {rel:?} escapes the destination"))),
        }
    }
    Ok(path.to_path_buf())
}

fn ensure_dir(path: &Path, created: &mut HashSet<PathBuf>) -> Result<()> {
    if created.insert(path.to_path_buf()) {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn io_of_walk(err: walkdir::Error) -> Error {
    match err.into_io_error() {
        Some(io) => Error::Io(io),
        None => Error::Malformed("filesystem loop while walking the tree".into()),
    }
}
