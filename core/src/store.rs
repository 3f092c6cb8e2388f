//! Durable log persistence.
//!
//! RULE: Only store.rs touches log files.
//! The timeline decides *what* is written; this module decides how.
//!
//! Layout under the save directory:
//!   autosave/<timestamp>.jsonl       the live log of the running session
//!   <label>.<timestamp>.jsonl        explicit saves
//!
//! Every write is flushed and synced before it is acknowledged.

use crate::error::RewindResult;
use std::{
    cmp::Reverse,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

pub const LOG_EXTENSION: &str = "jsonl";
pub const AUTOSAVE_DIR: &str = "autosave";

/// An append-only newline-delimited log that tracks its own length.
pub struct EventLog {
    file: File,
    path: PathBuf,
    len:  u64,
}

impl EventLog {
    /// Create (or empty) the log at `path`, creating parent directories.
    pub fn create(path: &Path) -> RewindResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        log::info!("event log opened at {}", path.display());
        Ok(Self { file, path: path.to_path_buf(), len: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length in bytes, i.e. the offset the next record starts at.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one serialized record. Returns the offset it starts at.
    pub fn append(&mut self, line: &[u8]) -> RewindResult<u64> {
        let offset = self.len;
        if let Err(err) = self.write_at(offset, line) {
            // Drop whatever part of the record reached the file.
            if let Err(repair) = self.file.set_len(offset) {
                log::error!(
                    "could not trim partial record from {}: {repair}",
                    self.path.display()
                );
            }
            return Err(err.into());
        }
        self.len = offset + line.len() as u64;
        Ok(offset)
    }

    /// Cut the log back to `offset`, which must be a recorded record start.
    pub fn truncate(&mut self, offset: u64) -> RewindResult<()> {
        assert!(
            offset <= self.len,
            "truncate({offset}) past end of log ({} bytes)",
            self.len
        );
        self.file.set_len(offset)?;
        self.file.sync_data()?;
        self.len = offset;
        Ok(())
    }

    pub fn sync(&mut self) -> RewindResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, line: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(line)?;
        self.file.flush()?;
        self.file.sync_data()
    }
}

// ── Paths ──────────────────────────────────────────────────────

/// Day-hour-minute-second-microsecond, local time.
pub fn timestamp() -> String {
    chrono::Local::now().format("%d-%H-%M-%S-%6f").to_string()
}

pub fn autosave_path(save_dir: &Path) -> PathBuf {
    save_dir
        .join(AUTOSAVE_DIR)
        .join(format!("{}.{LOG_EXTENSION}", timestamp()))
}

pub fn save_path(save_dir: &Path, label: &str) -> PathBuf {
    let label = label.trim();
    let name = if label.is_empty() {
        format!("{}.{LOG_EXTENSION}", timestamp())
    } else {
        format!("{label}.{}.{LOG_EXTENSION}", timestamp())
    };
    save_dir.join(name)
}

// ── Whole-file helpers ─────────────────────────────────────────

/// Write `lines` verbatim to a new file at `path`.
pub fn write_lines<'a>(
    path: &Path,
    lines: impl IntoIterator<Item = &'a [u8]>,
) -> RewindResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    for line in lines {
        file.write_all(line)?;
    }
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

/// Every non-empty line of the file, without its terminator.
pub fn read_lines(path: &Path) -> RewindResult<Vec<Vec<u8>>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// A saved log found under the save directory.
#[derive(Debug, Clone)]
pub struct ReplayFile {
    /// Path relative to the save directory, without the extension.
    pub name:     String,
    pub path:     PathBuf,
    pub records:  usize,
    pub modified: SystemTime,
}

impl ReplayFile {
    pub fn is_autosave(&self) -> bool {
        self.name
            .strip_prefix(AUTOSAVE_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// All logs under `save_dir` except `exclude` (the live log).
/// Explicit saves come first, then autosaves; newest first within each.
pub fn list_replays(save_dir: &Path, exclude: Option<&Path>) -> RewindResult<Vec<ReplayFile>> {
    let mut found = Vec::new();
    let mut pending = vec![save_dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if exclude.is_some_and(|live| live == path) {
                continue;
            }
            let relative = path.strip_prefix(save_dir).unwrap_or(&path).with_extension("");
            found.push(ReplayFile {
                name:     relative.to_string_lossy().replace('\\', "/"),
                records:  read_lines(&path)?.len(),
                modified: fs::metadata(&path)?.modified()?,
                path,
            });
        }
    }

    found.sort_by_key(|f| (f.is_autosave(), Reverse(f.modified)));
    Ok(found)
}
