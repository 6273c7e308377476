//! Size-rotated log file with backup retention.
//!
//! Layout on disk for an active file `logs/app.log`:
//!
//! ```text
//! logs/
//! ├── app.log          # active file
//! ├── app.1.log        # newest backup
//! ├── app.2.log
//! └── app.3.log.zst    # compressed backup
//! ```
//!
//! Moving the active file into the backup window, shifting older backups
//! and compressing them is done by log4rs's fixed-window roller. The
//! check-rotate-append sequence for every record runs under a single lock,
//! so concurrent writers can neither both rotate nor overshoot the size
//! limit.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Utc};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::roll::Roll;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{BuildResult, ConstructionError};
use crate::writer::LogWriter;

/// Index of the newest backup.
const FIRST_INDEX: u32 = 1;
const COMPRESS_SUFFIX: &str = ".zst";

/// Rollover and retention rules. Zero means unbounded for the numeric limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Rotate before an append would push the file past this many bytes
    pub max_size: u64,
    /// Keep at most this many backups
    pub max_backups: u64,
    /// Remove backups older than this many days
    pub max_age_days: u64,
    /// zstd-compress backups after rotation
    pub compress: bool,
    /// Report backup times in local time instead of UTC
    pub local_time: bool,
    /// Rotate once when the file is opened
    pub rotate_on_startup: bool,
}

impl RotationPolicy {
    /// Build the numeric limits from signed inputs, rejecting negatives.
    pub fn from_limits(max_size: i64, max_backups: i64, max_age_days: i64) -> BuildResult<Self> {
        Ok(Self {
            max_size: non_negative("max_size", max_size)?,
            max_backups: non_negative("max_backups", max_backups)?,
            max_age_days: non_negative("max_age", max_age_days)?,
            ..Self::default()
        })
    }
}

pub(crate) fn non_negative(option: &'static str, value: i64) -> BuildResult<u64> {
    u64::try_from(value).map_err(|_| ConstructionError::Negative { option, value })
}

/// A rotated-out file found next to the active file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    /// Position in the window, 1 being the newest
    pub index: u32,
    /// Last modification, in local time when the policy asks for it
    pub modified: DateTime<FixedOffset>,
    pub compressed: bool,
}

struct FileState {
    file: Option<File>,
    size: u64,
}

/// Append-only file that rolls over according to a [`RotationPolicy`].
///
/// The active file is opened lazily on the first write.
pub struct RotatingFile {
    path: PathBuf,
    dir: PathBuf,
    stem: String,
    ext: String,
    policy: RotationPolicy,
    state: Mutex<FileState>,
}

impl RotatingFile {
    /// Create the writer. Performs I/O only when `rotate_on_startup` is set.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid_path(&path))?
            .to_string();
        let (stem, ext) = match file_name.rfind('.') {
            Some(idx) if idx > 0 => (file_name[..idx].to_string(), file_name[idx..].to_string()),
            _ => (file_name.clone(), String::new()),
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // The roller takes its archive pattern as a string
        if dir.to_str().is_none() {
            return Err(invalid_path(&path));
        }

        let writer = Self {
            path,
            dir,
            stem,
            ext,
            policy,
            state: Mutex::new(FileState { file: None, size: 0 }),
        };
        if writer.policy.rotate_on_startup {
            writer.rotate()?;
        }
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Append `buf` as one unit, rotating first if it would not fit.
    ///
    /// A record longer than `max_size` can never fit and is rejected. If
    /// rotation fails nothing is written and the error is returned. An age
    /// retention failure after a successful rotation is returned after `buf`
    /// has been appended.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if self.policy.max_size > 0 && len > self.policy.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.policy.max_size
                ),
            ));
        }

        let mut state = self.state.lock();
        if state.file.is_none() {
            self.open_existing(&mut state)?;
        }

        let rotated = if self.should_rotate(state.size, len) {
            self.rotate_locked(&mut state)?;
            true
        } else {
            false
        };

        let file = state
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not open"))?;
        file.write_all(buf)?;
        state.size += len;

        if rotated {
            self.prune()?;
        }
        Ok(buf.len())
    }

    /// Close the active file, move it into the backup window and start a
    /// fresh one.
    pub fn rotate(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        self.rotate_locked(&mut state)?;
        self.prune()
    }

    /// Backups of this file, newest first.
    pub fn backups(&self) -> io::Result<Vec<Backup>> {
        let mut backups = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some((index, compressed)) = name.to_str().and_then(|n| self.parse_backup_name(n))
            else {
                continue;
            };
            let modified = DateTime::<Utc>::from(metadata.modified()?);
            let modified = if self.policy.local_time {
                modified.with_timezone(&Local).fixed_offset()
            } else {
                modified.fixed_offset()
            };
            backups.push(Backup {
                path: entry.path(),
                index,
                modified,
                compressed,
            });
        }
        backups.sort_by_key(|b| (b.index, b.compressed));
        Ok(backups)
    }

    fn should_rotate(&self, size: u64, len: u64) -> bool {
        self.policy.max_size > 0 && size + len > self.policy.max_size
    }

    fn open_existing(&self, state: &mut FileState) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        state.size = file.metadata()?.len();
        state.file = Some(file);
        Ok(())
    }

    fn rotate_locked(&self, state: &mut FileState) -> io::Result<()> {
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }
        match fs::metadata(&self.path) {
            Ok(_) => self.roller()?.roll(&self.path).map_err(io::Error::other)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        // The active file is gone only once the roll succeeded; on failure
        // the next write reopens it for appending.
        self.open_existing(state)
    }

    /// Roller for the current backup set. An unbounded policy widens the
    /// window just past the oldest backup so nothing falls off the end.
    fn roller(&self) -> io::Result<FixedWindowRoller> {
        let highest = self
            .backups()?
            .iter()
            .filter(|b| b.compressed == self.policy.compress)
            .map(|b| b.index)
            .max()
            .unwrap_or(0);
        let open_window = highest.saturating_add(1);
        let count = match u32::try_from(self.policy.max_backups) {
            Ok(0) => open_window,
            Ok(limit) => limit.min(open_window),
            Err(_) => open_window,
        };
        FixedWindowRoller::builder()
            .base(FIRST_INDEX)
            .build(&self.archive_pattern()?, count)
            .map_err(io::Error::other)
    }

    /// `<dir>/<stem>.{}<ext>`, with `.zst` appended when compressing.
    fn archive_pattern(&self) -> io::Result<String> {
        let suffix = if self.policy.compress { COMPRESS_SUFFIX } else { "" };
        let pattern = self
            .dir
            .join(format!("{}.{{}}{}{}", self.stem, self.ext, suffix));
        pattern
            .to_str()
            .map(str::to_owned)
            .ok_or_else(|| invalid_path(&self.path))
    }

    fn parse_backup_name(&self, name: &str) -> Option<(u32, bool)> {
        let (name, compressed) = match name.strip_suffix(COMPRESS_SUFFIX) {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        let index = name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('.')?
            .strip_suffix(self.ext.as_str())?;
        if !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: u32 = index.parse().ok()?;
        (index >= FIRST_INDEX).then_some((index, compressed))
    }

    /// Remove backups past the age limit, and any left beyond the window
    /// after `max_backups` was lowered. Every removal is attempted; the
    /// first error is returned.
    fn prune(&self) -> io::Result<()> {
        let cutoff = (self.policy.max_age_days > 0)
            .then(|| {
                i64::try_from(self.policy.max_age_days)
                    .ok()
                    .and_then(chrono::Duration::try_days)
                    .and_then(|age| Utc::now().checked_sub_signed(age))
            })
            .flatten();

        let mut first_err: Option<io::Error> = None;
        for backup in self.backups()? {
            let over_count =
                self.policy.max_backups > 0 && u64::from(backup.index) > self.policy.max_backups;
            let too_old = cutoff.is_some_and(|c| backup.modified.with_timezone(&Utc) < c);
            if over_count || too_old {
                if let Err(e) = fs::remove_file(&backup.path) {
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn invalid_path(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("log path is not a valid UTF-8 file path: {}", path.display()),
    )
}

impl LogWriter for RotatingFile {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        self.write(record).map(|_| ())
    }

    fn sync(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        match state.file.as_mut() {
            Some(file) => {
                file.flush()?;
                file.sync_data()
            }
            None => Ok(()),
        }
    }
}
