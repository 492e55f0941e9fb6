//! Date-stamped log files in a single directory.
//!
//! # Design
//! - One file per local calendar day, named `plinth-log-YYYY-MM-DD.log`, so the
//!   lexicographically last file is the newest.
//! - Only files matching that pattern are read or removed.
//! - Operations are synchronous; async callers should use `spawn_blocking`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Result, TelemetryError};

const FILE_PREFIX: &str = "plinth-log-";
const FILE_SUFFIX: &str = ".log";
const DENY_ALL: &str = "Order allow,deny\nDeny from all\n";
const INDEX_PLACEHOLDER: &str = "<?php\n// Silence is golden.\n";

/// Handle to the directory holding log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirectory {
    root: PathBuf,
}

impl LogDirectory {
    /// Directory rooted at `root`; nothing is created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// File name used for records written on `date`.
    #[must_use]
    pub fn file_name_for(date: NaiveDate) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d"))
    }

    /// Append one already formatted line to the file for `date`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be written.
    pub fn append(&self, date: NaiveDate, line: &str) -> Result<()> {
        self.ensure_root()?;
        let path = self.root.join(Self::file_name_for(date));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TelemetryError::log_file("open_log_file", &path, source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| TelemetryError::log_file("append_log_line", &path, source))
    }

    /// Log files present in the directory, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory exists but cannot be listed.
    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(TelemetryError::log_file("list_log_dir", &self.root, source));
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(std::ffi::OsStr::to_str)
                        .is_some_and(is_log_file_name)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Contents of the newest log file, or an empty string when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or the newest file cannot be read.
    pub fn latest_contents(&self) -> Result<String> {
        let Some(latest) = self.log_files()?.pop() else {
            return Ok(String::new());
        };
        let bytes = fs::read(&latest)
            .map_err(|source| TelemetryError::log_file("read_log_file", &latest, source))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Delete every log file. Returns how many files were removed.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be removed.
    pub fn clear(&self) -> Result<usize> {
        let files = self.log_files()?;
        for file in &files {
            match fs::remove_file(file) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(TelemetryError::log_file("remove_log_file", file, source));
                }
            }
        }
        Ok(files.len())
    }

    /// Create the directory with deny-all and placeholder index files so a
    /// static file server in front of it does not expose the logs.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or guard files cannot be written.
    pub fn secure(&self) -> Result<()> {
        self.ensure_root()?;
        for (name, contents) in [(".htaccess", DENY_ALL), ("index.php", INDEX_PLACEHOLDER)] {
            let path = self.root.join(name);
            if path.exists() {
                continue;
            }
            fs::write(&path, contents)
                .map_err(|source| TelemetryError::log_file("write_guard_file", &path, source))?;
        }
        restrict_permissions(&self.root)
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|source| TelemetryError::log_file("create_log_dir", &self.root, source))
    }
}

fn is_log_file_name(name: &str) -> bool {
    name.strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        .is_some_and(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() && date.len() == 10)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .map_err(|source| TelemetryError::log_file("restrict_log_dir", path, source))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
