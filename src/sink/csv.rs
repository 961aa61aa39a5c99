//! Size-rotated CSV file output.
//!
//! Rows are `;`-separated with minimal quoting and CRLF line endings. Every
//! row is flushed right away so a crash loses at most the row in flight.
//! With a size limit set, a file growing past it is moved to the first
//! numbered backup, `data.csv` becoming `data(1).csv`, older backups shift up
//! by one and the oldest one beyond the backup count is deleted.

use super::Sink;
use crate::record::Record;
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const HEADER: [&str; 6] = ["TIME", "NAME", "UID", "VAR", "RAW", "UNIT"];

const DELIMITER: u8 = b';';

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("file path not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("file name of {} has no extension, backups cannot be named", .0.display())]
    NoExtension(PathBuf),
    #[error("could not open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
}

#[derive(Debug)]
pub struct CsvWriter {
    path: PathBuf,
    file: Option<Writer<File>>,
    /// Rotation threshold in bytes; 0 disables rotation
    max_file_size: u64,
    max_file_count: u32,
}

impl CsvWriter {
    /// Open `path` for appending, writing the header if the file is new or
    /// empty.
    ///
    /// The parent directory must exist. With rotation enabled the file name
    /// needs an extension, since backups are named by inserting the number
    /// before its last `.`. A backup count below 1 is raised to 1.
    pub fn open(
        path: impl Into<PathBuf>,
        max_file_size: u64,
        max_file_count: u32,
    ) -> Result<Self, SinkError> {
        let mut writer = Self {
            path: PathBuf::new(),
            file: None,
            max_file_size,
            max_file_count: max_file_count.max(1),
        };
        writer.open_path(path.into())?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Append one row. Returns `false` if the writer is closed or the row
    /// could not be written.
    pub fn write_row(&mut self, record: &Record) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };

        let written = file
            .write_record([
                &record.timestamp,
                &record.device_name,
                &record.device_uid,
                &record.variable_name,
                &record.raw_value.to_string(),
                &record.unit,
            ])
            .and_then(|()| file.flush().map_err(csv::Error::from));
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "could not write csv row");
            return false;
        }

        if self.max_file_size > 0 {
            self.rotate_if_full();
        }
        true
    }

    /// Close the file. Returns `false` if it was not open.
    pub fn close(&mut self) -> bool {
        match self.file.take() {
            Some(mut file) => {
                if let Err(e) = file.flush() {
                    warn!(path = %self.path.display(), error = %e, "could not flush csv file");
                }
                true
            }
            None => false,
        }
    }

    /// Reopen a closed writer on the same path. Returns `false` if it was
    /// still open or could not be opened.
    pub fn reopen(&mut self) -> bool {
        if self.file.is_some() {
            return false;
        }
        self.reopen_current()
    }

    /// Close the current file and continue in `path`. Returns `false` if the
    /// writer was closed or the new file could not be opened.
    pub fn set_file_path(&mut self, path: impl Into<PathBuf>) -> bool {
        if !self.close() {
            return false;
        }
        match self.open_path(path.into()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "could not switch csv file");
                false
            }
        }
    }

    /// Path of backup number `n`.
    pub fn backup_path(&self, n: u32) -> PathBuf {
        // open_path guarantees a '.' whenever rotation is enabled
        backup_name(&self.path, n).unwrap_or_else(|| self.path.clone())
    }

    fn open_path(&mut self, path: PathBuf) -> Result<(), SinkError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !directory.is_dir() {
            return Err(SinkError::MissingDirectory(path));
        }
        if self.max_file_size > 0 && backup_name(&path, 1).is_none() {
            return Err(SinkError::NoExtension(path));
        }

        let file = open_append(&path).map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        self.path = path;
        self.file = Some(file);
        Ok(())
    }

    fn reopen_current(&mut self) -> bool {
        match open_append(&self.path) {
            Ok(file) => {
                self.file = Some(file);
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not reopen csv file");
                false
            }
        }
    }

    fn rotate_if_full(&mut self) {
        let size = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not stat csv file");
                return;
            }
        };
        if size <= self.max_file_size {
            return;
        }

        info!(
            path = %self.path.display(),
            max_size_mb = %format!("{:.3}", self.max_file_size as f64 / 1024.0 / 1024.0),
            "max file size reached, rolling files"
        );
        self.close();
        if let Err(e) = self.roll_files() {
            warn!(path = %self.path.display(), error = %e, "rolling files failed");
        }
        self.reopen_current();
    }

    fn roll_files(&self) -> io::Result<()> {
        for n in (1..=self.max_file_count).rev() {
            let backup = self.backup_path(n);
            if !backup.exists() {
                continue;
            }
            if n == self.max_file_count {
                fs::remove_file(&backup)?;
                debug!(backup = n, "removed oldest backup");
            } else {
                fs::rename(&backup, self.backup_path(n + 1))?;
                debug!(from = n, to = n + 1, "shifted backup");
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;
        Ok(())
    }
}

impl Sink for CsvWriter {
    fn write(&mut self, record: &Record) -> bool {
        self.write_row(record)
    }

    fn close(&mut self) -> bool {
        CsvWriter::close(self)
    }
}

impl Drop for CsvWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(DELIMITER)
        .terminator(Terminator::CRLF)
        .quote_style(QuoteStyle::Necessary);
    builder
}

fn open_append(path: &Path) -> io::Result<Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    let mut writer = writer_builder().from_writer(file);
    if is_empty {
        writer.write_record(HEADER)?;
        writer.flush()?;
    }
    Ok(writer)
}

/// `dir/name(n).ext` for `dir/name.ext`, split at the last `.` of the file
/// name. `None` if the file name has no `.`.
fn backup_name(path: &Path, n: u32) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let dot = file_name.rfind('.')?;
    Some(path.with_file_name(format!(
        "{}({n}){}",
        &file_name[..dot],
        &file_name[dot..]
    )))
}

/// Format one CSV row including the line terminator.
pub fn format_row<I, T>(fields: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = writer_builder().from_writer(Vec::new());
    if writer.write_record(fields).is_err() {
        return String::new();
    }
    match writer.into_inner() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
