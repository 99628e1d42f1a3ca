use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::zip::ZipFileEntry;

/// Permission bits reported for every directory
const DIR_MODE: u32 = 0o555;
/// Write permission bits, stripped from every file
const WRITE_BITS: u32 = 0o222;

/// Metadata describing a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: u64,
    mode: u32,
    modified: SystemTime,
    is_dir: bool,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size: u64, mode: u32, modified: SystemTime, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            modified,
            is_dir,
        }
    }

    /// Base name of the file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes; zero for directories
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Permission bits (`0o777` mask)
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// The same metadata under another name
    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// `ls -l` style permission string, e.g. `dr-xr-xr-x`
    pub fn mode_string(&self) -> String {
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir { 'd' } else { '-' });
        for shift in [6, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modified: DateTime<Utc> = self.modified.into();
        write!(
            f,
            "{} {:>10} {} {}",
            self.mode_string(),
            self.size,
            modified.format("%Y-%m-%d %H:%M:%S"),
            self.name
        )?;
        if self.is_dir {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// A regular file stored in the archive.
///
/// The archive record doubles as the handle used to open the file's data.
#[derive(Debug)]
pub struct FileEntry {
    name: String,
    compressed_size: u64,
    uncompressed_size: u64,
    modified: SystemTime,
    mode: u32,
    record: ZipFileEntry,
}

impl FileEntry {
    pub(crate) fn new(name: &str, record: ZipFileEntry) -> Self {
        let mode = match record.unix_mode() {
            Some(mode) => mode & 0o777,
            None if record.is_dos_readonly() => 0o444,
            None => 0o666,
        } & !WRITE_BITS;

        Self {
            name: name.to_string(),
            compressed_size: record.compressed_size,
            uncompressed_size: record.uncompressed_size,
            modified: record.modified(),
            mode,
            record,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn record(&self) -> &ZipFileEntry {
        &self.record
    }

    pub fn info(&self) -> FileInfo {
        FileInfo::new(&self.name, self.uncompressed_size, self.mode, self.modified, false)
    }
}

/// A directory, explicit in the archive or synthesized from member paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirInfo {
    pub(crate) name: String,
    pub(crate) modified: SystemTime,
}

impl DirInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn info(&self) -> FileInfo {
        FileInfo::new(&self.name, 0, DIR_MODE, self.modified, true)
    }
}

/// One member of a directory listing.
#[derive(Debug, Clone)]
pub enum Entry {
    File(Arc<FileEntry>),
    Directory(DirInfo),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => file.name(),
            Entry::Directory(dir) => dir.name(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn info(&self) -> FileInfo {
        match self {
            Entry::File(file) => file.info(),
            Entry::Directory(dir) => dir.info(),
        }
    }
}

/// Entries compare by name and kind, which is what listings care about.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.is_dir() == other.is_dir()
    }
}

impl Eq for Entry {}
