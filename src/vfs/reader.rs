//! Per-open handles over files and directories.

use std::fmt;
use std::sync::Arc;

use super::ZipFs;
use super::entry::{DirInfo, Entry, FileEntry, FileInfo};
use super::path::{self, ROOT};
use crate::error::{ErrorKind, FsError, FsResult, Op};
use crate::io::ReadAt;
use crate::zip::EntryStream;

/// Lifecycle of a file handle's decompression stream
enum StreamState {
    Unopened,
    Opened(EntryStream<dyn ReadAt>),
    Closed,
}

/// Read handle over one archive file.
///
/// The decompression stream is opened by the first [`read`](Self::read),
/// not by `open`, so a corrupt entry can be opened and stat'ed and only
/// fails once its data is requested.
pub struct FileReader {
    fs: ZipFs,
    file: Arc<FileEntry>,
    path: String,
    state: StreamState,
}

impl FileReader {
    pub(crate) fn new(fs: ZipFs, path: &str, file: Arc<FileEntry>) -> Self {
        Self {
            fs,
            file,
            path: path.to_string(),
            state: StreamState::Unopened,
        }
    }

    /// Path this handle was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry(&self) -> &FileEntry {
        &self.file
    }

    pub fn stat(&self) -> FileInfo {
        self.file.info()
    }

    /// Read decompressed bytes into `buf`; `Ok(0)` marks the end of the file.
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if let StreamState::Unopened = self.state {
            let stream = self
                .fs
                .open_stream(&self.file)
                .await
                .map_err(|e| FsError::io(Op::Read, &self.path, e))?;
            self.state = StreamState::Opened(stream);
        }

        match &mut self.state {
            StreamState::Opened(stream) => stream
                .read(buf)
                .await
                .map_err(|e| FsError::io(Op::Read, &self.path, e)),
            StreamState::Closed => Err(FsError::new(Op::Read, &self.path, ErrorKind::Closed)),
            StreamState::Unopened => unreachable!("stream opened above"),
        }
    }

    /// Read everything that is left.
    pub async fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.file.uncompressed_size().min(1 << 24) as usize);
        let mut chunk = vec![0u8; 32 * 1024];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Release the stream. Further reads fail with [`ErrorKind::Closed`].
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> FsResult<()> {
        self.state = StreamState::Closed;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed)
    }

    pub(crate) fn rebase(&mut self, prefix: &str) {
        self.path = path::strip_prefix(&self.path, prefix);
    }
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            StreamState::Unopened => "unopened",
            StreamState::Opened(_) => "opened",
            StreamState::Closed => "closed",
        };
        f.debug_struct("FileReader")
            .field("path", &self.path)
            .field("entry", &self.file)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Cursor over a sorted snapshot of one directory's children.
#[derive(Debug, Clone)]
pub struct DirReader {
    info: DirInfo,
    path: String,
    entries: Vec<Entry>,
    pos: usize,
}

impl DirReader {
    pub(crate) fn new(path: &str, info: DirInfo, mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Self {
            info,
            path: path.to_string(),
            entries,
            pos: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stat(&self) -> FileInfo {
        self.info.info()
    }

    /// Return up to `n` further entries; `n == 0` asks for all of them.
    ///
    /// `None` signals the end of the listing; it is never conflated with an
    /// empty batch.
    pub fn read_dir(&mut self, n: usize) -> Option<Vec<Entry>> {
        if self.pos >= self.entries.len() {
            return None;
        }
        if n == 0 {
            return Some(self.read_all());
        }
        let end = self.pos.saturating_add(n).min(self.entries.len());
        let batch = self.entries[self.pos..end].to_vec();
        self.pos = end;
        Some(batch)
    }

    /// Return every entry not yet read, possibly none.
    pub fn read_all(&mut self) -> Vec<Entry> {
        let rest = self.entries[self.pos..].to_vec();
        self.pos = self.entries.len();
        rest
    }

    /// Rewind the cursor. Always succeeds.
    pub fn close(&mut self) -> FsResult<()> {
        self.pos = 0;
        Ok(())
    }

    pub(crate) fn rebase(&mut self, prefix: &str) {
        self.path = path::strip_prefix(&self.path, prefix);
        if self.path == ROOT {
            self.info.name = ROOT.to_string();
        }
    }
}

/// Result of opening a path: either a file or a directory handle.
#[derive(Debug)]
pub enum Handle {
    File(FileReader),
    Dir(DirReader),
}

impl Handle {
    pub fn path(&self) -> &str {
        match self {
            Handle::File(f) => f.path(),
            Handle::Dir(d) => d.path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    pub fn stat(&self) -> FileInfo {
        match self {
            Handle::File(f) => f.stat(),
            Handle::Dir(d) => d.stat(),
        }
    }

    /// Byte reads are only defined for files.
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        match self {
            Handle::File(f) => f.read(buf).await,
            Handle::Dir(d) => Err(FsError::new(Op::Read, d.path(), ErrorKind::IsADirectory)),
        }
    }

    pub async fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        match self {
            Handle::File(f) => f.read_to_end().await,
            Handle::Dir(d) => Err(FsError::new(Op::Read, d.path(), ErrorKind::IsADirectory)),
        }
    }

    pub fn close(&mut self) -> FsResult<()> {
        match self {
            Handle::File(f) => f.close(),
            Handle::Dir(d) => d.close(),
        }
    }

    pub fn into_file(self) -> Option<FileReader> {
        match self {
            Handle::File(f) => Some(f),
            Handle::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<DirReader> {
        match self {
            Handle::Dir(d) => Some(d),
            Handle::File(_) => None,
        }
    }

    pub(crate) fn rebase(&mut self, prefix: &str) {
        match self {
            Handle::File(f) => f.rebase(prefix),
            Handle::Dir(d) => d.rebase(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn dir_entry(name: &str) -> Entry {
        Entry::Directory(DirInfo {
            name: name.to_string(),
            modified: UNIX_EPOCH,
        })
    }

    fn reader(names: &[&str]) -> DirReader {
        let info = DirInfo {
            name: "d".to_string(),
            modified: UNIX_EPOCH,
        };
        DirReader::new("d", info, names.iter().map(|n| dir_entry(n)).collect())
    }

    #[test]
    fn paginates_then_signals_end() {
        let mut dir = reader(&["b", "a"]);
        let first = dir.read_dir(1).unwrap();
        assert_eq!(first[0].name(), "a");
        let second = dir.read_dir(1).unwrap();
        assert_eq!(second[0].name(), "b");
        assert!(dir.read_dir(1).is_none());
        assert!(dir.read_all().is_empty());
    }

    #[test]
    fn unbounded_read_takes_the_rest_then_ends() {
        let mut dir = reader(&["c", "a", "b"]);
        assert_eq!(dir.read_dir(1).unwrap()[0].name(), "a");
        let rest = dir.read_dir(0).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].name(), "c");
        assert!(dir.read_dir(0).is_none());

        let mut batches = 0;
        let mut dir = reader(&["x", "y"]);
        while let Some(batch) = dir.read_dir(0) {
            assert!(!batch.is_empty());
            batches += 1;
        }
        assert_eq!(batches, 1);
    }

    #[test]
    fn empty_directory_ends_immediately() {
        let mut dir = reader(&[]);
        assert!(dir.read_dir(10).is_none());
        assert!(dir.read_all().is_empty());
    }

    #[test]
    fn lexical_case_sensitive_order() {
        let mut dir = reader(&["b", "B", "a", "A"]);
        let names: Vec<_> = dir.read_all().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, ["A", "B", "a", "b"]);
    }

    #[test]
    fn close_rewinds_and_is_idempotent() {
        let mut dir = reader(&["x", "y"]);
        assert_eq!(dir.read_all().len(), 2);
        dir.close().unwrap();
        dir.close().unwrap();
        assert_eq!(dir.read_dir(5).unwrap().len(), 2);
    }
}
