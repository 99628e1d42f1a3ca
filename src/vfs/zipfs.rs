use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::entry::{Entry, FileEntry};
use super::index::{Index, IndexOptions};
use super::path::{self, ROOT};
use super::reader::{DirReader, FileReader, Handle};
use super::sub::SubFs;
use super::{FsView, ReadFs};
use crate::error::{ErrorKind, FsError, FsResult, Op};
use crate::io::ReadAt;
use crate::zip::{EntryStream, ZipExtractor};

struct Inner {
    extractor: ZipExtractor<dyn ReadAt>,
    index: Index,
}

/// Read-only filesystem over a ZIP archive.
///
/// The directory tree is built once, when the value is created; every
/// later call is a lookup against that immutable index. Cloning is cheap
/// and all clones, sub-tree views and open handles share one index.
#[derive(Clone)]
pub struct ZipFs {
    inner: Arc<Inner>,
}

impl ZipFs {
    /// Index the archive behind `reader` with default options.
    pub async fn new(reader: Arc<dyn ReadAt>) -> Result<Self> {
        Self::with_options(reader, IndexOptions::default()).await
    }

    pub async fn with_options(reader: Arc<dyn ReadAt>, options: IndexOptions) -> Result<Self> {
        let extractor = ZipExtractor::new(reader);
        let records = extractor.list_files().await?;
        let total = records.len();
        let index = Index::build(records, options)?;

        tracing::debug!(
            records = total,
            files = index.file_count(),
            dirs = index.dir_count(),
            skipped = index.skipped(),
            "indexed zip archive"
        );

        Ok(Self {
            inner: Arc::new(Inner { extractor, index }),
        })
    }

    /// Whether two values share the same underlying index.
    pub fn ptr_eq(a: &ZipFs, b: &ZipFs) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn file_count(&self) -> usize {
        self.inner.index.file_count()
    }

    /// Number of directories, the root included
    pub fn dir_count(&self) -> usize {
        self.inner.index.dir_count()
    }

    /// Number of archive records left out of the tree
    pub fn skipped(&self) -> usize {
        self.inner.index.skipped()
    }

    pub(crate) async fn open_stream(&self, file: &FileEntry) -> Result<EntryStream<dyn ReadAt>> {
        self.inner.extractor.open_stream(file.record()).await
    }

    fn check(op: Op, name: &str) -> FsResult<()> {
        if path::valid_path(name) {
            Ok(())
        } else {
            Err(FsError::new(op, name, ErrorKind::InvalidPath))
        }
    }
}

impl fmt::Debug for ZipFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipFs")
            .field("files", &self.file_count())
            .field("dirs", &self.dir_count())
            .finish()
    }
}

#[async_trait]
impl ReadFs for ZipFs {
    fn open(&self, name: &str) -> FsResult<Handle> {
        Self::check(Op::Open, name)?;
        let index = &self.inner.index;

        if let Some(dir) = index.dir(name) {
            let reader = DirReader::new(name, dir.info.clone(), dir.children.clone());
            return Ok(Handle::Dir(reader));
        }
        if let Some(file) = index.file(name) {
            let reader = FileReader::new(self.clone(), name, Arc::clone(file));
            return Ok(Handle::File(reader));
        }
        Err(FsError::new(Op::Open, name, ErrorKind::NotFound))
    }

    fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>> {
        Self::check(Op::ReadDir, name)?;
        let index = &self.inner.index;

        match index.dir(name) {
            Some(dir) => {
                let mut entries = dir.children.clone();
                entries.sort_by(|a, b| a.name().cmp(b.name()));
                Ok(entries)
            }
            None if index.file(name).is_some() => {
                Err(FsError::new(Op::ReadDir, name, ErrorKind::NotADirectory))
            }
            None => Err(FsError::new(Op::ReadDir, name, ErrorKind::NotFound)),
        }
    }

    async fn read_file(&self, name: &str) -> FsResult<Vec<u8>> {
        Self::check(Op::ReadFile, name)?;
        let index = &self.inner.index;

        let Some(file) = index.file(name) else {
            let kind = if index.dir(name).is_some() {
                ErrorKind::IsADirectory
            } else {
                ErrorKind::NotFound
            };
            return Err(FsError::new(Op::ReadFile, name, kind));
        };

        self.inner
            .extractor
            .extract_to_memory(file.record())
            .await
            .map_err(|e| FsError::io(Op::ReadFile, name, e))
    }

    fn sub(&self, dir: &str) -> FsResult<FsView> {
        Self::check(Op::Sub, dir)?;
        if dir == ROOT {
            return Ok(FsView::Root(self.clone()));
        }

        let index = &self.inner.index;
        if index.dir(dir).is_some() {
            return Ok(FsView::Sub(SubFs::new(self.clone(), dir)));
        }
        let kind = if index.file(dir).is_some() {
            ErrorKind::NotADirectory
        } else {
            ErrorKind::NotFound
        };
        Err(FsError::new(Op::Sub, dir, kind))
    }
}
