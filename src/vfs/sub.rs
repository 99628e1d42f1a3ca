use async_trait::async_trait;

use super::entry::Entry;
use super::path::{self, ROOT};
use super::reader::Handle;
use super::zipfs::ZipFs;
use super::{FsView, ReadFs};
use crate::error::{ErrorKind, FsError, FsResult, Op};

/// A view of one directory of a [`ZipFs`] as if it were the root.
///
/// Requests are prefixed and forwarded straight to the root filesystem;
/// paths in returned handles and errors are made relative again, so
/// callers never see the prefix. Nested views extend the prefix instead
/// of wrapping each other.
#[derive(Debug, Clone)]
pub struct SubFs {
    root: ZipFs,
    prefix: String,
}

impl SubFs {
    pub(crate) fn new(root: ZipFs, prefix: &str) -> Self {
        Self {
            root,
            prefix: prefix.to_string(),
        }
    }

    /// Location of this view inside the archive
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The filesystem every request ends up at
    pub fn root(&self) -> &ZipFs {
        &self.root
    }

    fn resolve(&self, op: Op, name: &str) -> FsResult<String> {
        if !path::valid_path(name) {
            return Err(FsError::new(op, name, ErrorKind::InvalidPath));
        }
        Ok(path::join(&self.prefix, name))
    }
}

#[async_trait]
impl ReadFs for SubFs {
    fn open(&self, name: &str) -> FsResult<Handle> {
        let full = self.resolve(Op::Open, name)?;
        let mut handle = self.root.open(&full).map_err(|e| e.rebase(&self.prefix))?;
        handle.rebase(&self.prefix);
        Ok(handle)
    }

    fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>> {
        let full = self.resolve(Op::ReadDir, name)?;
        self.root.read_dir(&full).map_err(|e| e.rebase(&self.prefix))
    }

    async fn read_file(&self, name: &str) -> FsResult<Vec<u8>> {
        let full = self.resolve(Op::ReadFile, name)?;
        self.root
            .read_file(&full)
            .await
            .map_err(|e| e.rebase(&self.prefix))
    }

    fn sub(&self, dir: &str) -> FsResult<FsView> {
        let full = self.resolve(Op::Sub, dir)?;
        if dir == ROOT {
            return Ok(FsView::Sub(self.clone()));
        }
        self.root.sub(&full).map_err(|e| e.rebase(&self.prefix))
    }
}
