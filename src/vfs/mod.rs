//! Hierarchical read-only views over ZIP archives.
//!
//! ZIP archives store a flat list of member paths. [`ZipFs`] turns that
//! list into a directory tree once, at construction, and answers every
//! later request from the resulting immutable index:
//!
//! - [`ReadFs::open`] returns a [`Handle`] over a file or a directory
//! - [`ReadFs::read_dir`] lists a directory, sorted by name
//! - [`ReadFs::read_file`] returns the decompressed contents of a file
//! - [`ReadFs::sub`] re-roots the view at a directory
//!
//! Path arguments are relative and slash-separated, with no empty, `.` or
//! `..` elements; `"."` names the root. See [`path::valid_path`].
//!
//! The index is never mutated after construction, so a filesystem and its
//! views can be shared freely between tasks. Handles carry their own
//! cursor state and belong to one caller at a time.

pub mod path;

mod entry;
mod index;
mod reader;
mod sub;
mod zipfs;

pub use entry::{DirInfo, Entry, FileEntry, FileInfo};
pub use index::{DuplicatePolicy, IndexOptions, Skip};
pub use reader::{DirReader, FileReader, Handle};
pub use sub::SubFs;
pub use zipfs::ZipFs;

use async_trait::async_trait;

use crate::error::FsResult;

/// The operations shared by every archive view.
#[async_trait]
pub trait ReadFs: Send + Sync {
    /// Open a file or directory for reading.
    fn open(&self, name: &str) -> FsResult<Handle>;

    /// List a directory, sorted by name.
    fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>>;

    /// Read a whole file.
    async fn read_file(&self, name: &str) -> FsResult<Vec<u8>>;

    /// View the directory `dir` as a filesystem of its own.
    ///
    /// `"."` returns the receiver itself rather than a new wrapper.
    fn sub(&self, dir: &str) -> FsResult<FsView>;
}

/// Either the root filesystem or a sub-tree of it.
#[derive(Debug, Clone)]
pub enum FsView {
    Root(ZipFs),
    Sub(SubFs),
}

impl FsView {
    /// Prefix of this view inside the archive, `"."` for the root
    pub fn prefix(&self) -> &str {
        match self {
            FsView::Root(_) => path::ROOT,
            FsView::Sub(sub) => sub.prefix(),
        }
    }

    /// The filesystem that owns the index
    pub fn root(&self) -> &ZipFs {
        match self {
            FsView::Root(fs) => fs,
            FsView::Sub(sub) => sub.root(),
        }
    }
}

impl From<ZipFs> for FsView {
    fn from(fs: ZipFs) -> Self {
        FsView::Root(fs)
    }
}

#[async_trait]
impl ReadFs for FsView {
    fn open(&self, name: &str) -> FsResult<Handle> {
        match self {
            FsView::Root(fs) => fs.open(name),
            FsView::Sub(fs) => fs.open(name),
        }
    }

    fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>> {
        match self {
            FsView::Root(fs) => fs.read_dir(name),
            FsView::Sub(fs) => fs.read_dir(name),
        }
    }

    async fn read_file(&self, name: &str) -> FsResult<Vec<u8>> {
        match self {
            FsView::Root(fs) => fs.read_file(name).await,
            FsView::Sub(fs) => fs.read_file(name).await,
        }
    }

    fn sub(&self, dir: &str) -> FsResult<FsView> {
        match self {
            FsView::Root(fs) => fs.sub(dir),
            FsView::Sub(fs) => fs.sub(dir),
        }
    }
}

/// Collect every path below `root` in depth-first, name-sorted order.
///
/// `root` itself is not included. Paths are relative to the view.
pub fn walk<F: ReadFs + ?Sized>(fs: &F, root: &str) -> FsResult<Vec<(String, Entry)>> {
    let mut out = Vec::new();
    walk_into(fs, root, &mut out)?;
    Ok(out)
}

fn walk_into<F: ReadFs + ?Sized>(
    fs: &F,
    dir: &str,
    out: &mut Vec<(String, Entry)>,
) -> FsResult<()> {
    for entry in fs.read_dir(dir)? {
        let child = path::join(dir, entry.name());
        let is_dir = entry.is_dir();
        out.push((child.clone(), entry));
        if is_dir {
            walk_into(fs, &child, out)?;
        }
    }
    Ok(())
}
