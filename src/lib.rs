//! # modfs
//!
//! Read-only, hierarchical filesystem views over ZIP archives.
//!
//! A ZIP archive only stores a flat list of member paths. [`ZipFs`] indexes
//! that list once into a directory tree, synthesizing the directories the
//! archive never recorded, and then serves `open`, `read_dir`, `read_file`
//! and `sub` against the immutable index. Archives can come from the local
//! filesystem, from memory, or from an HTTP server through Range requests.
//!
//! Two collaborators build on it:
//!
//! - [`HttpFs`] exposes resources below a base URL as read-only files
//! - [`ModFs`] speaks the Go module proxy protocol and serves a module
//!   version's sources as a [`ZipFs`] sub-tree
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use modfs::{LocalFileReader, ReadFs, ZipFs};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("archive.zip"))?);
//!     let fs = ZipFs::new(reader).await?;
//!
//!     for entry in fs.read_dir(".")? {
//!         println!("{}", entry.info());
//!     }
//!
//!     let docs = fs.sub("docs")?;
//!     let readme = docs.read_file("README.md").await?;
//!     println!("{} bytes", readme.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod httpfs;
pub mod io;
pub mod module;
pub mod vfs;
pub mod zip;

pub use cli::Cli;
pub use error::{ErrorKind, FsError, FsResult, Op};
pub use httpfs::{HttpFile, HttpFs};
pub use io::{HttpOptions, HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use module::{ModFs, Module, Version, VersionInfo};
pub use vfs::{
    DirReader, DuplicatePolicy, Entry, FileInfo, FileReader, FsView, Handle, IndexOptions,
    ReadFs, SubFs, ZipFs,
};
pub use zip::{ZipExtractor, ZipFileEntry};
