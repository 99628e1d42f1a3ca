//! Error type shared by every filesystem view.

use std::fmt;
use thiserror::Error;

use crate::vfs::path;

/// The operation that failed, as reported in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Read,
    ReadDir,
    ReadFile,
    Sub,
    Close,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Open => "open",
            Op::Read => "read",
            Op::ReadDir => "readdir",
            Op::ReadFile => "readfile",
            Op::Sub => "sub",
            Op::Close => "close",
        })
    }
}

/// Why an operation failed.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Malformed or unsafe path argument
    #[error("invalid argument")]
    InvalidPath,
    #[error("file does not exist")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("permission denied")]
    PermissionDenied,
    /// The handle was closed before this call
    #[error("file already closed")]
    Closed,
    /// Unexpected HTTP response status
    #[error("HTTP status {0}")]
    Status(u16),
    /// Decompression, checksum or underlying source failure
    #[error("{0:#}")]
    Io(anyhow::Error),
}

/// A failed operation on a path.
///
/// The path is always the one the caller passed to the view that
/// reported the error; sub-tree views rewrite it before returning.
#[derive(Debug, Error)]
#[error("{op} {path}: {kind}")]
pub struct FsError {
    pub op: Op,
    pub path: String,
    pub kind: ErrorKind,
}

impl FsError {
    pub fn new(op: Op, path: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            op,
            path: path.into(),
            kind,
        }
    }

    pub fn io(op: Op, path: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
        Self::new(op, path, ErrorKind::Io(err.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    /// Make the reported path relative to `prefix`.
    pub(crate) fn rebase(mut self, prefix: &str) -> Self {
        self.path = path::strip_prefix(&self.path, prefix);
        self
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_op_and_path() {
        let err = FsError::new(Op::ReadDir, "a/b", ErrorKind::NotFound);
        assert_eq!(err.to_string(), "readdir a/b: file does not exist");
    }

    #[test]
    fn rebase_strips_prefix() {
        let err = FsError::new(Op::Open, "a/b/c.txt", ErrorKind::NotFound).rebase("a/b");
        assert_eq!(err.path, "c.txt");
        let err = FsError::new(Op::ReadFile, "a/b", ErrorKind::IsADirectory).rebase("a/b");
        assert_eq!(err.path, ".");
    }
}
