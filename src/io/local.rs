use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};

/// Local file reader with random access support
pub struct LocalFileReader {
    file: std::fs::File,
    size: u64,
    // Removes the staged file once the reader goes away.
    _temp: Option<TempPath>,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            _temp: None,
        })
    }

    /// Take ownership of a staged temporary file.
    ///
    /// The file is deleted from disk when the reader is dropped.
    pub fn from_tempfile(temp: NamedTempFile) -> Result<Self> {
        let (file, path) = temp.into_parts();
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            _temp: Some(path),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, offset)?)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file.read(buf)?)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"staged bytes").unwrap();
        let path = temp.path().to_path_buf();

        let reader = LocalFileReader::from_tempfile(temp).unwrap();
        assert_eq!(reader.size(), 12);
        let mut buf = [0u8; 5];
        reader.read_exact_at(7, &mut buf).await.unwrap();
        assert_eq!(&buf, b"bytes");

        drop(reader);
        assert!(!path.exists());
    }
}
