//! Resources of an HTTP server exposed as read-only files.
//!
//! Every path maps to one GET request below a base URL. There is no
//! directory concept: the root cannot be opened and nothing can be listed.

use anyhow::{Context, Result, bail};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::UNIX_EPOCH;

use crate::error::{ErrorKind, FsError, FsResult, Op};
use crate::vfs::FileInfo;
use crate::vfs::path::{self, ROOT};

/// Read-only file accessor backed by HTTP GET requests
#[derive(Debug, Clone)]
pub struct HttpFs {
    client: Client,
    base: Url,
}

impl HttpFs {
    /// Create an accessor rooted at `base_url`.
    ///
    /// The URL must parse and must not carry a fragment.
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).context("invalid base URL")?;
        if base.fragment().is_some() {
            bail!("invalid base URL: no fragment allowed");
        }
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL of the resource stored at `name`
    pub fn url_for(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}/{}", self.base.path().trim_end_matches('/'), name);
        url.set_path(&joined);
        url
    }

    /// Issue the GET request for `name` and return its body as a stream.
    pub async fn open(&self, name: &str) -> FsResult<HttpFile> {
        if !path::valid_path(name) {
            return Err(FsError::new(Op::Open, name, ErrorKind::InvalidPath));
        }
        if name == ROOT {
            return Err(FsError::new(Op::Open, name, ErrorKind::PermissionDenied));
        }

        let url = self.url_for(name);
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FsError::io(Op::Open, name, e))?;

        match response.status() {
            StatusCode::OK => Ok(HttpFile::new(name, response)),
            StatusCode::NOT_FOUND => Err(FsError::new(Op::Open, name, ErrorKind::NotFound)),
            status => Err(FsError::new(Op::Open, name, ErrorKind::Status(status.as_u16()))),
        }
    }

    /// Fetch the whole resource at `name`.
    pub async fn read_file(&self, name: &str) -> FsResult<Vec<u8>> {
        let mut file = self.open(name).await?;
        file.read_to_end().await
    }
}

/// Body of one successful GET response
#[derive(Debug)]
pub struct HttpFile {
    name: String,
    size: Option<u64>,
    response: Option<Response>,
    chunk: Vec<u8>,
    pos: usize,
}

impl HttpFile {
    fn new(name: &str, response: Response) -> Self {
        Self {
            name: name.to_string(),
            size: response.content_length(),
            response: Some(response),
            chunk: Vec::new(),
            pos: 0,
        }
    }

    /// Metadata: base name, Content-Length (0 when unknown), read-only mode.
    pub fn stat(&self) -> FileInfo {
        FileInfo::new(
            path::base(&self.name),
            self.size.unwrap_or(0),
            0o444,
            UNIX_EPOCH,
            false,
        )
    }

    /// Size announced by the server, if any
    pub fn content_length(&self) -> Option<u64> {
        self.size
    }

    /// Read body bytes into `buf`; `Ok(0)` marks the end of the body.
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            let Some(response) = self.response.as_mut() else {
                return Err(FsError::new(Op::Read, &self.name, ErrorKind::Closed));
            };
            match response
                .chunk()
                .await
                .map_err(|e| FsError::io(Op::Read, &self.name, e))?
            {
                Some(bytes) => {
                    self.chunk = bytes.to_vec();
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    pub async fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size.unwrap_or(0).min(1 << 24) as usize);
        let mut buf = vec![0u8; 32 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Drop the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.response = None;
        self.chunk.clear();
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_validation() {
        assert!(HttpFs::new(Client::new(), "http://example.com").is_ok());
        assert!(HttpFs::new(Client::new(), "://invalid").is_err());
        assert!(HttpFs::new(Client::new(), "http://example.com/#frag").is_err());
    }

    #[test]
    fn joins_paths_below_base() {
        let fs = HttpFs::new(Client::new(), "https://proxy.example/cached-only/").unwrap();
        assert_eq!(
            fs.url_for("golang.org/x/mod/@v/list").as_str(),
            "https://proxy.example/cached-only/golang.org/x/mod/@v/list"
        );

        let fs = HttpFs::new(Client::new(), "https://proxy.example").unwrap();
        assert_eq!(fs.url_for("a.txt").as_str(), "https://proxy.example/a.txt");
    }
}
