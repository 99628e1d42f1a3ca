//! Client for the Go module proxy protocol.
//!
//! A proxy serves, for every module path:
//!
//! - `<module>/@latest`: JSON info about the latest version
//! - `<module>/@v/list`: known versions, one per line
//! - `<module>/@v/<version>.info`: JSON info about one version
//! - `<module>/@v/<version>.mod`: the `go.mod` file
//! - `<module>/@v/<version>.zip`: the sources, every path prefixed with
//!   `<module>@<version>/`
//!
//! See <https://go.dev/ref/mod#goproxy-protocol>.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::error::{ErrorKind, FsError, Op};
use crate::httpfs::HttpFs;
use crate::io::LocalFileReader;
use crate::vfs::path;
use crate::vfs::{FsView, ReadFs, ZipFs};

/// Version metadata as served by `.info` and `@latest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Entry point to a module proxy
#[derive(Debug, Clone)]
pub struct ModFs {
    fs: Arc<HttpFs>,
}

impl ModFs {
    pub fn new(fs: HttpFs) -> Self {
        Self { fs: Arc::new(fs) }
    }

    async fn decode_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let body = self.fs.read_file(name).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            bail!("{name}: JSON expected");
        }
        // Trailing values are rejected by the deserializer.
        serde_json::from_slice(&body).with_context(|| format!("{name}: invalid JSON"))
    }

    /// Look up a module and its latest version.
    pub async fn open_module(&self, module: &str) -> Result<Module> {
        if !path::valid_path(module) || module == path::ROOT {
            return Err(FsError::new(Op::Open, module, ErrorKind::InvalidPath).into());
        }
        let latest = self.decode_json(&format!("{module}/@latest")).await?;
        Ok(Module {
            proxy: self.clone(),
            path: module.to_string(),
            latest,
        })
    }
}

/// A module known to the proxy
#[derive(Debug, Clone)]
pub struct Module {
    proxy: ModFs,
    path: String,
    latest: VersionInfo,
}

impl Module {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn latest(&self) -> &VersionInfo {
        &self.latest
    }

    /// Versions listed by the proxy, in the order served.
    pub async fn list_versions(&self) -> Result<Vec<String>> {
        let name = format!("{}/@v/list", self.path);
        let body = self.proxy.fs.read_file(&name).await?;
        let text = String::from_utf8(body).with_context(|| format!("{name}: not UTF-8"))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn version(&self, version: &str) -> Result<Version> {
        if version.is_empty() || version.contains(['/', '\\', ' ', '\t', '\r', '\n', '\0']) {
            bail!("{}: invalid version {:?}", self.path, version);
        }

        if version == self.latest.version {
            return Ok(Version {
                module: self.clone(),
                info: self.latest.clone(),
            });
        }

        let info = self
            .proxy
            .decode_json(&format!("{}/@v/{}.info", self.path, version))
            .await?;
        Ok(Version {
            module: self.clone(),
            info,
        })
    }

    pub async fn version_latest(&self) -> Result<Version> {
        self.version(&self.latest.version).await
    }
}

/// One version of a module
#[derive(Debug, Clone)]
pub struct Version {
    module: Module,
    info: VersionInfo,
}

impl Version {
    pub fn info(&self) -> &VersionInfo {
        &self.info
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn resource(&self, ext: &str) -> String {
        format!("{}/@v/{}.{}", self.module.path, self.info.version, ext)
    }

    /// Content of the version's `go.mod`
    pub async fn go_mod(&self) -> Result<Vec<u8>> {
        Ok(self.module.proxy.fs.read_file(&self.resource("mod")).await?)
    }

    /// Download the source archive and view it without its
    /// `<module>@<version>/` prefix.
    ///
    /// The archive is staged in a temporary file, removed once the returned
    /// view and everything derived from it are dropped.
    pub async fn open_fs(&self) -> Result<FsView> {
        let name = self.resource("zip");
        let mut body = self.module.proxy.fs.open(&name).await?;

        let temp = tempfile::Builder::new()
            .prefix("modfs_")
            .suffix(".zip")
            .tempfile()
            .with_context(|| format!("{name}: staging archive"))?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);

        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .with_context(|| format!("{name}: staging archive"))?;
            total += n as u64;
        }
        out.flush().await?;
        body.close();
        tracing::debug!(%name, bytes = total, "staged module archive");

        let reader = Arc::new(LocalFileReader::from_tempfile(temp)?);
        let zipfs = ZipFs::new(reader)
            .await
            .with_context(|| format!("{name}: reading archive"))?;

        let prefix = format!("{}@{}", self.module.path, self.info.version);
        zipfs
            .sub(&prefix)
            .with_context(|| format!("{name}: missing {prefix}/ in archive"))
    }
}
