#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use modfs::{MemoryReader, ZipFs};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Build an archive with the `zip` crate. Names ending in `/` become
/// directory records; files are deflated.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        if let Some(dir) = name.strip_suffix('/') {
            writer.add_directory(dir, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// One record of a hand-built STORED archive
pub struct Raw<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    /// Checksum written to the headers instead of the real one
    pub crc: Option<u32>,
}

impl<'a> Raw<'a> {
    pub fn new(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            crc: None,
        }
    }

    pub fn bad_crc(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            crc: Some(0xDEAD_BEEF),
        }
    }
}

/// Build a STORED archive byte by byte, for records the `zip` crate refuses
/// to write (duplicates, bad checksums, odd names).
pub fn raw_zip(records: &[Raw]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for record in records {
        let crc = record.crc.unwrap_or_else(|| {
            let mut crc = flate2::Crc::new();
            crc.update(record.data);
            crc.sum()
        });
        let offset = out.len() as u32;
        let name = record.name.as_bytes();
        let size = record.data.len() as u32;

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&10u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0x21u16.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(record.data);

        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&10u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0x21u16.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name);
    }

    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

pub async fn memory_fs(bytes: Vec<u8>) -> ZipFs {
    ZipFs::new(Arc::new(MemoryReader::new(bytes))).await.unwrap()
}

/// Minimal HTTP/1.1 server serving fixed resources, one request per
/// connection.
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve `routes` (request path to body). With `ranges`, HEAD advertises
    /// `Accept-Ranges: bytes` and `Range` GETs are answered with 206.
    pub async fn start(routes: HashMap<String, Vec<u8>>, ranges: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let _ = serve(stream, &routes, ranges).await;
                });
            }
        });
        Self { addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: &HashMap<String, Vec<u8>>,
    ranges: bool,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&request);
    let mut lines = text.lines();
    let mut first = lines.next().unwrap_or_default().split_whitespace();
    let method = first.next().unwrap_or_default().to_string();
    let target = first.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();

    let range = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.eq_ignore_ascii_case("range") {
            return None;
        }
        let bounds = value.trim().strip_prefix("bytes=")?;
        let (start, end) = bounds.split_once('-')?;
        Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?))
    });

    let Some(body) = routes.get(&path) else {
        let head = "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\n";
        stream.write_all(head.as_bytes()).await?;
        if method != "HEAD" {
            stream.write_all(b"not found").await?;
        }
        return stream.shutdown().await;
    };

    let accept = if ranges { "Accept-Ranges: bytes\r\n" } else { "" };
    let (status, extra, payload): (&str, String, &[u8]) = match range {
        Some((start, end)) if ranges && start < body.len() => {
            let end = end.min(body.len() - 1);
            (
                "206 Partial Content",
                format!("Content-Range: bytes {}-{}/{}\r\n", start, end, body.len()),
                &body[start..=end],
            )
        }
        _ => ("200 OK", String::new(), body.as_slice()),
    };

    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{accept}{extra}Connection: close\r\n\r\n",
        payload.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(payload).await?;
    }
    stream.shutdown().await
}
