use flate2::{Crc, Decompress, FlushDecompress, Status};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, anyhow, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Compressed bytes fetched from the source per request
const WINDOW_SIZE: usize = 64 * 1024;

/// ZIP entry reader
///
/// Owns the parser and turns Central Directory entries into
/// decompressed byte streams.
pub struct ZipExtractor<R: ReadAt + ?Sized> {
    parser: ZipParser<R>,
}

impl<R: ReadAt + ?Sized> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Open a decompressing, checksum-verifying stream over an entry.
    ///
    /// Only the Local File Header is read here; compressed data is fetched
    /// window by window as the stream is read.
    pub async fn open_stream(&self, entry: &ZipFileEntry) -> Result<EntryStream<R>> {
        if entry.is_encrypted() {
            bail!("{}: encrypted entries are not supported", entry.file_name);
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            bail!(
                "{}: unsupported compression method {} (only STORED and DEFLATE are supported)",
                entry.file_name,
                method
            );
        }

        let data_offset = self.parser.get_data_offset(entry).await?;
        if data_offset
            .checked_add(entry.compressed_size)
            .is_none_or(|end| end > self.parser.size())
        {
            bail!("{}: entry data lies outside the archive", entry.file_name);
        }

        tracing::trace!(
            name = %entry.file_name,
            data_offset,
            compressed_size = entry.compressed_size,
            "opened entry stream"
        );

        Ok(EntryStream::new(
            Arc::clone(self.parser.reader()),
            entry,
            data_offset,
        ))
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut stream = self.open_stream(entry).await?;
        stream.read_to_end().await
    }
}

enum Decoder {
    Stored,
    Deflate(Decompress),
}

/// Decompressed view of one entry.
///
/// Compressed bytes are pulled from the source in windows of at most
/// 64 KiB. Size and CRC-32 are checked against the Central Directory once
/// the data is exhausted. An integrity failure is final: every later read
/// reports it again.
pub struct EntryStream<R: ReadAt + ?Sized> {
    reader: Arc<R>,
    name: String,
    decoder: Decoder,
    /// Source offset of the next window
    offset: u64,
    /// Compressed bytes not yet fetched
    remaining: u64,
    window: Vec<u8>,
    pos: usize,
    /// The deflate stream reported its end marker
    ended: bool,
    crc: Crc,
    produced: u64,
    expected_crc: u32,
    expected_size: u64,
    finished: bool,
    failure: Option<String>,
}

impl<R: ReadAt + ?Sized> EntryStream<R> {
    fn new(reader: Arc<R>, entry: &ZipFileEntry, data_offset: u64) -> Self {
        let decoder = match entry.compression_method {
            CompressionMethod::Deflate => Decoder::Deflate(Decompress::new(false)),
            _ => Decoder::Stored,
        };
        Self {
            reader,
            name: entry.file_name.clone(),
            decoder,
            offset: data_offset,
            remaining: entry.compressed_size,
            window: Vec::new(),
            pos: 0,
            ended: false,
            crc: Crc::new(),
            produced: 0,
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
            finished: false,
            failure: None,
        }
    }

    /// Read decompressed bytes into `buf`; `Ok(0)` marks a verified end.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(reason) = &self.failure {
            bail!("{}: {}", self.name, reason);
        }
        if buf.is_empty() || self.finished {
            return Ok(0);
        }

        loop {
            if self.pos == self.window.len() && self.remaining > 0 && !self.ended {
                self.fill().await?;
            }

            let n = match self.decode(buf) {
                Ok(n) => n,
                Err(reason) => return Err(self.fail(reason)),
            };
            if n > 0 {
                self.crc.update(&buf[..n]);
                self.produced += n as u64;
                if self.produced > self.expected_size {
                    return Err(self.fail("entry is larger than its declared size".to_string()));
                }
                return Ok(n);
            }

            let exhausted = self.pos == self.window.len() && self.remaining == 0;
            if self.ended || exhausted {
                self.verify()?;
                return Ok(0);
            }
        }
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.expected_size.min(1 << 24) as usize);
        let mut chunk = vec![0u8; 32 * 1024];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let len = self.remaining.min(WINDOW_SIZE as u64) as usize;
        self.window.resize(len, 0);
        self.pos = 0;
        if let Err(e) = self.reader.read_exact_at(self.offset, &mut self.window).await {
            self.window.clear();
            return Err(e);
        }
        self.offset += len as u64;
        self.remaining -= len as u64;
        Ok(())
    }

    /// Produce output from the current window.
    fn decode(&mut self, buf: &mut [u8]) -> std::result::Result<usize, String> {
        let input = &self.window[self.pos..];
        match &mut self.decoder {
            Decoder::Stored => {
                let n = buf.len().min(input.len());
                buf[..n].copy_from_slice(&input[..n]);
                self.pos += n;
                Ok(n)
            }
            Decoder::Deflate(inflate) => {
                if self.ended {
                    return Ok(0);
                }
                let (in_before, out_before) = (inflate.total_in(), inflate.total_out());
                let status = inflate
                    .decompress(input, buf, FlushDecompress::None)
                    .map_err(|e| format!("corrupt deflate data: {e}"))?;
                let consumed = (inflate.total_in() - in_before) as usize;
                let produced = (inflate.total_out() - out_before) as usize;
                self.pos += consumed;

                if status == Status::StreamEnd {
                    self.ended = true;
                } else if consumed == 0 && produced == 0 {
                    let starved = self.pos == self.window.len();
                    if !starved || self.remaining == 0 {
                        return Err("unexpected end of deflate data".to_string());
                    }
                }
                Ok(produced)
            }
        }
    }

    fn verify(&mut self) -> Result<()> {
        if self.produced != self.expected_size {
            let reason = format!(
                "size mismatch: expected {} bytes, got {}",
                self.expected_size, self.produced
            );
            return Err(self.fail(reason));
        }
        if self.crc.sum() != self.expected_crc {
            return Err(self.fail("checksum error".to_string()));
        }
        self.finished = true;
        Ok(())
    }

    fn fail(&mut self, reason: String) -> anyhow::Error {
        let err = anyhow!("{}: {}", self.name, reason);
        self.failure = Some(reason);
        err
    }
}
