use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt as _};

use crate::error::{Error, Result};

const CHUNK: usize = 64 * 1024;
const HEADER_END: &[u8] = b"\r\n\r\n";

/// How to treat the bytes after a message's header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Consume a body per `Content-Length`, or to connection close without one.
    Auto,
    /// Header block only. A CONNECT reply has no body regardless of any
    /// `Content-Length`, and the bytes that follow belong to the tunnel.
    HeaderOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpMessage {
    /// Parsed status code, 0 when the status line is malformed.
    pub status: u16,
    /// Declared `Content-Length`, when present and parseable.
    pub content_length: Option<u64>,
}

/// Reads HTTP/1.1 messages off a byte stream with a bounded per-read wait.
///
/// Surplus bytes past a message boundary stay buffered for the next call, so
/// a `Content-Length` body never swallows the following message's bytes.
#[derive(Debug)]
pub struct MessageReader<S> {
    stream: S,
    buf: Vec<u8>,
    timeout: Duration,
}

impl<S: AsyncRead + Unpin> MessageReader<S> {
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            timeout,
        }
    }

    /// Read one message: status line + header block, then the body per `mode`.
    ///
    /// A missing `Content-Length` means read-to-close; a declared length is
    /// consumed exactly, tolerating the peer closing early.
    pub async fn read_message(&mut self, mode: BodyMode) -> Result<HttpMessage> {
        let header_end = self.fill_until_header_end().await?;
        let header: Vec<u8> = self.buf.drain(..header_end).collect();
        let header_text = String::from_utf8_lossy(&header);

        let status = parse_status_code(&header_text);
        let declared = parse_content_length(&header_text);

        if mode == BodyMode::Auto {
            match declared {
                Some(length) => self.consume_body(length).await?,
                None => self.consume_to_close().await?,
            }
        }

        Ok(HttpMessage {
            status,
            content_length: declared.map(|n| n.max(0) as u64),
        })
    }

    async fn fill_until_header_end(&mut self) -> Result<usize> {
        loop {
            if let Some(end) = find_header_end(&self.buf) {
                return Ok(end);
            }
            if self.read_chunk().await? == 0 {
                return Err(Error::Protocol(
                    "connection closed before end of header".to_string(),
                ));
            }
        }
    }

    async fn consume_body(&mut self, declared: i64) -> Result<()> {
        let mut remaining = declared.max(0) as u64;

        let buffered = remaining.min(self.buf.len() as u64) as usize;
        self.buf.drain(..buffered);
        remaining -= buffered as u64;

        while remaining > 0 {
            let mut chunk = vec![0u8; CHUNK.min(remaining as usize)];
            let n = tokio::time::timeout(self.timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
            if n == 0 {
                // Peer closed early; a short body is tolerated.
                break;
            }
            remaining -= n as u64;
        }
        Ok(())
    }

    async fn consume_to_close(&mut self) -> Result<()> {
        self.buf.clear();
        loop {
            let mut chunk = vec![0u8; CHUNK];
            let n = tokio::time::timeout(self.timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
            if n == 0 {
                return Ok(());
            }
        }
    }

    async fn read_chunk(&mut self) -> Result<usize> {
        let mut chunk = vec![0u8; CHUNK];
        let n = tokio::time::timeout(self.timeout, self.stream.read(&mut chunk))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
        .map(|i| i + HEADER_END.len())
}

fn parse_status_code(header: &str) -> u16 {
    let status_line = header.lines().next().unwrap_or("");
    let code = status_line.splitn(3, ' ').nth(1).unwrap_or("");
    if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
        code.parse().unwrap_or(0)
    } else {
        0
    }
}

// Last occurrence wins; an unparseable value clears any earlier one.
fn parse_content_length(header: &str) -> Option<i64> {
    let mut length = None;
    for line in header.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            length = value.trim().parse::<i64>().ok();
        }
    }
    length
}
