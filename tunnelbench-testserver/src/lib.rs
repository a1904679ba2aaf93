#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use rand::RngCore as _;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::sleep;

mod proxy;
pub use proxy::ConnectProxy;

pub const PATH_FAST: &str = "/fast";
pub const PATH_DELAY: &str = "/delay";
pub const PATH_BYTES: &str = "/bytes";
pub const PATH_RANDOM_BYTES: &str = "/random-bytes";
pub const PATH_STATUS: &str = "/status";
pub const PATH_CLOSE: &str = "/close";

pub const SERVER_HEADER: &str = "tunnelbench-target/0.1";

const HEADER_END: &[u8] = b"\r\n\r\n";
const CHUNK: usize = 64 * 1024;
const MAX_HEADER_BYTES: usize = 64 * 1024;
const BYTES_CAP: u64 = 50 * 1024 * 1024;
const RANDOM_BYTES_CAP: u64 = 10 * 1024 * 1024;
const HEADER_TIMEOUT: Duration = Duration::from_secs(10);

fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Accept loop: one request per connection, then close. No keep-alive.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let _ = stream.set_nodelay(true);
            handle_connection(stream).await;
        });
    }
}

async fn handle_connection(mut stream: TcpStream) {
    let header = match read_request_header(&mut stream).await {
        Ok(header) => header,
        Err(_) => return,
    };

    let Some((method, raw_path)) = parse_request_line(&header) else {
        let _ = write_response(&mut stream, 400, b"bad request\n").await;
        return;
    };
    let is_head = method == "HEAD";

    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (raw_path.as_str(), ""),
    };

    match path {
        PATH_FAST => {
            let body: &[u8] = if is_head { b"" } else { b"OK\n" };
            let _ = write_response(&mut stream, 200, body).await;
        }
        PATH_DELAY => {
            let ms = query_param(query, "ms").unwrap_or(0);
            if ms > 0 {
                sleep(Duration::from_millis(ms)).await;
            }
            let body: &[u8] = if is_head { b"" } else { b"OK\n" };
            let _ = write_response(&mut stream, 200, body).await;
        }
        PATH_BYTES => {
            let size = query_param(query, "size").unwrap_or(0).min(BYTES_CAP);
            let _ = write_sized_response(&mut stream, 200, size, is_head, fill_filler).await;
        }
        PATH_RANDOM_BYTES => {
            let size = query_param(query, "size").unwrap_or(0).min(RANDOM_BYTES_CAP);
            let _ = write_sized_response(&mut stream, 200, size, is_head, fill_random).await;
        }
        PATH_STATUS => {
            let code = query_param(query, "code")
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(200);
            let body = if is_head {
                String::new()
            } else {
                format!("status={code}\n")
            };
            let _ = write_response(&mut stream, code, body.as_bytes()).await;
        }
        // Abrupt close, no response bytes at all.
        PATH_CLOSE => {}
        _ => {
            let body: &[u8] = if is_head { b"" } else { b"not found\n" };
            let _ = write_response(&mut stream, 404, body).await;
        }
    }
}

pub(crate) async fn read_request_header(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = tokio::time::timeout(HEADER_TIMEOUT, stream.read(&mut chunk))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(HEADER_END.len()).any(|w| w == HEADER_END) {
            return Ok(buf);
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(std::io::ErrorKind::InvalidData.into());
        }
    }
}

// `METHOD target HTTP/major.minor`, method in uppercase letters.
fn parse_request_line(header: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(header);
    let first = text.lines().next()?;

    let mut parts = first.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let version = version.strip_prefix("HTTP/")?;
    let (major, minor) = version.split_once('.')?;
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(major) || !is_digits(minor) {
        return None;
    }

    Some((method.to_string(), target.to_string()))
}

fn query_param(query: &str, key: &str) -> Option<u64> {
    query
        .split('&')
        .find_map(|pair| pair.split_once('=').filter(|(k, _)| *k == key))
        .and_then(|(_, value)| value.parse().ok())
}

async fn write_response(stream: &mut TcpStream, code: u16, body: &[u8]) -> std::io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {code} {reason}\r\n\
         Server: {SERVER_HEADER}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {len}\r\n\
         Connection: close\r\n\
         \r\n",
        reason = reason_phrase(code),
        len = body.len(),
    );
    stream.write_all(headers.as_bytes()).await?;
    if !body.is_empty() {
        stream.write_all(body).await?;
    }
    stream.shutdown().await
}

/// Declares `Content-Length: size` even for HEAD, and streams the body in
/// bounded chunks so large sizes never materialize in one allocation.
async fn write_sized_response(
    stream: &mut TcpStream,
    code: u16,
    size: u64,
    head_only: bool,
    fill: fn(&mut [u8]),
) -> std::io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {code} {reason}\r\n\
         Server: {SERVER_HEADER}\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {size}\r\n\
         Connection: close\r\n\
         \r\n",
        reason = reason_phrase(code),
    );
    stream.write_all(headers.as_bytes()).await?;

    if !head_only && size > 0 {
        let mut chunk = vec![0u8; CHUNK.min(size as usize)];
        let mut remaining = size;
        while remaining > 0 {
            let n = CHUNK.min(remaining as usize);
            fill(&mut chunk[..n]);
            stream.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
        }
    }

    stream.shutdown().await
}

fn fill_filler(buf: &mut [u8]) {
    buf.fill(b'a');
}

fn fill_random(buf: &mut [u8]) {
    rand::rng().fill_bytes(buf);
}

/// In-process target server bound to an ephemeral port.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = serve(listener) => {}
                _ = &mut shutdown_rx => {}
            }
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
