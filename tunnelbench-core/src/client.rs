use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt as _;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::message::{BodyMode, MessageReader};
use crate::target::TargetUrl;

/// Identifies this tool on both the CONNECT handshake and the tunneled request.
pub const USER_AGENT: &str = concat!("tunnelbench/", env!("CARGO_PKG_VERSION"));

/// Outcome of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub success: bool,
    /// Elapsed milliseconds from connect through close, present whenever the
    /// clock was started (including failures).
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

/// Executes single CONNECT-tunneled requests against one proxy.
///
/// Every unit of work opens and tears down its own proxy connection; nothing
/// is reused between requests.
#[derive(Debug, Clone)]
pub struct TunnelClient {
    proxy_host: String,
    proxy_port: u16,
    timeout: Duration,
}

impl TunnelClient {
    pub fn new(proxy_host: impl Into<String>, proxy_port: u16, timeout: Duration) -> Self {
        Self {
            proxy_host: proxy_host.into(),
            proxy_port,
            timeout,
        }
    }

    /// One full unit of work: connect to the proxy, negotiate the tunnel,
    /// send a GET, read the response, close.
    ///
    /// Failures at any step become a failed outcome; nothing propagates out
    /// of this call, so a bad request never takes a worker down with it.
    pub async fn execute(&self, target: &TargetUrl) -> RequestOutcome {
        let started = Instant::now();
        let result = self.tunneled_get(target).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(status) if (200..300).contains(&status) => RequestOutcome {
                success: true,
                latency_ms: Some(latency_ms),
                error: None,
            },
            Ok(status) => RequestOutcome {
                success: false,
                latency_ms: Some(latency_ms),
                error: Some(format!("http_status={status}")),
            },
            Err(err) => RequestOutcome {
                success: false,
                latency_ms: Some(latency_ms),
                error: Some(err.to_string()),
            },
        }
    }

    async fn tunneled_get(&self, target: &TargetUrl) -> Result<u16> {
        let mut stream = timeout(
            self.timeout,
            TcpStream::connect((self.proxy_host.as_str(), self.proxy_port)),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(Error::Connect)?;

        let (read_half, mut write_half) = stream.split();
        let mut reader = MessageReader::new(read_half, self.timeout);

        let connect_req = format!(
            "CONNECT {host}:{port} HTTP/1.1\r\n\
             Host: {host_header}\r\n\
             User-Agent: {USER_AGENT}\r\n\
             Proxy-Connection: keep-alive\r\n\
             \r\n",
            host = target.host,
            port = target.port,
            host_header = target.host_header,
        );
        write_half.write_all(connect_req.as_bytes()).await?;

        let connect_reply = reader.read_message(BodyMode::HeaderOnly).await?;
        if connect_reply.status != 200 {
            return Err(Error::TunnelRejected(connect_reply.status));
        }

        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host_header}\r\n\
             User-Agent: {USER_AGENT}\r\n\
             Accept: */*\r\n\
             Connection: close\r\n\
             \r\n",
            path = target.path,
            host_header = target.host_header,
        );
        write_half.write_all(request.as_bytes()).await?;

        let response = reader.read_message(BodyMode::Auto).await?;

        drop(reader);
        drop(write_half);
        // Connections are never reused, so closing errors are irrelevant.
        let _ = stream.shutdown().await;

        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn read_header(socket: &mut TcpStream) -> String {
        let mut buf = vec![0u8; 4096];
        let mut n = 0;
        loop {
            let r = socket.read(&mut buf[n..]).await.unwrap();
            assert!(r > 0, "peer closed before header end");
            n += r;
            if buf[..n].windows(4).any(|w| w == b"\r\n\r\n") {
                return String::from_utf8_lossy(&buf[..n]).to_string();
            }
        }
    }

    #[tokio::test]
    async fn rejected_connect_is_labeled_and_sends_no_get() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stub = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let connect_head = read_header(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();

            // Anything arriving now would be the tunneled GET.
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
            (connect_head, rest)
        });

        let client = TunnelClient::new("127.0.0.1", addr.port(), TIMEOUT);
        let target = TargetUrl::parse("http://example.com/ping").unwrap();
        let outcome = client.execute(&target).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("connect_status=407"));
        assert!(outcome.latency_ms.is_some());

        let (connect_head, rest) = stub.await.unwrap();
        assert!(connect_head.starts_with("CONNECT example.com:80 HTTP/1.1\r\n"));
        assert!(rest.is_empty(), "no GET must follow a rejected CONNECT");
    }

    #[tokio::test]
    async fn accepted_tunnel_carries_the_get_and_classifies_2xx() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stub = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _connect_head = read_header(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                .await
                .unwrap();

            let get_head = read_header(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nOK\n")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
            get_head
        });

        let client = TunnelClient::new("127.0.0.1", addr.port(), TIMEOUT);
        let target = TargetUrl::parse("http://example.com:9090/fast?x=1").unwrap();
        let outcome = client.execute(&target).await;

        assert!(outcome.success, "outcome: {outcome:?}");
        assert!(outcome.error.is_none());
        assert!(outcome.latency_ms.unwrap() > 0.0);

        let get_head = stub.await.unwrap();
        assert!(get_head.starts_with("GET /fast?x=1 HTTP/1.1\r\n"));
        assert!(get_head.contains("Host: example.com:9090\r\n"));
        assert!(get_head.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn non_2xx_response_is_labeled_with_its_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_header(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                .await
                .unwrap();
            let _ = read_header(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let client = TunnelClient::new("127.0.0.1", addr.port(), TIMEOUT);
        let target = TargetUrl::parse("http://example.com/").unwrap();
        let outcome = client.execute(&target).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("http_status=503"));
    }

    #[tokio::test]
    async fn unreachable_proxy_yields_a_failed_outcome() {
        // Bind-then-drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TunnelClient::new("127.0.0.1", addr.port(), Duration::from_millis(500));
        let target = TargetUrl::parse("http://example.com/").unwrap();
        let outcome = client.execute(&target).await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(outcome.latency_ms.is_some());
    }
}
