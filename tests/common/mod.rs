//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use capture_echo::config::{BackendKind, CaptureConfig};
use capture_echo::net::Listener;
use capture_echo::{CaptureDocument, CaptureServer, CapturedRequest, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A capture server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), capture_echo::net::ListenerError>>,
}

/// Config for a test server using `backend`.
pub fn config(backend: BackendKind) -> CaptureConfig {
    let mut config = CaptureConfig::default();
    config.backend = backend;
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.idle_secs = 5;
    config.timeouts.drain_secs = 1;
    config
}

pub async fn start(backend: BackendKind) -> TestServer {
    start_with(config(backend)).await
}

pub async fn start_with(config: CaptureConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(CaptureServer::new(config).run(listener, signal));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Write raw bytes on a fresh connection and read until the server closes it.
///
/// The write side stays open; requests must end the connection themselves
/// (`Connection: close` or a failure).
pub async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    out
}

/// Like [`roundtrip`], but half-closes the write side after sending.
pub async fn roundtrip_half_closed(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    out
}

/// Split a buffer of HTTP/1.1 responses into (status, body) pairs.
pub fn responses(mut raw: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    while !raw.is_empty() {
        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut response = httparse::Response::new(&mut headers);
        let head_len = match response.parse(raw).unwrap() {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => panic!("truncated response head"),
        };
        let status = response.code.unwrap();
        let length: usize = response
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-length"))
            .map(|h| std::str::from_utf8(h.value).unwrap().parse().unwrap())
            .unwrap_or(0);

        out.push((status, raw[head_len..head_len + length].to_vec()));
        raw = &raw[head_len + length..];
    }
    out
}

/// Decode a capture document body.
pub fn capture(body: &[u8]) -> CapturedRequest {
    CaptureDocument::from_json(body).unwrap().decode().unwrap()
}

/// Send one request and decode the single capture it produces.
pub async fn capture_one(addr: SocketAddr, raw: &[u8]) -> CapturedRequest {
    let out = roundtrip(addr, raw).await;
    let mut all = responses(&out);
    assert_eq!(all.len(), 1, "expected exactly one response");
    let (status, body) = all.remove(0);
    assert_eq!(status, 200);
    capture(&body)
}
