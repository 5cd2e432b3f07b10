//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use prefix_proxy::config::{ProxyConfig, RouteConfig};
use prefix_proxy::lifecycle::Shutdown;
use prefix_proxy::HttpServer;

/// Build a route config with the defaults the schema would apply.
#[allow(dead_code)]
pub fn route(name: &str, prefix: &str, target: &str) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        prefix: prefix.to_string(),
        target: target.to_string(),
        change_origin: true,
        secure: true,
        ws: false,
        path_rewrite: Vec::new(),
        header_hooks: Vec::new(),
    }
}

/// Spawn the proxy on an ephemeral port. Triggering the returned
/// `Shutdown` handle tears it down.
pub async fn spawn_proxy(mut config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(config).expect("proxy init");
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// Start a mock backend that answers 200 and echoes the received request
/// head (request line + headers, CRLF folded to LF) and body in the
/// response body. Returns the address and a hit counter.
#[allow(dead_code)]
pub async fn start_echo_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 1024];
                let head_end = loop {
                    match socket.read(&mut tmp).await {
                        Ok(0) => return,
                        Ok(n) => {
                            buf.extend_from_slice(&tmp[..n]);
                            if let Some(pos) = find_head_end(&buf) {
                                break pos;
                            }
                        }
                        Err(_) => return,
                    }
                };

                let head = String::from_utf8_lossy(&buf[..head_end]).replace("\r\n", "\n");
                let mut echo = head.clone();

                if let Some(len) = content_length(&head) {
                    let mut body = buf[head_end + 4..].to_vec();
                    while body.len() < len {
                        match socket.read(&mut tmp).await {
                            Ok(0) => break,
                            Ok(n) => body.extend_from_slice(&tmp[..n]),
                            Err(_) => return,
                        }
                    }
                    echo.push_str("\n\nbody=");
                    echo.push_str(&String::from_utf8_lossy(&body));
                }

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    echo.len(),
                    echo
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Start a mock WebSocket backend that echoes text and binary frames.
#[allow(dead_code)]
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Start a mock backend that refuses every request with the given status
/// line (e.g. "403 Forbidden"). Used to exercise upgrade rejection.
#[allow(dead_code)]
pub async fn start_rejecting_backend(status_line: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 1024];
                loop {
                    match socket.read(&mut tmp).await {
                        Ok(0) => return,
                        Ok(n) => {
                            buf.extend_from_slice(&tmp[..n]);
                            if find_head_end(&buf).is_some() {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
