//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use wechat_rag_bridge::wechat::signature;
use wechat_rag_bridge::{BridgeConfig, HttpServer, Shutdown};

pub const TOKEN: &str = "test-token";

/// Minimal view of one HTTP request received by the mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    #[allow(dead_code)]
    pub body: String,
}

/// Start a programmable mock RAGFlow backend on an ephemeral port.
///
/// The closure maps each received request to a `(status, json_body)`
/// pair, so tests can count calls, delay completions, or misbehave.
pub async fn start_mock_ragflow<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            405 => "405 Method Not Allowed",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read one HTTP request (headers + content-length body) off a socket.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let content_length: usize = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Bridge configuration pointed at a mock backend, with timers shrunk
/// for test speed (local reply 1s, no backoff sleeps).
pub fn test_config(ragflow_addr: SocketAddr) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.wechat.token = TOKEN.to_string();
    config.ragflow.base_url = format!("http://{ragflow_addr}");
    config.ragflow.chat_id = "chat-test".to_string();
    config.ragflow.dataset_id = "ds-test".to_string();
    config.retry.max_retries = 1;
    config.retry.retry_interval_secs = 0;
    config.timeouts.local_reply_secs = 1;
    config.timeouts.request_secs = 30;
    config.timeouts.answer_secs = 30;
    config
}

/// Spawn the bridge on an ephemeral port; returns its address and the
/// shutdown handle that stops it.
pub async fn spawn_bridge(config: BridgeConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config).expect("server construction");

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Deliver one signed text message and return the raw XML reply body.
pub async fn send_text(
    client: &reqwest::Client,
    bridge: SocketAddr,
    user: &str,
    msg_id: &str,
    content: &str,
) -> String {
    let timestamp = "1700000000";
    let nonce = "nonce-1";
    let sig = signature::compute(TOKEN, timestamp, nonce);
    let xml = format!(
        "<xml>\
         <ToUserName><![CDATA[gh_bridge]]></ToUserName>\
         <FromUserName><![CDATA[{user}]]></FromUserName>\
         <CreateTime>1700000000</CreateTime>\
         <MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[{content}]]></Content>\
         <MsgId>{msg_id}</MsgId>\
         </xml>"
    );

    client
        .post(format!(
            "http://{bridge}/wechat?signature={sig}&timestamp={timestamp}&nonce={nonce}"
        ))
        .body(xml)
        .send()
        .await
        .expect("bridge unreachable")
        .text()
        .await
        .expect("reply body")
}

/// Pull the CDATA content out of a reply document.
pub fn reply_content(reply: &str) -> String {
    let start = reply
        .find("<Content><![CDATA[")
        .map(|p| p + "<Content><![CDATA[".len())
        .unwrap_or(0);
    let end = reply[start..]
        .find("]]></Content>")
        .map(|p| start + p)
        .unwrap_or(reply.len());
    reply[start..end].to_string()
}
