//! Canned HTTP responder standing in for an Ollama server in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serves the given `(status, body)` pairs in order, repeating the last one.
pub struct CannedServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl CannedServer {
    /// Bind to an ephemeral port and start answering. Must run inside a runtime.
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses
                    .get(n)
                    .or_else(|| responses.last())
                    .cloned()
                    .unwrap_or((500, String::new()));

                read_request(&mut stream).await;
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, hits }
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Body of a successful `/api/chat` reply carrying `content`.
pub fn chat_reply(content: &str) -> String {
    serde_json::json!({
        "model": "test-model",
        "message": {"role": "assistant", "content": content},
        "done": true
    })
    .to_string()
}

/// Drain headers and a `Content-Length` body so the client sees a clean close.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}
