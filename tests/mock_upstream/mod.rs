//! In-process mock of the realtime conversation upstream.
//!
//! Accepts a single WebSocket conversation, records every JSON event the
//! client sends, captures the handshake's Authorization header and lets the
//! test push server events or close the connection.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How long `wait_until` polls before giving up
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Text(String),
    Close,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<Value>>,
    authorization: Mutex<Option<String>>,
    request_uri: Mutex<Option<String>>,
    connections: AtomicUsize,
    close_received: AtomicBool,
    disconnected: AtomicBool,
}

/// Handle to a running mock upstream.
pub struct MockUpstream {
    addr: SocketAddr,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl MockUpstream {
    /// Bind to a random local port and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        let (commands, rx) = mpsc::unbounded_channel();

        tokio::spawn(serve(listener, Arc::clone(&shared), rx));

        Self {
            addr,
            shared,
            commands,
        }
    }

    /// Endpoint URL without the model query parameter.
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Push a server event to the connected client.
    pub fn send_event(&self, event: Value) {
        let _ = self.commands.send(Command::Text(event.to_string()));
    }

    /// Push an arbitrary text frame, e.g. malformed JSON.
    pub fn send_raw(&self, text: &str) {
        let _ = self.commands.send(Command::Text(text.to_string()));
    }

    /// Close the conversation from the server side.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Every JSON event received so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.shared.received.lock().clone()
    }

    /// The `type` field of every received event.
    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Received events of one type.
    pub fn received_of(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }

    pub fn authorization(&self) -> Option<String> {
        self.shared.authorization.lock().clone()
    }

    pub fn request_uri(&self) -> Option<String> {
        self.shared.request_uri.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Whether the client sent a close frame.
    pub fn close_received(&self) -> bool {
        self.shared.close_received.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> bool {
        self.shared.disconnected.load(Ordering::SeqCst)
    }

    /// Poll `condition` until it holds or [`WAIT_TIMEOUT`] elapses.
    pub async fn wait_until(&self, condition: impl Fn(&MockUpstream) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition(self)
    }
}

async fn serve(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    // one conversation per mock
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    shared.connections.fetch_add(1, Ordering::SeqCst);

    let capture = Arc::clone(&shared);
    let callback = move |req: &Request, resp: Response| {
        *capture.authorization.lock() = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *capture.request_uri.lock() = Some(req.uri().to_string());
        Ok::<Response, ErrorResponse>(resp)
    };

    let Ok(ws_stream) = accept_hdr_async(stream, callback).await else {
        shared.disconnected.store(true, Ordering::SeqCst);
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    let created = json!({
        "type": "session.created",
        "session": {"id": "sess_mock", "model": "mock-realtime"}
    });
    let _ = write.send(Message::Text(created.to_string().into())).await;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(&text) {
                        shared.received.lock().push(value);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    shared.close_received.store(true, Ordering::SeqCst);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            command = commands.recv() => match command {
                Some(Command::Text(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    // wait for the client's close reply
                    while let Some(Ok(msg)) = read.next().await {
                        if let Message::Close(_) = msg {
                            shared.close_received.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                    break;
                }
                None => break,
            },
        }
    }

    shared.disconnected.store(true, Ordering::SeqCst);
}

/// Find a port with nothing listening on it.
pub fn find_available_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
