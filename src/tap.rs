//! The text tap: a newline-framed JSON control channel over a Unix socket.
//!
//! External processes connect to the socket, send one JSON object per line
//! and receive one JSON reply per request. Requests that command the core
//! are turned into [`Action`]s on a queue the controller drains each tick;
//! subscribed clients additionally receive server-initiated broadcasts.
//!
//! Everything here is non-blocking: the server is polled from the
//! controller tick and must never stall it. A slow client can lose
//! broadcasts; that is acceptable, broadcasts are advisory.

use crate::action::parser::action_from_object;
use crate::action::{Action, ContextUsage, RawTarget};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

/// Per-client read buffer bound. A line that exceeds this without a
/// newline is discarded wholesale so one misbehaving client cannot grow
/// memory or starve the others.
const CLIENT_BUF_MAX: usize = 4096;

struct TapClient {
    stream: UnixStream,
    subscribed: bool,
    buf: Vec<u8>,
}

/// Non-blocking Unix-socket server speaking the tap protocol.
pub struct TextTapServer {
    socket_path: PathBuf,
    pane_count: u32,
    running: bool,
    listener: Option<UnixListener>,
    clients: Vec<TapClient>,
    pending: VecDeque<Action>,
}

impl TextTapServer {
    pub fn new(socket_path: impl Into<PathBuf>, pane_count: u32) -> Self {
        Self {
            socket_path: socket_path.into(),
            pane_count,
            running: false,
            listener: None,
            clients: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Keep the advertised pane count in sync with the controller.
    pub fn set_pane_count(&mut self, pane_count: u32) {
        self.pane_count = pane_count;
    }

    /// Bind and listen. Removes a stale socket file first; starting an
    /// already-running server is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding tap socket {}", self.socket_path.display()))?;
        listener
            .set_nonblocking(true)
            .context("setting tap socket non-blocking")?;
        log::info!("text tap listening at {}", self.socket_path.display());
        self.listener = Some(listener);
        self.running = true;
        Ok(())
    }

    /// Close every client, close the listener and remove the socket file.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        for client in &self.clients {
            let _ = client.stream.shutdown(std::net::Shutdown::Both);
        }
        self.clients.clear();
        self.listener = None;
        let _ = std::fs::remove_file(&self.socket_path);
        self.running = false;
        log::info!("text tap stopped");
    }

    /// Accept pending connections, read every client and process complete
    /// lines. Called once per controller tick.
    pub fn poll(&mut self) {
        if !self.running {
            return;
        }

        self.accept_new_clients();

        // Reverse order so eviction by index stays valid.
        for idx in (0..self.clients.len()).rev() {
            if !self.read_client(idx) {
                log::debug!("tap client {idx} disconnected");
                self.clients.remove(idx);
            }
        }
    }

    /// Pop the oldest queued action.
    pub fn pop_action(&mut self) -> Option<Action> {
        self.pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write bytes verbatim to every subscribed client. Write errors are
    /// swallowed; the read path evicts dead clients.
    pub fn broadcast(&mut self, bytes: &[u8]) {
        for client in self.clients.iter_mut().filter(|c| c.subscribed) {
            let _ = client.stream.write_all(bytes);
        }
    }

    /// Broadcast a pane's visible content as a `pane_output` message.
    pub fn broadcast_pane_content(&mut self, pane: u32, content: &str) {
        let mut line = json!({
            "type": "pane_output",
            "pane": pane,
            "content": content,
        })
        .to_string();
        line.push('\n');
        self.broadcast(line.as_bytes());
    }

    fn accept_new_clients(&mut self) {
        let Some(listener) = &self.listener else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        log::warn!("tap: failed to set client non-blocking: {e}");
                        continue;
                    }
                    log::debug!("tap client connected");
                    self.clients.push(TapClient {
                        stream,
                        subscribed: false,
                        buf: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("tap accept error: {e}");
                    break;
                }
            }
        }
    }

    /// Read available bytes from one client and handle complete lines.
    /// Returns `false` when the client should be evicted.
    fn read_client(&mut self, idx: usize) -> bool {
        let mut chunk = [0u8; 1024];
        loop {
            let client = &mut self.clients[idx];
            match client.stream.read(&mut chunk) {
                Ok(0) => return false,
                Ok(n) => {
                    client.buf.extend_from_slice(&chunk[..n]);
                    if client.buf.len() > CLIENT_BUF_MAX && !client.buf.contains(&b'\n') {
                        log::warn!("tap client overflowed its line buffer, resetting");
                        client.buf.clear();
                    }
                    self.process_lines(idx);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("tap read error: {e}");
                    return false;
                }
            }
        }
    }

    fn process_lines(&mut self, idx: usize) {
        loop {
            let line = {
                let client = &mut self.clients[idx];
                let Some(pos) = client.buf.iter().position(|&b| b == b'\n') else {
                    break;
                };
                let line: Vec<u8> = client.buf.drain(..=pos).collect();
                String::from_utf8_lossy(&line[..line.len() - 1])
                    .trim_matches([' ', '\t', '\r'])
                    .to_string()
            };
            if line.is_empty() {
                continue;
            }
            let reply = self.handle_line(idx, &line);
            self.reply(idx, &reply);
        }
    }

    /// Parse and dispatch one request line, producing the reply object.
    fn handle_line(&mut self, idx: usize, line: &str) -> Value {
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("tap: unparseable request: {e}");
                return json!({"error": "parse error"});
            }
        };
        let Some(obj) = request.as_object() else {
            return json!({"error": "parse error"});
        };

        match obj.get("type").and_then(Value::as_str) {
            Some("subscribe") => {
                self.clients[idx].subscribed = true;
                json!({"status": "subscribed"})
            }
            Some("unsubscribe") => {
                self.clients[idx].subscribed = false;
                json!({"status": "unsubscribed"})
            }
            Some("list_panes") => json!({"pane_count": self.pane_count}),
            Some("read_pane") => match obj.get("pane").and_then(Value::as_u64) {
                Some(pane) => json!({"status": "read_pane_queued", "pane": pane}),
                None => json!({"error": "missing pane"}),
            },
            Some("send") => {
                let pane = obj.get("pane").and_then(Value::as_u64);
                let text = obj.get("text").and_then(Value::as_str);
                match (pane, text) {
                    (Some(pane), Some(text)) => {
                        self.pending.push_back(Action::RawSend {
                            target: RawTarget::Pane(pane as u32),
                            bytes: text.to_string(),
                        });
                        json!({"status": "queued"})
                    }
                    _ => json!({"error": "missing pane or text"}),
                }
            }
            Some("send_all") => match obj.get("text").and_then(Value::as_str) {
                Some(text) => {
                    self.pending.push_back(Action::RawSend {
                        target: RawTarget::All,
                        bytes: text.to_string(),
                    });
                    json!({"status": "queued"})
                }
                None => json!({"error": "missing text"}),
            },
            Some("action") => self.handle_action_request(obj),
            Some("context_update") => self.handle_context_update(obj),
            _ => json!({"error": "unknown command"}),
        }
    }

    /// An `action` request carries the action type under `"action"` and the
    /// action's fields inline. Re-tag and reuse the shared constructor so
    /// the tap accepts the full action vocabulary.
    fn handle_action_request(&mut self, obj: &serde_json::Map<String, Value>) -> Value {
        let Some(action_type) = obj.get("action").and_then(Value::as_str) else {
            return json!({"error": "unknown command"});
        };
        let mut retagged = obj.clone();
        retagged.remove("action");
        retagged.insert("type".to_string(), Value::String(action_type.to_string()));

        match action_from_object(&retagged) {
            Some(action) => {
                self.pending.push_back(action);
                json!({"status": "queued"})
            }
            None => json!({"error": "unknown command"}),
        }
    }

    /// `context_update` wraps hook telemetry in a `payload` object:
    /// `payload.context_window.{used,total,used_percentage}` plus
    /// `payload.session_id` and `payload.hook_type`.
    fn handle_context_update(&mut self, obj: &serde_json::Map<String, Value>) -> Value {
        let Some(payload) = obj.get("payload").and_then(Value::as_object) else {
            return json!({"error": "missing payload"});
        };

        let window = payload.get("context_window").and_then(Value::as_object);
        let field = |key: &str| {
            window
                .and_then(|w| w.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };

        let usage = ContextUsage {
            used_tokens: field("used"),
            total_tokens: field("total"),
            percentage: field("used_percentage").min(100) as u8,
            session_id: payload
                .get("session_id")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            is_pre_compact: payload.get("hook_type").and_then(Value::as_str) == Some("PreCompact"),
        };
        self.pending.push_back(Action::ContextUsage(usage));
        json!({"status": "queued"})
    }

    /// Send a one-line JSON reply. Errors are swallowed here; a dead
    /// client is evicted by the next read.
    fn reply(&mut self, idx: usize, value: &Value) {
        let mut line = value.to_string();
        line.push('\n');
        if let Err(e) = self.clients[idx].stream.write_all(line.as_bytes()) {
            log::debug!("tap reply dropped: {e}");
        }
    }
}

impl Drop for TextTapServer {
    fn drop(&mut self) {
        self.stop();
    }
}
