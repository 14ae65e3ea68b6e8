//! Developer harness for the text tap protocol.
//!
//! Connects to a running core's tap socket and issues protocol requests
//! from the command line, printing the JSON replies. `subscribe` keeps the
//! connection open and streams server broadcasts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "tap-harness",
    about = "Send text tap protocol requests to a running termania core"
)]
struct Args {
    /// Path of the tap socket.
    #[arg(long, default_value = "/tmp/termania.sock")]
    socket: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask for the pane count.
    ListPanes,
    /// Send text to one pane's PTY.
    Send {
        #[arg(long)]
        pane: u32,
        text: String,
    },
    /// Send text to every pane's PTY.
    SendAll { text: String },
    /// Queue a notification.
    Notify { title: String, body: String },
    /// Queue a typed action; extra fields are given as key=value pairs.
    Action {
        action: String,
        /// Action fields, e.g. pane=0 command='ls -la'.
        fields: Vec<String>,
    },
    /// Subscribe and stream broadcasts until interrupted.
    Subscribe,
    /// Send a raw JSON line verbatim.
    Raw { line: String },
}

fn main() -> Result<()> {
    termania::debug::init_log_bridge();
    let args = Args::parse();

    let stream = UnixStream::connect(&args.socket)
        .with_context(|| format!("connecting to {}", args.socket))?;

    let request = match &args.command {
        Command::ListPanes => json!({"type": "list_panes"}).to_string(),
        Command::Send { pane, text } => {
            json!({"type": "send", "pane": pane, "text": text}).to_string()
        }
        Command::SendAll { text } => json!({"type": "send_all", "text": text}).to_string(),
        Command::Notify { title, body } => {
            json!({"type": "action", "action": "notify", "title": title, "body": body})
                .to_string()
        }
        Command::Action { action, fields } => build_action_request(action, fields)?,
        Command::Subscribe => json!({"type": "subscribe"}).to_string(),
        Command::Raw { line } => line.clone(),
    };

    send_line(&stream, &request)?;

    let mut reader = BufReader::new(stream.try_clone()?);
    if matches!(args.command, Command::Subscribe) {
        // First line is the subscription ack, then broadcasts stream until
        // the server goes away or the user interrupts.
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            print!("{line}");
            std::io::stdout().flush()?;
            line.clear();
        }
    } else {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("setting read timeout")?;
        let mut reply = String::new();
        reader.read_line(&mut reply).context("reading reply")?;
        print!("{reply}");
    }

    Ok(())
}

fn send_line(mut stream: &UnixStream, line: &str) -> Result<()> {
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\n")?;
    Ok(())
}

/// Build an `action` request from `key=value` arguments. Values that parse
/// as non-negative integers are sent as numbers, everything else as
/// strings.
fn build_action_request(action: &str, fields: &[String]) -> Result<String> {
    let mut obj = serde_json::Map::new();
    obj.insert("type".to_string(), json!("action"));
    obj.insert("action".to_string(), json!(action));
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .with_context(|| format!("field {field:?} is not key=value"))?;
        let value = match value.parse::<u64>() {
            Ok(number) => json!(number),
            Err(_) => json!(value),
        };
        obj.insert(key.to_string(), value);
    }
    Ok(serde_json::Value::Object(obj).to_string())
}
