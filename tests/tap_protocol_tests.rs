// Tap protocol scenarios against a live controller: socket in, action
// queue drained by the tick, telemetry surfaced.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};
use termania::controller::Controller;
use termania_config::{Config, PaneEntryConfig};

struct Fixture {
    controller: Controller,
    socket_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Controller with `count` stub panes and a live tap in a temp dir.
fn fixture(count: u32) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("tap.sock");
    let mut config = Config::default();
    config.grid.rows = 1;
    config.grid.cols = count;
    config.text_tap.socket_path = socket_path.to_str().unwrap().to_string();
    config.panes = (0..count)
        .map(|_| PaneEntryConfig {
            pane_type: Some("notes".to_string()),
            ..Default::default()
        })
        .collect();
    Fixture {
        controller: Controller::new(config),
        socket_path,
        _dir: dir,
    }
}

fn connect(fixture: &mut Fixture) -> UnixStream {
    let stream = UnixStream::connect(&fixture.socket_path).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    fixture.controller.poll();
    stream
}

fn request(fixture: &mut Fixture, stream: &mut UnixStream, line: &str) -> Value {
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    loop {
        fixture.controller.poll();
        let mut reply = String::new();
        match reader.read_line(&mut reply) {
            Ok(n) if n > 0 => return serde_json::from_str(&reply).unwrap(),
            _ => {
                assert!(Instant::now() < deadline, "no reply to {line}");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

#[test]
fn list_panes_reports_pane_count() {
    let mut fixture = fixture(3);
    let mut stream = connect(&mut fixture);
    let reply = request(&mut fixture, &mut stream, r#"{"type":"list_panes"}"#);
    assert_eq!(reply, json!({"pane_count": 3}));
}

#[test]
fn send_reaches_the_controller_queue() {
    let mut fixture = fixture(2);
    let mut stream = connect(&mut fixture);
    let reply = request(
        &mut fixture,
        &mut stream,
        r#"{"type":"send","pane":0,"text":"ls -la"}"#,
    );
    assert_eq!(reply, json!({"status": "queued"}));
    // The action was applied within the poll that produced the reply; a
    // notes pane swallows PTY bytes, the point is that nothing hangs and
    // the queue drains.
    fixture.controller.poll();
}

#[test]
fn notify_action_lands_in_the_notification_slot() {
    let mut fixture = fixture(1);
    let mut stream = connect(&mut fixture);
    let reply = request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"notify","title":"A","body":"B"}"#,
    );
    assert_eq!(reply, json!({"status": "queued"}));
    assert_eq!(
        fixture.controller.take_notification(),
        Some(("A".to_string(), "B".to_string()))
    );
}

#[test]
fn message_action_uses_the_fixed_title() {
    let mut fixture = fixture(1);
    let mut stream = connect(&mut fixture);
    request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"message","text":"hi there"}"#,
    );
    assert_eq!(
        fixture.controller.take_notification(),
        Some(("trm".to_string(), "hi there".to_string()))
    );
}

#[test]
fn context_update_fills_the_telemetry_slot() {
    let mut fixture = fixture(1);
    let mut stream = connect(&mut fixture);
    let line = r#"{"type":"context_update","payload":{"session_id":"abc","hook_type":"PreCompact","context_window":{"used":100000,"total":200000,"used_percentage":50}}}"#;
    let reply = request(&mut fixture, &mut stream, line);
    assert_eq!(reply, json!({"status": "queued"}));

    let usage = fixture.controller.context_usage().unwrap();
    assert_eq!(usage.used_tokens, 100000);
    assert_eq!(usage.total_tokens, 200000);
    assert_eq!(usage.percentage, 50);
    assert_eq!(usage.session_id, "abc");
    assert!(usage.is_pre_compact);
}

#[test]
fn spawn_and_close_over_the_tap() {
    let mut fixture = fixture(2);
    let mut stream = connect(&mut fixture);
    request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"spawn_pane","pane_type":"notes","title":"new"}"#,
    );
    assert_eq!(fixture.controller.pane_count(), 3);

    // The tap now advertises the new count.
    let reply = request(&mut fixture, &mut stream, r#"{"type":"list_panes"}"#);
    assert_eq!(reply, json!({"pane_count": 3}));

    request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"close_pane","pane":2}"#,
    );
    assert_eq!(fixture.controller.pane_count(), 2);
}

#[test]
fn set_title_and_watermark_over_the_tap() {
    let mut fixture = fixture(2);
    let mut stream = connect(&mut fixture);
    request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"set_title","pane":1,"title":"renamed"}"#,
    );
    request(
        &mut fixture,
        &mut stream,
        r#"{"type":"action","action":"set_watermark","pane":1,"watermark":"prod"}"#,
    );
    assert_eq!(fixture.controller.pane(1).unwrap().title(), "renamed");
    assert_eq!(fixture.controller.watermark(1), Some("prod"));
}

#[test]
fn unknown_requests_get_an_error() {
    let mut fixture = fixture(1);
    let mut stream = connect(&mut fixture);
    let reply = request(&mut fixture, &mut stream, r#"{"type":"abracadabra"}"#);
    assert_eq!(reply, json!({"error": "unknown command"}));
}
