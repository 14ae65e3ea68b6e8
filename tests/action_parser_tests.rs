// End-to-end parsing of LLM-style responses into actions.

use termania::action::{Action, extract_json, parse_actions};

#[test]
fn fenced_response_scenario() {
    let text = "Here:\n```json\n{\"explanation\":\"list\",\"actions\":[{\"type\":\"send_command\",\"pane\":0,\"command\":\"ls -la\"}]}\n```\n";
    let parsed = parse_actions(extract_json(text).unwrap()).unwrap();
    assert_eq!(parsed.explanation, "list");
    assert_eq!(
        parsed.actions,
        vec![Action::SendCommand {
            pane: 0,
            command: "ls -la".to_string()
        }]
    );
}

#[test]
fn extraction_strategies() {
    let object = r#"{"actions":[]}"#;
    // Raw object.
    assert_eq!(extract_json(object), Some(object));
    // json-tagged fence.
    assert_eq!(
        extract_json(&format!("prefix\n```json\n{object}\n```\nsuffix")),
        Some(object)
    );
    // Generic fence.
    assert_eq!(extract_json(&format!("```\n{object}\n```")), Some(object));
    // Generic fence with a language tag line.
    assert_eq!(
        extract_json(&format!("```txt\n{object}\n```")),
        Some(object)
    );
    // Embedded in prose.
    assert_eq!(
        extract_json(&format!("the answer is {object} probably")),
        Some(object)
    );
    // No object at all.
    assert_eq!(extract_json("sorry, no can do"), None);
}

#[test]
fn one_unknown_action_does_not_poison_the_batch() {
    let text = r#"{
        "explanation": "mixed",
        "actions": [
            {"type": "teleport", "pane": 0},
            {"type": "notify", "title": "t", "body": "b"},
            {"not_even": "typed"},
            17
        ]
    }"#;
    let parsed = parse_actions(text).unwrap();
    assert_eq!(
        parsed.actions,
        vec![Action::Notify {
            title: "t".to_string(),
            body: "b".to_string()
        }]
    );
}

#[test]
fn every_wire_type_constructs() {
    let text = r#"{"actions":[
        {"type":"send_command","pane":0,"command":"ls"},
        {"type":"send_to_all","command":"clear"},
        {"type":"set_title","pane":1,"title":"t"},
        {"type":"set_watermark","pane":1,"watermark":"w"},
        {"type":"clear_watermark","pane":1},
        {"type":"navigate","pane":2,"url":"https://example.test"},
        {"type":"set_content","pane":2,"content":"c"},
        {"type":"spawn_pane","pane_type":"notes"},
        {"type":"close_pane","pane":3},
        {"type":"replace_pane","pane":3,"pane_type":"clock"},
        {"type":"swap_panes","a":0,"b":1},
        {"type":"focus_pane","pane":0},
        {"type":"message","text":"hello"},
        {"type":"notify","title":"a","body":"b"},
        {"type":"context_usage","used_tokens":1,"total_tokens":2,"percentage":50}
    ]}"#;
    let parsed = parse_actions(text).unwrap();
    assert_eq!(parsed.actions.len(), 15);
    // Display never panics and is stable for the whole batch.
    let lines: Vec<String> = parsed.actions.iter().map(Action::display_line).collect();
    assert_eq!(lines.len(), 15);
    for line in &lines {
        assert!(line.starts_with("  "), "display line {line:?}");
    }
}

#[test]
fn malformed_inputs_do_not_panic() {
    for text in [
        "",
        "{",
        "}{",
        "null",
        "[]",
        r#"{"actions": {}}"#,
        r#"{"actions": null}"#,
        "\u{0}\u{1}\u{2}",
        "``````",
        "```json```",
    ] {
        if let Some(json) = extract_json(text) {
            let _ = parse_actions(json);
        }
    }
}
