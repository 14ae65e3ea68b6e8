//! Lenient JSON-to-action parsing.
//!
//! Input text arrives from two places: lines on the text tap and LLM
//! responses (which are frequently wrapped in Markdown code fences or
//! surrounded by prose). [`extract_json`] digs the JSON object out of such
//! text; [`parse_actions`] turns it into typed [`Action`]s.
//!
//! Parsing is deliberately forgiving at the item level: an action entry
//! that is not an object, has no `"type"`, names an unknown type, or is
//! missing a required field is skipped rather than failing the batch.
//! Negative integers are treated as missing values.

use super::{Action, ContextUsage, SpawnSpec};
use serde_json::{Map, Value};
use std::fmt;

type JsonMap = Map<String, Value>;

/// A parsed LLM-style response: free-text explanation plus actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmActions {
    pub explanation: String,
    pub actions: Vec<Action>,
}

/// Errors from [`parse_actions`]. Item-level problems are not errors; these
/// cover only a structurally unusable response.
#[derive(Debug)]
pub enum ActionParseError {
    /// The text is not valid JSON at all.
    InvalidJson(serde_json::Error),
    /// The root value is not an object.
    NotAnObject,
    /// The root object has no `"actions"` field.
    NoActionsField,
    /// `"actions"` is present but not an array.
    InvalidActions,
}

impl fmt::Display for ActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionParseError::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            ActionParseError::NotAnObject => write!(f, "response root is not a JSON object"),
            ActionParseError::NoActionsField => write!(f, "response has no \"actions\" field"),
            ActionParseError::InvalidActions => write!(f, "\"actions\" is not an array"),
        }
    }
}

impl std::error::Error for ActionParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionParseError::InvalidJson(e) => Some(e),
            _ => None,
        }
    }
}

/// Locate the JSON object inside possibly-fenced, possibly-prose text.
///
/// Tries in order: the whole (trimmed) input, a ```` ```json ```` fence, a
/// generic ```` ``` ```` fence whose body starts with `{` (skipping a
/// language-tag line if present), and finally the span from the first `{`
/// to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    if let Some(inner) = fenced_block(text, "```json") {
        return Some(inner.trim());
    }

    if let Some(inner) = fenced_block(text, "```") {
        let inner = inner.trim();
        if inner.starts_with('{') {
            return Some(inner);
        }
        // The opening fence may carry a language tag on its own line.
        if let Some((_, rest)) = inner.split_once('\n') {
            let rest = rest.trim();
            if rest.starts_with('{') {
                return Some(rest);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        return Some(&text[start..=end]);
    }
    None
}

fn fenced_block<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

/// Parse an extracted JSON object into an explanation plus action list.
pub fn parse_actions(json_text: &str) -> Result<LlmActions, ActionParseError> {
    let root: Value = serde_json::from_str(json_text).map_err(ActionParseError::InvalidJson)?;
    let obj = root.as_object().ok_or(ActionParseError::NotAnObject)?;

    let explanation = obj
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let items = match obj.get("actions") {
        None => return Err(ActionParseError::NoActionsField),
        Some(value) => value.as_array().ok_or(ActionParseError::InvalidActions)?,
    };

    let mut actions = Vec::new();
    for item in items {
        let Some(entry) = item.as_object() else {
            continue;
        };
        match action_from_object(entry) {
            Some(action) => actions.push(action),
            None => log::debug!("skipping malformed or unknown action entry"),
        }
    }

    Ok(LlmActions { explanation, actions })
}

/// Build an [`Action`] from an object carrying a string `"type"` field.
///
/// Returns `None` for unknown types and for entries missing required
/// fields. Shared by the LLM response parser and the tap's `action`
/// requests.
pub fn action_from_object(obj: &JsonMap) -> Option<Action> {
    let type_name = obj.get("type")?.as_str()?;
    let (_, build) = DISPATCH.iter().find(|(name, _)| *name == type_name)?;
    build(obj)
}

/// Dispatch table from wire type name to constructor.
static DISPATCH: &[(&str, fn(&JsonMap) -> Option<Action>)] = &[
    ("send_command", build_send_command),
    ("send_to_all", build_send_to_all),
    ("set_title", build_set_title),
    ("set_watermark", build_set_watermark),
    ("clear_watermark", build_clear_watermark),
    ("navigate", build_navigate),
    ("set_content", build_set_content),
    ("spawn_pane", build_spawn_pane),
    ("close_pane", build_close_pane),
    ("replace_pane", build_replace_pane),
    ("swap_panes", build_swap_panes),
    ("focus_pane", build_focus_pane),
    ("message", build_message),
    ("notify", build_notify),
    ("context_usage", build_context_usage),
];

fn get_str(obj: &JsonMap, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

// `as_u64` yields None for negative integers, which is exactly the
// treat-negative-as-missing rule.
fn get_u64(obj: &JsonMap, key: &str) -> Option<u64> {
    obj.get(key).and_then(Value::as_u64)
}

fn get_u32(obj: &JsonMap, key: &str) -> Option<u32> {
    get_u64(obj, key).and_then(|v| u32::try_from(v).ok())
}

fn build_send_command(obj: &JsonMap) -> Option<Action> {
    Some(Action::SendCommand {
        pane: get_u32(obj, "pane")?,
        command: get_str(obj, "command")?,
    })
}

fn build_send_to_all(obj: &JsonMap) -> Option<Action> {
    Some(Action::SendToAll {
        command: get_str(obj, "command")?,
    })
}

fn build_set_title(obj: &JsonMap) -> Option<Action> {
    Some(Action::SetTitle {
        pane: get_u32(obj, "pane")?,
        title: get_str(obj, "title")?,
    })
}

fn build_set_watermark(obj: &JsonMap) -> Option<Action> {
    Some(Action::SetWatermark {
        pane: get_u32(obj, "pane")?,
        watermark: get_str(obj, "watermark")?,
    })
}

fn build_clear_watermark(obj: &JsonMap) -> Option<Action> {
    Some(Action::ClearWatermark {
        pane: get_u32(obj, "pane")?,
    })
}

fn build_navigate(obj: &JsonMap) -> Option<Action> {
    Some(Action::Navigate {
        pane: get_u32(obj, "pane")?,
        url: get_str(obj, "url")?,
    })
}

fn build_set_content(obj: &JsonMap) -> Option<Action> {
    Some(Action::SetContent {
        pane: get_u32(obj, "pane")?,
        content: get_str(obj, "content")?,
    })
}

fn spawn_spec_from(obj: &JsonMap) -> SpawnSpec {
    SpawnSpec {
        pane_type: get_str(obj, "pane_type").unwrap_or_else(|| "terminal".to_string()),
        title: get_str(obj, "title"),
        command: get_str(obj, "command"),
        cwd: get_str(obj, "cwd"),
        url: get_str(obj, "url"),
        content: get_str(obj, "content"),
        watermark: get_str(obj, "watermark"),
        row: get_u32(obj, "row"),
    }
}

fn build_spawn_pane(obj: &JsonMap) -> Option<Action> {
    Some(Action::SpawnPane(spawn_spec_from(obj)))
}

fn build_close_pane(obj: &JsonMap) -> Option<Action> {
    Some(Action::ClosePane {
        pane: get_u32(obj, "pane")?,
    })
}

fn build_replace_pane(obj: &JsonMap) -> Option<Action> {
    Some(Action::ReplacePane {
        pane: get_u32(obj, "pane")?,
        spec: spawn_spec_from(obj),
    })
}

fn build_swap_panes(obj: &JsonMap) -> Option<Action> {
    Some(Action::SwapPanes {
        a: get_u32(obj, "a")?,
        b: get_u32(obj, "b")?,
    })
}

fn build_focus_pane(obj: &JsonMap) -> Option<Action> {
    Some(Action::FocusPane {
        pane: get_u32(obj, "pane")?,
    })
}

fn build_message(obj: &JsonMap) -> Option<Action> {
    Some(Action::Message {
        text: get_str(obj, "text")?,
    })
}

fn build_notify(obj: &JsonMap) -> Option<Action> {
    Some(Action::Notify {
        title: get_str(obj, "title")?,
        body: get_str(obj, "body")?,
    })
}

fn build_context_usage(obj: &JsonMap) -> Option<Action> {
    Some(Action::ContextUsage(ContextUsage {
        used_tokens: get_u64(obj, "used_tokens")?,
        total_tokens: get_u64(obj, "total_tokens")?,
        percentage: get_u64(obj, "percentage")?.min(100) as u8,
        session_id: get_str(obj, "session_id").unwrap_or_default(),
        is_pre_compact: obj
            .get("is_pre_compact")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RawTarget;

    #[test]
    fn test_extract_raw_object() {
        let text = r#"  {"actions": []}  "#;
        assert_eq!(extract_json(text), Some(r#"{"actions": []}"#));
    }

    #[test]
    fn test_extract_json_fence() {
        let text = "Here you go:\n```json\n{\"actions\": []}\n```\nDone.";
        assert_eq!(extract_json(text), Some("{\"actions\": []}"));
    }

    #[test]
    fn test_extract_generic_fence() {
        let text = "```\n{\"actions\": []}\n```";
        assert_eq!(extract_json(text), Some("{\"actions\": []}"));
    }

    #[test]
    fn test_extract_generic_fence_with_language_tag() {
        let text = "```javascript\n{\"actions\": []}\n```";
        assert_eq!(extract_json(text), Some("{\"actions\": []}"));
    }

    #[test]
    fn test_extract_embedded_in_prose() {
        let text = "I think {\"actions\": []} should work";
        assert_eq!(extract_json(text), Some("{\"actions\": []}"));
    }

    #[test]
    fn test_extract_fails_without_object() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_parse_explanation_and_action() {
        let parsed = parse_actions(
            r#"{"explanation":"list","actions":[{"type":"send_command","pane":0,"command":"ls -la"}]}"#,
        )
        .unwrap();
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
    fn test_parse_missing_explanation_is_empty() {
        let parsed = parse_actions(r#"{"actions":[]}"#).unwrap();
        assert_eq!(parsed.explanation, "");
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_parse_no_actions_field() {
        assert!(matches!(
            parse_actions(r#"{"explanation":"hi"}"#),
            Err(ActionParseError::NoActionsField)
        ));
    }

    #[test]
    fn test_parse_actions_not_array() {
        assert!(matches!(
            parse_actions(r#"{"actions":"nope"}"#),
            Err(ActionParseError::InvalidActions)
        ));
    }

    #[test]
    fn test_parse_root_not_object() {
        assert!(matches!(
            parse_actions("[1,2,3]"),
            Err(ActionParseError::NotAnObject)
        ));
    }

    #[test]
    fn test_unknown_action_skipped() {
        let parsed = parse_actions(
            r#"{"actions":[{"type":"levitate"},{"type":"message","text":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.actions,
            vec![Action::Message {
                text: "hi".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_required_field_skipped() {
        let parsed =
            parse_actions(r#"{"actions":[{"type":"send_command","pane":0}]}"#).unwrap();
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_negative_pane_treated_as_missing() {
        let parsed = parse_actions(
            r#"{"actions":[{"type":"send_command","pane":-1,"command":"ls"}]}"#,
        )
        .unwrap();
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_non_object_items_skipped() {
        let parsed = parse_actions(r#"{"actions":[42,"x",null]}"#).unwrap();
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_spawn_pane_defaults_to_terminal() {
        let parsed = parse_actions(r#"{"actions":[{"type":"spawn_pane"}]}"#).unwrap();
        match &parsed.actions[0] {
            Action::SpawnPane(spec) => assert_eq!(spec.pane_type, "terminal"),
            other => panic!("Expected SpawnPane, got {other:?}"),
        }
    }

    #[test]
    fn test_spawn_pane_optionals() {
        let parsed = parse_actions(
            r#"{"actions":[{"type":"spawn_pane","pane_type":"notes","title":"t","content":"c","row":1}]}"#,
        )
        .unwrap();
        match &parsed.actions[0] {
            Action::SpawnPane(spec) => {
                assert_eq!(spec.pane_type, "notes");
                assert_eq!(spec.title.as_deref(), Some("t"));
                assert_eq!(spec.content.as_deref(), Some("c"));
                assert_eq!(spec.row, Some(1));
            }
            other => panic!("Expected SpawnPane, got {other:?}"),
        }
    }

    #[test]
    fn test_context_usage_clamps_percentage() {
        let parsed = parse_actions(
            r#"{"actions":[{"type":"context_usage","used_tokens":10,"total_tokens":20,"percentage":250}]}"#,
        )
        .unwrap();
        match &parsed.actions[0] {
            Action::ContextUsage(usage) => {
                assert_eq!(usage.percentage, 100);
                assert_eq!(usage.session_id, "");
                assert!(!usage.is_pre_compact);
            }
            other => panic!("Expected ContextUsage, got {other:?}"),
        }
    }

    #[test]
    fn test_fenced_llm_response_end_to_end() {
        let text = "Here:\n```json\n{\"explanation\":\"list\",\"actions\":[{\"type\":\"send_command\",\"pane\":0,\"command\":\"ls -la\"}]}\n```";
        let json = extract_json(text).unwrap();
        let parsed = parse_actions(json).unwrap();
        assert_eq!(parsed.explanation, "list");
        assert_eq!(parsed.actions.len(), 1);
    }

    #[test]
    fn test_display_lines_are_deterministic() {
        let text = r#"{"actions":[{"type":"swap_panes","a":1,"b":2},{"type":"notify","title":"a","body":"b"}]}"#;
        let first: Vec<String> = parse_actions(text)
            .unwrap()
            .actions
            .iter()
            .map(Action::display_line)
            .collect();
        let second: Vec<String> = parse_actions(text)
            .unwrap()
            .actions
            .iter()
            .map(Action::display_line)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_raw_send_is_not_a_wire_type() {
        // RawSend comes only from the tap's send/send_all messages.
        let parsed = parse_actions(
            r#"{"actions":[{"type":"raw_send","pane":0,"bytes":"x"}]}"#,
        )
        .unwrap();
        assert!(parsed.actions.is_empty());
        let _ = RawTarget::All;
    }
}
