//! The action vocabulary shared by the text tap, the LLM bridge and the GUI.
//!
//! Every control surface in the core ultimately produces [`Action`] values,
//! and the controller consumes them from a single queue. Parsing from JSON
//! lives in [`parser`]; this module only defines the shapes and their
//! one-line display form used by UI overlays.

pub mod parser;

pub use parser::{ActionParseError, LlmActions, extract_json, parse_actions};

/// Destination of a raw byte send from the tap's legacy `send`/`send_all`
/// messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTarget {
    /// A single pane by index.
    Pane(u32),
    /// Every terminal pane.
    All,
}

/// Optional fields accepted by `spawn_pane` and `replace_pane`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Plugin type name, `"terminal"` when the request omits it.
    pub pane_type: String,
    pub title: Option<String>,
    pub command: Option<String>,
    pub cwd: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub watermark: Option<String>,
    /// Grid row the new pane should join; last row when absent.
    pub row: Option<u32>,
}

/// Claude-Code-style context-window telemetry reported by hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextUsage {
    pub used_tokens: u64,
    pub total_tokens: u64,
    /// Clamped to 100 at parse time.
    pub percentage: u8,
    pub session_id: String,
    pub is_pre_compact: bool,
}

/// A command recognized by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write `command` + CR to the pane's PTY.
    SendCommand { pane: u32, command: String },
    /// Same, fanned out to every terminal pane.
    SendToAll { command: String },
    SetTitle { pane: u32, title: String },
    SetWatermark { pane: u32, watermark: String },
    ClearWatermark { pane: u32 },
    /// Instructs a webview-style pane.
    Navigate { pane: u32, url: String },
    /// Instructs a notes-style pane.
    SetContent { pane: u32, content: String },
    SpawnPane(SpawnSpec),
    ClosePane { pane: u32 },
    ReplacePane { pane: u32, spec: SpawnSpec },
    SwapPanes { a: u32, b: u32 },
    FocusPane { pane: u32 },
    /// Informational text surfaced to the user.
    Message { text: String },
    /// OS notification request (delivery is the frontend's job).
    Notify { title: String, body: String },
    ContextUsage(ContextUsage),
    /// Legacy wire form of `SendCommand`: bytes without an implied CR.
    RawSend { target: RawTarget, bytes: String },
}

impl Action {
    /// One-line, human-readable description for UI overlays.
    pub fn display_line(&self) -> String {
        match self {
            Action::SendCommand { pane, command } => format!("  [pane {pane}] $ {command}"),
            Action::SendToAll { command } => format!("  [all panes] $ {command}"),
            Action::SetTitle { pane, title } => format!("  [pane {pane}] title = {title:?}"),
            Action::SetWatermark { pane, watermark } => {
                format!("  [pane {pane}] watermark = {watermark:?}")
            }
            Action::ClearWatermark { pane } => format!("  [pane {pane}] clear watermark"),
            Action::Navigate { pane, url } => format!("  [pane {pane}] open {url}"),
            Action::SetContent { pane, content } => {
                format!("  [pane {pane}] set content ({} chars)", content.chars().count())
            }
            Action::SpawnPane(spec) => format!("  spawn {} pane", spec.pane_type),
            Action::ClosePane { pane } => format!("  close pane {pane}"),
            Action::ReplacePane { pane, spec } => {
                format!("  [pane {pane}] replace with {}", spec.pane_type)
            }
            Action::SwapPanes { a, b } => format!("  swap panes {a} and {b}"),
            Action::FocusPane { pane } => format!("  focus pane {pane}"),
            Action::Message { text } => format!("  {text}"),
            Action::Notify { title, body } => format!("  notify: {title} - {body}"),
            Action::ContextUsage(usage) => format!(
                "  context: {}/{} tokens ({}%)",
                usage.used_tokens, usage.total_tokens, usage.percentage
            ),
            Action::RawSend { target, bytes } => match target {
                RawTarget::Pane(pane) => {
                    format!("  [pane {pane}] send {} bytes", bytes.len())
                }
                RawTarget::All => format!("  [all panes] send {} bytes", bytes.len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_send_command() {
        let action = Action::SendCommand {
            pane: 2,
            command: "ls -la".to_string(),
        };
        assert_eq!(action.display_line(), "  [pane 2] $ ls -la");
    }

    #[test]
    fn test_display_notify() {
        let action = Action::Notify {
            title: "build".to_string(),
            body: "done".to_string(),
        };
        assert_eq!(action.display_line(), "  notify: build - done");
    }

    #[test]
    fn test_display_raw_send_targets() {
        let one = Action::RawSend {
            target: RawTarget::Pane(0),
            bytes: "abc".to_string(),
        };
        let all = Action::RawSend {
            target: RawTarget::All,
            bytes: "abcd".to_string(),
        };
        assert!(one.display_line().contains("[pane 0] send 3 bytes"));
        assert!(all.display_line().contains("[all panes] send 4 bytes"));
    }

    #[test]
    fn test_display_context_usage() {
        let action = Action::ContextUsage(ContextUsage {
            used_tokens: 100,
            total_tokens: 200,
            percentage: 50,
            session_id: String::new(),
            is_pre_compact: false,
        });
        assert_eq!(action.display_line(), "  context: 100/200 tokens (50%)");
    }

    #[test]
    fn test_spawn_spec_default_is_empty() {
        let spec = SpawnSpec::default();
        assert!(spec.pane_type.is_empty());
        assert!(spec.title.is_none());
        assert!(spec.row.is_none());
    }
}
