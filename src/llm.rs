//! LLM bridge: builds a prompt from live pane context, talks to an
//! Anthropic- or OpenAI-style HTTP endpoint, and parses the reply back
//! into actions.
//!
//! The client is a two-step state machine driven by the host:
//! [`LlmClient::submit`] only records the prompt and flips the status to
//! `Waiting`; [`LlmClient::poll`] performs the blocking HTTP request. The
//! host is expected to call `poll` from a context where a multi-second
//! stall is acceptable. Responses are held for inspection, never
//! auto-applied.

use crate::action::parser::{extract_json, parse_actions};
use crate::action::{Action, LlmActions};
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::time::Duration;
use termania_config::LlmConfig;
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

/// Lines of visible text included per pane in the system prompt.
const VISIBLE_TAIL_LINES: usize = 40;

/// Global timeout for a backend request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum response body size accepted from a backend (10 MB).
const MAX_API_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client state as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmStatus {
    #[default]
    Idle,
    Waiting,
    Error,
}

/// Snapshot of one pane used to build the system prompt.
#[derive(Debug, Clone)]
pub struct PaneContext {
    pub index: u32,
    pub pane_type: String,
    pub title: String,
    pub visible_text: String,
    pub subprocess_info: Option<String>,
}

/// A completed LLM exchange.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub explanation: String,
    pub actions: Vec<Action>,
}

pub struct LlmClient {
    config: LlmConfig,
    status: LlmStatus,
    last_response: Option<LlmResponse>,
    pending_prompt: Option<String>,
    last_error: Option<String>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            status: LlmStatus::Idle,
            last_response: None,
            pending_prompt: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> LlmStatus {
        self.status
    }

    /// Status byte for the foreign interface: 0 idle, 1 waiting, 2 error,
    /// 3 idle with a response held for inspection.
    pub fn status_byte(&self) -> u8 {
        match self.status {
            LlmStatus::Idle if self.last_response.is_some() => 3,
            LlmStatus::Idle => 0,
            LlmStatus::Waiting => 1,
            LlmStatus::Error => 2,
        }
    }

    pub fn last_response(&self) -> Option<&LlmResponse> {
        self.last_response.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Store the prompt and mark the client waiting. The request itself
    /// happens in [`poll`](Self::poll).
    pub fn submit(&mut self, prompt: &str) {
        self.pending_prompt = Some(prompt.to_string());
        self.last_response = None;
        self.last_error = None;
        self.status = LlmStatus::Waiting;
    }

    /// Perform the pending HTTP request, blocking the calling thread.
    /// No-op unless a prompt is waiting.
    pub fn poll(&mut self, panes: &[PaneContext]) {
        let Some(prompt) = self.pending_prompt.take() else {
            return;
        };

        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| build_system_prompt(panes));

        match self.perform_request(&system, &prompt) {
            Ok(text) => {
                let parsed = response_to_actions(&text);
                log::info!(
                    "llm: response with {} action(s)",
                    parsed.actions.len()
                );
                self.last_response = Some(LlmResponse {
                    explanation: parsed.explanation,
                    actions: parsed.actions,
                });
                self.status = LlmStatus::Idle;
            }
            Err(e) => {
                log::error!("llm request failed: {e:#}");
                self.last_error = Some(format!("{e:#}"));
                self.last_response = None;
                self.status = LlmStatus::Error;
            }
        }
    }

    /// Take the held response's actions for execution and reset to idle.
    pub fn take_actions(&mut self) -> Vec<Action> {
        let actions = self
            .last_response
            .take()
            .map(|response| response.actions)
            .unwrap_or_default();
        self.status = LlmStatus::Idle;
        actions
    }

    fn perform_request(&self, system: &str, user: &str) -> Result<String> {
        let url = request_url(&self.config);
        let body = build_request_body(&self.config, system, user);
        let payload = body.to_string();

        let agent = http_agent();
        let mut request = agent
            .post(url.as_str())
            .header("content-type", "application/json");

        if anthropic_format(&self.config.provider) {
            request = request.header("anthropic-version", ANTHROPIC_VERSION);
            if let Some(key) = &self.config.api_key {
                request = request.header("x-api-key", key);
            }
        } else if let Some(key) = &self.config.api_key {
            // Local OpenAI-compatible servers run without a key; only set
            // the header when one is configured.
            let bearer = format!("Bearer {key}");
            request = request.header("authorization", bearer.as_str());
        }

        log::debug!("llm: POST {url}");
        match request.send(payload.as_bytes()) {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .with_config()
                    .limit(MAX_API_RESPONSE_SIZE)
                    .read_to_string()
                    .context("reading LLM response body")?;
                let root: Value =
                    serde_json::from_str(&text).context("LLM response is not JSON")?;
                extract_response_text(&self.config.provider, &root)
            }
            Err(ureq::Error::StatusCode(code)) => Err(anyhow!("LLM endpoint returned HTTP {code}")),
            Err(e) => Err(anyhow!("LLM request failed: {e}")),
        }
    }
}

/// HTTP agent for backend requests: native-tls with the platform's root
/// certificates (the system TLS stack behaves better in VM environments
/// where ring/rustls may have issues) and a global timeout so a dead
/// endpoint cannot hang `poll` forever.
fn http_agent() -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(HTTP_TIMEOUT))
        .build()
        .into()
}

/// Whether the provider uses the Anthropic Messages format.
fn anthropic_format(provider: &str) -> bool {
    matches!(provider.to_lowercase().as_str(), "anthropic" | "claude")
}

fn request_url(config: &LlmConfig) -> String {
    if let Some(url) = &config.base_url {
        return url.clone();
    }
    if anthropic_format(&config.provider) {
        ANTHROPIC_DEFAULT_URL.to_string()
    } else {
        OPENAI_DEFAULT_URL.to_string()
    }
}

fn request_model(config: &LlmConfig) -> &str {
    if let Some(model) = &config.model {
        return model;
    }
    if anthropic_format(&config.provider) {
        ANTHROPIC_DEFAULT_MODEL
    } else {
        OPENAI_DEFAULT_MODEL
    }
}

/// Build the provider-specific request body.
fn build_request_body(config: &LlmConfig, system: &str, user: &str) -> Value {
    if anthropic_format(&config.provider) {
        json!({
            "model": request_model(config),
            "max_tokens": config.max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        })
    } else {
        json!({
            "model": request_model(config),
            "max_tokens": config.max_tokens,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        })
    }
}

/// Pull the assistant text out of a provider response.
fn extract_response_text(provider: &str, root: &Value) -> Result<String> {
    let text = if anthropic_format(provider) {
        root.get("content")
            .and_then(|content| content.get(0))
            .and_then(|entry| entry.get("text"))
            .and_then(Value::as_str)
    } else {
        root.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
    };
    text.map(str::to_string)
        .ok_or_else(|| anyhow!("LLM response has unexpected shape"))
}

/// Parse a raw response text into actions, falling back to a single
/// `Message` carrying the raw text so the user always sees something.
fn response_to_actions(text: &str) -> LlmActions {
    if let Some(json_text) = extract_json(text) {
        match parse_actions(json_text) {
            Ok(parsed) => return parsed,
            Err(e) => log::debug!("llm: response JSON did not parse as actions: {e}"),
        }
    }
    LlmActions {
        explanation: String::new(),
        actions: vec![Action::Message {
            text: text.to_string(),
        }],
    }
}

/// Compose the system prompt from a fixed preamble, one section per pane,
/// and a postamble describing the expected reply shape.
pub fn build_system_prompt(panes: &[PaneContext]) -> String {
    let mut prompt = String::from(
        "You are an assistant integrated into a multi-pane terminal. You can \
         observe every pane's visible content below and operate the panes by \
         returning actions.\n",
    );

    for pane in panes {
        prompt.push_str(&format!(
            "\n## Pane {} ({}): {}\n",
            pane.index, pane.pane_type, pane.title
        ));
        if let Some(info) = &pane.subprocess_info {
            prompt.push_str(&format!("subprocess: {info}\n"));
        }
        let tail = tail_lines(&pane.visible_text, VISIBLE_TAIL_LINES);
        if !tail.is_empty() {
            prompt.push_str("```\n");
            prompt.push_str(&tail);
            prompt.push_str("\n```\n");
        }
    }

    prompt.push_str(
        "\nRespond with a single JSON object of the form \
         {\"explanation\": \"...\", \"actions\": [...]}. Each action is an \
         object with a \"type\" field, one of: send_command, send_to_all, \
         set_title, set_watermark, clear_watermark, navigate, set_content, \
         spawn_pane, close_pane, replace_pane, swap_panes, focus_pane, \
         message, notify. Use the pane indices shown above.\n",
    );
    prompt
}

/// Last `count` lines of `text`, trailing blank lines removed.
fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let trimmed_len = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |pos| pos + 1);
    let start = trimmed_len.saturating_sub(count);
    lines[start..trimmed_len].join("\n")
}
