//! The root `Config` struct and TOML loading.
//!
//! Parsing is deliberately forgiving: unknown sections and keys are ignored
//! so newer config files keep working with older cores, and every field has
//! a default so an empty file is a valid config.

use crate::error::ConfigError;
use crate::types::{ColorsConfig, LlmConfig, PaneEntryConfig, TextTapConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `[font]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub size: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: crate::defaults::font_family(),
            size: crate::defaults::font_size(),
        }
    }
}

/// `[grid]` section: the initial pane grid shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub scrollback_lines: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: crate::defaults::rows(),
            cols: crate::defaults::cols(),
            scrollback_lines: crate::defaults::scrollback_lines(),
        }
    }
}

/// `[window]` section: title plus the layout metrics the frontend scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub outer_padding: f32,
    pub gap: f32,
    pub title_bar_height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: crate::defaults::window_title(),
            outer_padding: crate::defaults::outer_padding(),
            gap: crate::defaults::gap(),
            title_bar_height: crate::defaults::title_bar_height(),
        }
    }
}

/// A named session: its top-level `title`, `rows` and `cols` override the
/// `[window]` / `[grid]` values when the session is applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub title: Option<String>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub panes: Vec<PaneEntryConfig>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font: FontConfig,
    pub grid: GridConfig,
    pub window: WindowConfig,
    pub colors: ColorsConfig,
    pub text_tap: TextTapConfig,
    pub llm: LlmConfig,
    pub sessions: Vec<SessionConfig>,
    pub panes: Vec<PaneEntryConfig>,
}

impl Config {
    /// Parse a config from TOML text. Pure function, no filesystem access.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        log::info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Ok(Self::from_toml(&text)?)
    }

    /// Apply a session's overrides to the window title and grid shape, and
    /// replace the pane list when the session declares one.
    pub fn apply_session(&mut self, session: &SessionConfig) {
        if let Some(title) = &session.title {
            self.window.title = title.clone();
        }
        if let Some(rows) = session.rows {
            self.grid.rows = rows;
        }
        if let Some(cols) = session.cols {
            self.grid.cols = cols;
        }
        if !session.panes.is_empty() {
            self.panes = session.panes.clone();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 {
            return Err(ConfigError::Validation("grid.rows must be at least 1".into()));
        }
        if self.grid.cols == 0 {
            return Err(ConfigError::Validation("grid.cols must be at least 1".into()));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Validation("llm.max_tokens must be at least 1".into()));
        }
        if self.text_tap.socket_path.is_empty() {
            return Err(ConfigError::Validation("text_tap.socket_path must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.grid.rows, 1);
        assert_eq!(config.grid.cols, 2);
        assert_eq!(config.window.title, "termania");
        assert_eq!(config.text_tap.socket_path, "/tmp/termania.sock");
    }

    #[test]
    fn test_sections_parse() {
        let text = r##"
[font]
family = "JetBrains Mono"
size = 13.5

[grid]
rows = 2
cols = 3

[window]
title = "workbench"
gap = 6.0

[colors]
background = "#101014"
accent = "#ff8800cc"

[text_tap]
enabled = false
socket_path = "/tmp/custom.sock"

[llm]
provider = "ollama"
base_url = "http://localhost:11434/v1/chat/completions"
max_tokens = 512
"##;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.font.family, "JetBrains Mono");
        assert_eq!(config.grid.rows, 2);
        assert_eq!(config.grid.cols, 3);
        assert_eq!(config.window.title, "workbench");
        assert_eq!(config.window.gap, 6.0);
        assert_eq!(config.colors.accent.a, 0xcc);
        assert!(!config.text_tap.enabled);
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.max_tokens, 512);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = r#"
[grid]
rows = 2
cols = 2
future_knob = "whatever"

[brand_new_section]
x = 1
"#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.grid.rows, 2);
    }

    #[test]
    fn test_inline_comments() {
        let text = "[grid]\nrows = 3 # three rows\ncols = 1\n";
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.grid.rows, 3);
    }

    #[test]
    fn test_panes_array() {
        let text = r#"
[[panes]]
pane_type = "terminal"
command = "htop"

[[panes]]
pane_type = "notes"
title = "scratch"
content = "hello"
"#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.panes.len(), 2);
        assert_eq!(config.panes[0].command.as_deref(), Some("htop"));
        assert_eq!(config.panes[1].pane_type.as_deref(), Some("notes"));
    }

    #[test]
    fn test_session_overrides() {
        let text = r#"
[window]
title = "base"

[grid]
rows = 1
cols = 1

[[sessions]]
title = "dev"
rows = 2
cols = 2

[[sessions.panes]]
pane_type = "terminal"
command = "vim"
"#;
        let mut config = Config::from_toml(text).unwrap();
        assert_eq!(config.sessions.len(), 1);
        let session = config.sessions[0].clone();
        config.apply_session(&session);
        assert_eq!(config.window.title, "dev");
        assert_eq!(config.grid.rows, 2);
        assert_eq!(config.panes.len(), 1);
        assert_eq!(config.panes[0].command.as_deref(), Some("vim"));
    }

    #[test]
    fn test_validation_rejects_zero_rows() {
        let err = Config::from_toml("[grid]\nrows = 0\n").unwrap_err();
        assert!(err.to_string().contains("grid.rows"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[window]\ntitle = \"loaded\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.window.title, "loaded");
    }
}
