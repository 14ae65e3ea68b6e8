//! Shared configuration types: colors, pane entries, tap and LLM settings.

use serde::{Deserialize, Deserializer, Serialize};

/// A color in RGBA format, parsed from `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a `#RRGGBB` or `#RRGGBBAA` hex string.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::with_alpha(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Packed 0xRRGGBBAA form, as handed across the ABI.
    pub fn packed(&self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        Color::parse_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color {s:?}, expected #RRGGBB or #RRGGBBAA")))
    }
}

/// Colors used by the frontend renderer. The core only carries them through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub background: Color,
    pub foreground: Color,
    pub accent: Color,
    pub title_bar: Color,
    pub title_text: Color,
    pub focused_border: Color,
    pub watermark: Color,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            background: Color::new(0x12, 0x12, 0x16),
            foreground: Color::new(0xd8, 0xd8, 0xd8),
            accent: Color::new(0x7a, 0xa2, 0xf7),
            title_bar: Color::new(0x1e, 0x1e, 0x26),
            title_text: Color::new(0xa0, 0xa0, 0xb0),
            focused_border: Color::new(0x7a, 0xa2, 0xf7),
            watermark: Color::with_alpha(0xff, 0xff, 0xff, 0x14),
        }
    }
}

/// One pane described in config (`[[panes]]` / `[[sessions.panes]]`) or by a
/// spawn request. All fields except the type are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneEntryConfig {
    pub pane_type: Option<String>,
    pub title: Option<String>,
    pub command: Option<String>,
    pub cwd: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub watermark: Option<String>,
    pub row: Option<u32>,
}

/// Text tap control socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextTapConfig {
    pub enabled: bool,
    pub socket_path: String,
}

impl Default for TextTapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: crate::defaults::socket_path(),
        }
    }
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "anthropic"/"claude" use the Messages API, anything
    /// else ("openai", "ollama", "lmstudio", "custom") the Chat Completions
    /// format.
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: crate::defaults::llm_max_tokens(),
            system_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_rgb() {
        let c = Color::parse_hex("#7aa2f7").unwrap();
        assert_eq!(c, Color::new(0x7a, 0xa2, 0xf7));
        assert_eq!(c.a, 255);
    }

    #[test]
    fn test_color_parse_rgba() {
        let c = Color::parse_hex("#ffffff14").unwrap();
        assert_eq!(c.a, 0x14);
    }

    #[test]
    fn test_color_parse_rejects_garbage() {
        assert!(Color::parse_hex("7aa2f7").is_none());
        assert!(Color::parse_hex("#7aa2").is_none());
        assert!(Color::parse_hex("#zzzzzz").is_none());
    }

    #[test]
    fn test_color_packed() {
        assert_eq!(Color::new(0x11, 0x22, 0x33).packed(), 0x112233ff);
    }

    #[test]
    fn test_llm_config_default_provider() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.provider, "anthropic");
        assert!(cfg.api_key.is_none());
    }
}
