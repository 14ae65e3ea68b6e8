//! Pane plugins: the polymorphic boundary between the controller and
//! concrete pane behavior.
//!
//! A pane owns exactly one plugin. Dispatch is a sealed sum over the two
//! concrete shapes rather than a boxed trait hierarchy: only the terminal
//! is fully functional, the remaining kinds satisfy the capability set
//! trivially through [`StubPlugin`]. No plugin method may block.

mod stub;
mod terminal;

pub use stub::StubPlugin;
pub use terminal::TerminalPlugin;

use termania_config::{GridConfig, PaneEntryConfig};

/// Every plugin kind the factory recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Terminal,
    Webview,
    Notes,
    Files,
    Clock,
    SysMon,
    Media,
    Markdown,
    Image,
    Todo,
}

impl PluginKind {
    /// Parse a wire/config type name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "terminal" => PluginKind::Terminal,
            "webview" => PluginKind::Webview,
            "notes" => PluginKind::Notes,
            "files" => PluginKind::Files,
            "clock" => PluginKind::Clock,
            "sysmon" => PluginKind::SysMon,
            "media" => PluginKind::Media,
            "markdown" => PluginKind::Markdown,
            "image" => PluginKind::Image,
            "todo" => PluginKind::Todo,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PluginKind::Terminal => "terminal",
            PluginKind::Webview => "webview",
            PluginKind::Notes => "notes",
            PluginKind::Files => "files",
            PluginKind::Clock => "clock",
            PluginKind::SysMon => "sysmon",
            PluginKind::Media => "media",
            PluginKind::Markdown => "markdown",
            PluginKind::Image => "image",
            PluginKind::Todo => "todo",
        }
    }
}

/// Cursor coordinate reported when the view is scrolled away from the live
/// screen.
pub const CURSOR_AWAY: u16 = u16::MAX;

/// One rendered cell, laid out for the foreign interface.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellData {
    /// Unicode scalar value; 0 for an empty cell.
    pub ch: u32,
    /// Packed 0xRRGGBBAA foreground; 0 means "theme default".
    pub fg: u32,
    /// Packed 0xRRGGBBAA background; 0 means "theme default".
    pub bg: u32,
    /// Bit 0 bold, 1 italic, 2 underline, 3 inverse.
    pub flags: u32,
}

pub const CELL_FLAG_BOLD: u32 = 1 << 0;
pub const CELL_FLAG_ITALIC: u32 = 1 << 1;
pub const CELL_FLAG_UNDERLINE: u32 = 1 << 2;
pub const CELL_FLAG_INVERSE: u32 = 1 << 3;

/// A structured snapshot of a pane's content, handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderData {
    pub rows: u16,
    pub cols: u16,
    /// [`CURSOR_AWAY`] when the view is scrolled away from the live screen.
    pub cursor_row: u16,
    pub cursor_col: u16,
    /// Row-major, `rows * cols` entries for terminal panes, empty for stubs.
    pub cells: Vec<CellData>,
    pub watermark: Option<String>,
}

/// Sealed sum of the concrete pane plugins.
pub enum PanePlugin {
    Terminal(TerminalPlugin),
    Stub(StubPlugin),
}

impl PanePlugin {
    pub fn kind(&self) -> PluginKind {
        match self {
            PanePlugin::Terminal(_) => PluginKind::Terminal,
            PanePlugin::Stub(stub) => stub.kind(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            PanePlugin::Terminal(term) => term.title(),
            PanePlugin::Stub(stub) => stub.title().to_string(),
        }
    }

    pub fn set_title(&mut self, title: &str) {
        match self {
            PanePlugin::Terminal(term) => term.set_title(title),
            PanePlugin::Stub(stub) => stub.set_title(title),
        }
    }

    /// Drain pending output. Returns `true` iff new bytes arrived.
    pub fn poll(&mut self) -> bool {
        match self {
            PanePlugin::Terminal(term) => term.poll(),
            PanePlugin::Stub(_) => false,
        }
    }

    pub fn write_input(&mut self, bytes: &[u8]) {
        if let PanePlugin::Terminal(term) = self {
            term.write_input(bytes);
        }
    }

    pub fn render_data(&self) -> RenderData {
        match self {
            PanePlugin::Terminal(term) => term.render_data(),
            PanePlugin::Stub(_) => RenderData::default(),
        }
    }

    pub fn visible_text(&self) -> String {
        match self {
            PanePlugin::Terminal(term) => term.visible_text(),
            PanePlugin::Stub(stub) => stub.visible_text(),
        }
    }

    pub fn has_error(&self) -> bool {
        match self {
            PanePlugin::Terminal(term) => term.has_error(),
            PanePlugin::Stub(_) => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            PanePlugin::Terminal(term) => term.is_dirty(),
            PanePlugin::Stub(stub) => stub.is_dirty(),
        }
    }

    pub fn clear_dirty(&mut self) {
        match self {
            PanePlugin::Terminal(term) => term.clear_dirty(),
            PanePlugin::Stub(stub) => stub.clear_dirty(),
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        if let PanePlugin::Terminal(term) = self {
            term.scroll_up(lines);
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        if let PanePlugin::Terminal(term) = self {
            term.scroll_down(lines);
        }
    }

    pub fn is_exited(&self) -> bool {
        match self {
            PanePlugin::Terminal(term) => term.is_exited(),
            PanePlugin::Stub(_) => false,
        }
    }

    pub fn child_pid(&self) -> Option<u32> {
        match self {
            PanePlugin::Terminal(term) => term.child_pid(),
            PanePlugin::Stub(_) => None,
        }
    }

    /// Point a webview-style pane at a URL. Other kinds ignore it.
    pub fn set_location(&mut self, url: &str) {
        if let PanePlugin::Stub(stub) = self {
            stub.set_location(url);
        }
    }

    /// Replace a notes-style pane's content. Other kinds ignore it.
    pub fn set_content(&mut self, content: &str) {
        if let PanePlugin::Stub(stub) = self {
            stub.set_content(content);
        }
    }

    /// Resize the pane's character grid.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        if let PanePlugin::Terminal(term) = self {
            term.resize(rows, cols);
        }
    }

    /// Tear down the plugin's resources. Terminal plugins kill their PTY.
    pub fn dispose(&mut self) {
        if let PanePlugin::Terminal(term) = self {
            term.dispose();
        }
    }
}

/// Build a plugin for pane `index` from its config entry.
///
/// The type string defaults to `"terminal"`; unknown types fall back to a
/// notes stub so a typo in config never aborts startup.
pub fn create_plugin(index: u32, entry: &PaneEntryConfig, grid: &GridConfig) -> PanePlugin {
    let type_name = entry.pane_type.as_deref().unwrap_or("terminal");
    let kind = PluginKind::from_name(type_name).unwrap_or_else(|| {
        log::warn!("pane {index}: unknown pane type {type_name:?}, using notes stub");
        PluginKind::Notes
    });

    match kind {
        PluginKind::Terminal => {
            PanePlugin::Terminal(TerminalPlugin::new(index, entry, grid.scrollback_lines))
        }
        other => PanePlugin::Stub(StubPlugin::new(other, entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_name_roundtrip() {
        for name in [
            "terminal", "webview", "notes", "files", "clock", "sysmon", "media", "markdown",
            "image", "todo",
        ] {
            let kind = PluginKind::from_name(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert!(PluginKind::from_name("holodeck").is_none());
    }

    #[test]
    fn test_factory_builds_stub_for_unknown_type() {
        let entry = PaneEntryConfig {
            pane_type: Some("holodeck".to_string()),
            ..Default::default()
        };
        let plugin = create_plugin(0, &entry, &GridConfig::default());
        assert_eq!(plugin.kind(), PluginKind::Notes);
    }

    #[test]
    fn test_factory_builds_requested_stub() {
        let entry = PaneEntryConfig {
            pane_type: Some("webview".to_string()),
            url: Some("https://example.test".to_string()),
            ..Default::default()
        };
        let plugin = create_plugin(0, &entry, &GridConfig::default());
        assert_eq!(plugin.kind(), PluginKind::Webview);
        assert!(!plugin.poll());
        assert!(!plugin.has_error());
        assert!(!plugin.is_exited());
        assert_eq!(plugin.child_pid(), None);
        assert!(plugin.render_data().cells.is_empty());
    }

    #[test]
    fn test_stub_title_set_get() {
        let entry = PaneEntryConfig {
            pane_type: Some("notes".to_string()),
            title: Some("scratch".to_string()),
            ..Default::default()
        };
        let mut plugin = create_plugin(0, &entry, &GridConfig::default());
        assert_eq!(plugin.title(), "scratch");
        plugin.set_title("renamed");
        assert_eq!(plugin.title(), "renamed");
    }
}
