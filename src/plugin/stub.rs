//! Stub plugin for the non-terminal pane kinds.
//!
//! Display logic for these kinds lives in the frontend; the core only
//! stores the identity and whatever content instructions it has been
//! given, so tap and LLM actions aimed at these panes are not lost.

use super::PluginKind;

pub struct StubPlugin {
    kind: PluginKind,
    title: String,
    url: Option<String>,
    content: Option<String>,
    dirty: bool,
}

impl StubPlugin {
    pub fn new(kind: PluginKind, entry: &termania_config::PaneEntryConfig) -> Self {
        Self {
            kind,
            title: entry
                .title
                .clone()
                .unwrap_or_else(|| kind.name().to_string()),
            url: entry.url.clone(),
            content: entry.content.clone(),
            dirty: false,
        }
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_location(&mut self, url: &str) {
        self.url = Some(url.to_string());
        self.dirty = true;
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = Some(content.to_string());
        self.dirty = true;
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn visible_text(&self) -> String {
        self.content.clone().unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
