//! The application controller: process-wide state and the per-tick poll.
//!
//! The controller owns every subsystem and runs them on one thread. A tick
//! polls the plugins, then the tap, then drains the tap's action queue in
//! insertion order. GUI input arrives through the foreign interface and is
//! routed here; LLM traffic is an explicit submit/poll/execute three-step
//! so responses are inspected by the user before anything runs.

use crate::action::{Action, ContextUsage, RawTarget, SpawnSpec};
use crate::grid::{GridManager, PaneLayout};
use crate::input::{
    AppAction, KeyEvent, app_binding, decode_key_event, key_event_to_bytes,
};
use crate::llm::{LlmClient, PaneContext};
use crate::overlay::{FocusLayer, OverlayMap, WatermarkMap};
use crate::plugin::{PanePlugin, RenderData, create_plugin};
use crate::tap::TextTapServer;
use std::ffi::CString;
use std::time::Instant;
use termania_config::{Config, PaneEntryConfig};

/// Title used when surfacing a bare `message` action as a notification.
const MESSAGE_NOTIFICATION_TITLE: &str = "trm";

const FONT_SIZE_MIN: f32 = 6.0;
const FONT_SIZE_MAX: f32 = 72.0;

pub struct Controller {
    config: Config,
    grid: GridManager,
    panes: Vec<PanePlugin>,
    tap: Option<TextTapServer>,
    llm: LlmClient,
    overlays: OverlayMap,
    watermarks: WatermarkMap,
    focused: u32,
    broadcast_mode: bool,
    pending_notification: Option<(String, String)>,
    pending_context: Option<(ContextUsage, Instant)>,
    /// Kept alive for the borrowed pointer handed across the ABI.
    font_family: CString,
    font_size: f32,
}

impl Controller {
    /// Build the controller from a config: grid panes, plugins, tap, LLM.
    pub fn new(config: Config) -> Self {
        let grid = GridManager::new(config.grid.rows, config.grid.cols);
        let pane_count = grid.total_panes();

        let mut watermarks = WatermarkMap::new();
        let mut panes = Vec::with_capacity(pane_count as usize);
        let default_entry = PaneEntryConfig::default();
        for index in 0..pane_count {
            let entry = config
                .panes
                .get(index as usize)
                .unwrap_or(&default_entry);
            if let Some(watermark) = &entry.watermark {
                watermarks.set(index, watermark);
            }
            panes.push(create_plugin(index, entry, &config.grid));
        }

        let tap = if config.text_tap.enabled {
            let mut server = TextTapServer::new(&config.text_tap.socket_path, pane_count);
            match server.start() {
                Ok(()) => Some(server),
                Err(e) => {
                    // The core is still usable without the tap; the GUI
                    // keeps working, external tools just cannot connect.
                    log::error!("text tap disabled: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        let font_family = CString::new(config.font.family.clone()).unwrap_or_default();
        let font_size = config.font.size;
        let llm = LlmClient::new(config.llm.clone());

        log::info!(
            "controller started: {} pane(s), tap {}",
            pane_count,
            if tap.is_some() { "on" } else { "off" }
        );

        Self {
            config,
            grid,
            panes,
            tap,
            llm,
            overlays: OverlayMap::new(),
            watermarks,
            focused: 0,
            broadcast_mode: false,
            pending_notification: None,
            pending_context: None,
            font_family,
            font_size,
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// One controller tick. Polls every plugin, then the tap, then applies
    /// queued actions. Returns the number of panes with fresh output.
    pub fn poll(&mut self) -> u32 {
        let mut dirty = 0;
        for plugin in &mut self.panes {
            if plugin.poll() {
                dirty += 1;
            }
        }

        let drained = match &mut self.tap {
            Some(tap) => {
                tap.set_pane_count(self.panes.len() as u32);
                tap.poll();
                let mut actions = Vec::new();
                while let Some(action) = tap.pop_action() {
                    actions.push(action);
                }
                actions
            }
            None => Vec::new(),
        };
        for action in drained {
            self.apply_action(action);
        }

        dirty
    }

    /// Apply one action to the owning subsystem.
    pub fn apply_action(&mut self, action: Action) {
        log::debug!("applying action:{}", action.display_line());
        match action {
            Action::RawSend { target, bytes } => match target {
                RawTarget::Pane(pane) => {
                    if let Some(plugin) = self.panes.get_mut(pane as usize) {
                        plugin.write_input(bytes.as_bytes());
                    } else {
                        log::debug!("raw send to missing pane {pane} dropped");
                    }
                }
                RawTarget::All => {
                    for plugin in &mut self.panes {
                        plugin.write_input(bytes.as_bytes());
                    }
                }
            },
            Action::SendCommand { pane, command } => {
                if let Some(plugin) = self.panes.get_mut(pane as usize) {
                    plugin.write_input(command.as_bytes());
                    plugin.write_input(b"\r");
                }
            }
            Action::SendToAll { command } => {
                for plugin in &mut self.panes {
                    plugin.write_input(command.as_bytes());
                    plugin.write_input(b"\r");
                }
            }
            Action::SetTitle { pane, title } => {
                if let Some(plugin) = self.panes.get_mut(pane as usize) {
                    plugin.set_title(&title);
                }
            }
            Action::SetWatermark { pane, watermark } => {
                if (pane as usize) < self.panes.len() {
                    self.watermarks.set(pane, &watermark);
                }
            }
            Action::ClearWatermark { pane } => self.watermarks.clear(pane),
            Action::Navigate { pane, url } => {
                if let Some(plugin) = self.panes.get_mut(pane as usize) {
                    plugin.set_location(&url);
                }
            }
            Action::SetContent { pane, content } => {
                if let Some(plugin) = self.panes.get_mut(pane as usize) {
                    plugin.set_content(&content);
                }
            }
            Action::SpawnPane(spec) => self.spawn_pane(&spec),
            Action::ClosePane { pane } => self.close_pane_at(pane),
            Action::ReplacePane { pane, spec } => self.replace_pane(pane, &spec),
            Action::SwapPanes { a, b } => {
                let (a, b) = (a as usize, b as usize);
                if a < self.panes.len() && b < self.panes.len() && a != b {
                    self.panes.swap(a, b);
                }
            }
            Action::FocusPane { pane } => {
                if (pane as usize) < self.panes.len() {
                    self.focused = pane;
                }
            }
            Action::Message { text } => {
                self.pending_notification =
                    Some((MESSAGE_NOTIFICATION_TITLE.to_string(), text));
            }
            Action::Notify { title, body } => {
                self.pending_notification = Some((title, body));
            }
            Action::ContextUsage(usage) => {
                self.pending_context = Some((usage, Instant::now()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Pane lifecycle
    // ------------------------------------------------------------------

    fn entry_from_spec(spec: &SpawnSpec) -> PaneEntryConfig {
        PaneEntryConfig {
            pane_type: Some(spec.pane_type.clone()),
            title: spec.title.clone(),
            command: spec.command.clone(),
            cwd: spec.cwd.clone(),
            url: spec.url.clone(),
            content: spec.content.clone(),
            watermark: spec.watermark.clone(),
            row: spec.row,
        }
    }

    /// Create a pane from a spawn spec and focus it. The pane joins the
    /// requested grid row, or the last row when the request is absent or
    /// out of range.
    fn spawn_pane(&mut self, spec: &SpawnSpec) {
        let entry = Self::entry_from_spec(spec);
        let row = match spec.row {
            Some(row) if row < self.grid.num_rows() => row,
            _ => self.grid.num_rows().saturating_sub(1),
        };
        let Some(insert_at) = self.grid.row_append_index(row) else {
            return;
        };
        self.grid.add_col_to_row(row);

        self.overlays.shift_for_insert(insert_at);
        self.watermarks.shift_for_insert(insert_at);

        let plugin = create_plugin(insert_at, &entry, &self.config.grid);
        self.panes.insert(insert_at as usize, plugin);
        if let Some(watermark) = &spec.watermark {
            self.watermarks.set(insert_at, watermark);
        }
        self.focused = insert_at;
        self.sync_tap_pane_count();
    }

    /// Close the pane at `pane`. Closing the last remaining pane is
    /// forbidden and ignored.
    fn close_pane_at(&mut self, pane: u32) {
        let index = pane as usize;
        if index >= self.panes.len() {
            return;
        }
        if self.panes.len() == 1 {
            log::debug!("refusing to close the last pane");
            return;
        }

        if pane < self.grid.total_panes() {
            if let Some((row, _col)) = self.grid.pane_position(pane) {
                self.grid.remove_col_from_row(row);
            }
        }

        let mut plugin = self.panes.remove(index);
        plugin.dispose();
        self.overlays.remove_pane(pane);
        self.watermarks.remove_pane(pane);

        if self.focused > pane {
            self.focused -= 1;
        }
        if self.focused as usize >= self.panes.len() {
            self.focused = self.panes.len() as u32 - 1;
        }
        self.sync_tap_pane_count();
    }

    /// Swap the pane's plugin for a freshly created one.
    fn replace_pane(&mut self, pane: u32, spec: &SpawnSpec) {
        let index = pane as usize;
        if index >= self.panes.len() {
            return;
        }
        let entry = Self::entry_from_spec(spec);
        let mut old = std::mem::replace(
            &mut self.panes[index],
            create_plugin(pane, &entry, &self.config.grid),
        );
        old.dispose();
        if let Some(watermark) = &spec.watermark {
            self.watermarks.set(pane, watermark);
        }
    }

    fn sync_tap_pane_count(&mut self) {
        let count = self.panes.len() as u32;
        if let Some(tap) = &mut self.tap {
            tap.set_pane_count(count);
        }
    }

    // ------------------------------------------------------------------
    // GUI actions, keys and text
    // ------------------------------------------------------------------

    /// Execute a GUI-originated app action.
    pub fn app_action(&mut self, action: AppAction) {
        let pane_count = self.panes.len() as u32;
        match action {
            AppAction::NewPane => self.spawn_pane(&SpawnSpec {
                pane_type: "terminal".to_string(),
                ..Default::default()
            }),
            AppAction::ClosePane => self.close_pane_at(self.focused),
            AppAction::NavigateRight | AppAction::NavigateDown => {
                self.focused = (self.focused + 1) % pane_count;
            }
            AppAction::NavigateLeft | AppAction::NavigateUp => {
                self.focused = (self.focused + pane_count - 1) % pane_count;
            }
            AppAction::JumpToPane(k) => {
                let index = u32::from(k) - 1;
                if index < pane_count {
                    self.focused = index;
                }
            }
            AppAction::BroadcastToggle => {
                self.broadcast_mode = !self.broadcast_mode;
                log::info!(
                    "broadcast mode {}",
                    if self.broadcast_mode { "on" } else { "off" }
                );
            }
            AppAction::FontSizeIncrease => {
                self.font_size = (self.font_size + 1.0).min(FONT_SIZE_MAX);
            }
            AppAction::FontSizeDecrease => {
                self.font_size = (self.font_size - 1.0).max(FONT_SIZE_MIN);
            }
            // Rendered by the host; nothing to track in the core.
            AppAction::RenamePane
            | AppAction::CommandOverlayToggle
            | AppAction::HelpToggle => {}
        }
    }

    /// Raw key event from the frontend: app keybindings first, then
    /// terminal bytes to the focused pane.
    pub fn handle_key(&mut self, key: u8, mods: u8) {
        if let Some(event) = decode_key_event(key, mods) {
            self.handle_key_event(&event);
        }
    }

    /// Raw text from the frontend, honoring broadcast mode.
    pub fn send_text(&mut self, bytes: &[u8]) {
        if self.broadcast_mode {
            for plugin in &mut self.panes {
                plugin.write_input(bytes);
            }
        } else {
            let target = self.input_target() as usize;
            if let Some(plugin) = self.panes.get_mut(target) {
                plugin.write_input(bytes);
            }
        }
    }

    /// The pane that should receive input: the focused pane, or its
    /// overlay background when the overlay focus bit says so.
    fn input_target(&self) -> u32 {
        if let (Some(FocusLayer::Background), Some(bg)) = (
            self.overlays.focus(self.focused),
            self.overlays.background_of(self.focused),
        ) {
            bg
        } else {
            self.focused
        }
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        if let Some(action) = app_binding(event) {
            self.app_action(action);
            return;
        }
        let bytes = key_event_to_bytes(event);
        if !bytes.is_empty() {
            let target = self.input_target() as usize;
            if let Some(plugin) = self.panes.get_mut(target) {
                plugin.write_input(&bytes);
            }
        }
    }

    // ------------------------------------------------------------------
    // Overlays
    // ------------------------------------------------------------------

    /// Create a background pane of `type_name` overlaid behind `fg`.
    pub fn add_overlay(&mut self, fg: u32, type_name: &str) -> bool {
        if (fg as usize) >= self.panes.len() || self.overlays.has_overlay(fg) {
            return false;
        }
        let entry = PaneEntryConfig {
            pane_type: Some(type_name.to_string()),
            ..Default::default()
        };
        let bg = self.panes.len() as u32;
        self.panes.push(create_plugin(bg, &entry, &self.config.grid));
        self.overlays.set(fg, bg);
        self.sync_tap_pane_count();
        true
    }

    /// Remove `fg`'s overlay and dispose its background pane.
    pub fn remove_overlay(&mut self, fg: u32) -> bool {
        let Some(bg) = self.overlays.remove(fg) else {
            return false;
        };
        if (bg as usize) < self.panes.len() && self.panes.len() > 1 {
            let mut plugin = self.panes.remove(bg as usize);
            plugin.dispose();
            self.overlays.remove_pane(bg);
            self.watermarks.remove_pane(bg);
            if self.focused > bg {
                self.focused -= 1;
            }
        }
        self.sync_tap_pane_count();
        true
    }

    /// Swap the plugins of an overlay pair, bringing the background to
    /// the front.
    pub fn swap_overlay(&mut self, fg: u32) -> bool {
        let Some(bg) = self.overlays.background_of(fg) else {
            return false;
        };
        let (a, b) = (fg as usize, bg as usize);
        if a < self.panes.len() && b < self.panes.len() {
            self.panes.swap(a, b);
            true
        } else {
            false
        }
    }

    pub fn toggle_overlay_focus(&mut self, fg: u32) -> bool {
        self.overlays.toggle_focus(fg).is_some()
    }

    pub fn has_overlay(&self, fg: u32) -> bool {
        self.overlays.has_overlay(fg)
    }

    // ------------------------------------------------------------------
    // Watermarks
    // ------------------------------------------------------------------

    pub fn set_watermark(&mut self, pane: u32, watermark: &str) {
        if (pane as usize) < self.panes.len() {
            self.watermarks.set(pane, watermark);
        }
    }

    pub fn watermark(&self, pane: u32) -> Option<&str> {
        self.watermarks.get(pane)
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    /// Take the pending notification, if any.
    pub fn take_notification(&mut self) -> Option<(String, String)> {
        self.pending_notification.take()
    }

    /// Latest context-usage telemetry; stays until overwritten.
    pub fn context_usage(&self) -> Option<&ContextUsage> {
        self.pending_context.as_ref().map(|(usage, _at)| usage)
    }

    // ------------------------------------------------------------------
    // LLM lifecycle
    // ------------------------------------------------------------------

    pub fn llm_submit(&mut self, prompt: &str) {
        self.llm.submit(prompt);
    }

    /// Perform a pending LLM request. Blocking; call from a context that
    /// tolerates a multi-second stall.
    pub fn llm_poll(&mut self) {
        let contexts = self.pane_contexts();
        self.llm.poll(&contexts);
    }

    pub fn llm_status_byte(&self) -> u8 {
        self.llm.status_byte()
    }

    pub fn llm_response_text(&self) -> Option<&str> {
        self.llm
            .last_response()
            .map(|response| response.explanation.as_str())
    }

    pub fn llm_action_count(&self) -> u32 {
        self.llm
            .last_response()
            .map_or(0, |response| response.actions.len() as u32)
    }

    pub fn llm_action_display(&self, index: u32) -> Option<String> {
        self.llm
            .last_response()
            .and_then(|response| response.actions.get(index as usize))
            .map(Action::display_line)
    }

    /// Execute the held response's actions and reset the client to idle.
    pub fn llm_execute(&mut self) {
        for action in self.llm.take_actions() {
            self.apply_action(action);
        }
    }

    /// Snapshot every pane for prompt construction.
    fn pane_contexts(&self) -> Vec<PaneContext> {
        self.panes
            .iter()
            .enumerate()
            .map(|(index, plugin)| PaneContext {
                index: index as u32,
                pane_type: plugin.kind().name().to_string(),
                title: plugin.title(),
                visible_text: plugin.visible_text(),
                subprocess_info: plugin.child_pid().map(|pid| {
                    format!(
                        "pid {pid} ({})",
                        if plugin.is_exited() { "exited" } else { "running" }
                    )
                }),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Render-facing accessors
    // ------------------------------------------------------------------

    pub fn pane_count(&self) -> u32 {
        self.panes.len() as u32
    }

    pub fn focused_pane(&self) -> u32 {
        self.focused
    }

    pub fn set_focused_pane(&mut self, pane: u32) {
        if (pane as usize) < self.panes.len() {
            self.focused = pane;
        }
    }

    pub fn broadcast_mode(&self) -> bool {
        self.broadcast_mode
    }

    pub fn pane(&self, index: u32) -> Option<&PanePlugin> {
        self.panes.get(index as usize)
    }

    pub fn pane_mut(&mut self, index: u32) -> Option<&mut PanePlugin> {
        self.panes.get_mut(index as usize)
    }

    /// Render snapshot for a pane, with its watermark attached.
    pub fn pane_render_data(&self, index: u32) -> Option<RenderData> {
        let plugin = self.panes.get(index as usize)?;
        let mut data = plugin.render_data();
        data.watermark = self.watermarks.get(index).map(str::to_string);
        Some(data)
    }

    pub fn layouts(&self, window_w: f32, window_h: f32, scale: f32) -> Vec<PaneLayout> {
        self.grid
            .compute_layout(window_w, window_h, &self.config.window, scale)
    }

    /// Window resize: recompute the layout and push new grid sizes into
    /// every gridded pane.
    pub fn resize(&mut self, window_w: f32, window_h: f32, scale: f32, cell_w: f32, cell_h: f32) {
        if cell_w <= 0.0 || cell_h <= 0.0 {
            return;
        }
        let layouts = self.layouts(window_w, window_h, scale);
        for (index, layout) in layouts.iter().enumerate() {
            if let Some(plugin) = self.panes.get_mut(index) {
                let rows = ((layout.height - layout.title_height) / cell_h).floor() as u16;
                let cols = (layout.width / cell_w).floor() as u16;
                plugin.resize(rows.max(1), cols.max(1));
            }
        }
    }

    pub fn font_family_ptr(&self) -> *const std::ffi::c_char {
        self.font_family.as_ptr()
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn grid(&self) -> &GridManager {
        &self.grid
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        log::info!("controller shutting down");
        for plugin in &mut self.panes {
            plugin.dispose();
        }
        // The tap's own Drop closes clients and unlinks the socket file.
    }
}
