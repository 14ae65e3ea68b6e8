//! The terminal pane plugin: a PTY plus a VT emulator.
//!
//! A background reader thread drains the PTY into a channel; `poll()` on
//! the controller thread consumes the channel without blocking and feeds
//! the emulator. All other methods are synchronous and non-blocking.

use super::{
    CELL_FLAG_BOLD, CELL_FLAG_INVERSE, CELL_FLAG_ITALIC, CELL_FLAG_UNDERLINE, CURSOR_AWAY,
    CellData, RenderData,
};
use portable_pty::{CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::io::{Read, Write};
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::time::{Duration, Instant};
use termania_config::PaneEntryConfig;

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// Idle time after first output before queued initial commands are typed.
const INITIAL_COMMAND_IDLE: Duration = Duration::from_secs(1);

struct PtyHandles {
    master: Box<dyn MasterPty>,
    writer: Box<dyn std::io::Write + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    output: Receiver<Vec<u8>>,
}

pub struct TerminalPlugin {
    index: u32,
    parser: vt100::Parser,
    pty: Option<PtyHandles>,
    title: String,
    /// Set when the title came from config or a rename; the emulator's
    /// OSC title no longer overrides it.
    explicit_title: bool,
    initial_commands: Vec<String>,
    initial_sent: bool,
    first_output_time: Option<Instant>,
    last_output_time: Instant,
    dirty: bool,
    error: bool,
    exited: bool,
}

impl TerminalPlugin {
    /// Spawn a shell for pane `index`. A spawn failure yields a plugin
    /// with `has_error()` set instead of propagating: the pane still
    /// exists, it just renders as errored.
    pub fn new(index: u32, entry: &PaneEntryConfig, scrollback_lines: usize) -> Self {
        let initial_commands: Vec<String> = entry
            .command
            .iter()
            .flat_map(|command| command.lines())
            .map(str::to_string)
            .filter(|line| !line.is_empty())
            .collect();

        let mut plugin = Self {
            index,
            parser: vt100::Parser::new(DEFAULT_ROWS, DEFAULT_COLS, scrollback_lines),
            pty: None,
            title: entry.title.clone().unwrap_or_default(),
            explicit_title: entry.title.is_some(),
            initial_sent: initial_commands.is_empty(),
            initial_commands,
            first_output_time: None,
            last_output_time: Instant::now(),
            dirty: false,
            error: false,
            exited: false,
        };

        match spawn_shell(entry.cwd.as_deref()) {
            Ok(handles) => {
                if plugin.title.is_empty() {
                    plugin.title = default_shell_name();
                }
                plugin.pty = Some(handles);
            }
            Err(e) => {
                log::error!("pane {index}: failed to spawn shell: {e:#}");
                plugin.error = true;
                if plugin.title.is_empty() {
                    plugin.title = "failed".to_string();
                }
            }
        }

        plugin
    }

    pub fn title(&self) -> String {
        self.title.clone()
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.explicit_title = true;
    }

    /// Drain all bytes the reader thread has buffered and feed them to the
    /// emulator. Returns `true` iff any bytes were read this call.
    pub fn poll(&mut self) -> bool {
        let mut read_any = false;

        if let Some(pty) = &self.pty {
            loop {
                match pty.output.try_recv() {
                    Ok(bytes) => {
                        self.parser.process(&bytes);
                        read_any = true;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        // Reader thread is gone; the child has closed its
                        // end of the PTY.
                        self.exited = true;
                        break;
                    }
                }
            }
        }

        if read_any {
            let now = Instant::now();
            if self.first_output_time.is_none() {
                self.first_output_time = Some(now);
            }
            self.last_output_time = now;
            self.dirty = true;

            if !self.explicit_title {
                let osc_title = self.parser.screen().title();
                if !osc_title.is_empty() && osc_title != self.title {
                    self.title = osc_title.to_string();
                }
            }
        }

        self.flush_initial_commands();
        self.check_child_exit();

        read_any
    }

    /// Write user input to the PTY. Snaps the view back to the live screen
    /// first; write errors are discarded (the exit path will notice).
    pub fn write_input(&mut self, bytes: &[u8]) {
        if self.parser.screen().scrollback() > 0 {
            self.parser.screen_mut().set_scrollback(0);
            self.dirty = true;
        }
        if let Some(pty) = &mut self.pty {
            if let Err(e) = pty.writer.write_all(bytes).and_then(|_| pty.writer.flush()) {
                log::debug!("pane {}: PTY write dropped: {e}", self.index);
            }
        }
    }

    pub fn render_data(&self) -> RenderData {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();

        let (cursor_row, cursor_col) = if screen.scrollback() > 0 {
            (CURSOR_AWAY, CURSOR_AWAY)
        } else {
            screen.cursor_position()
        };

        let mut cells = vec![CellData::default(); rows as usize * cols as usize];
        for row in 0..rows {
            for col in 0..cols {
                if let Some(cell) = screen.cell(row, col) {
                    let slot = &mut cells[row as usize * cols as usize + col as usize];
                    slot.ch = cell.contents().chars().next().map_or(0, u32::from);
                    slot.fg = pack_color(cell.fgcolor());
                    slot.bg = pack_color(cell.bgcolor());
                    let mut flags = 0;
                    if cell.bold() {
                        flags |= CELL_FLAG_BOLD;
                    }
                    if cell.italic() {
                        flags |= CELL_FLAG_ITALIC;
                    }
                    if cell.underline() {
                        flags |= CELL_FLAG_UNDERLINE;
                    }
                    if cell.inverse() {
                        flags |= CELL_FLAG_INVERSE;
                    }
                    slot.flags = flags;
                }
            }
        }

        RenderData {
            rows,
            cols,
            cursor_row,
            cursor_col,
            cells,
            watermark: None,
        }
    }

    pub fn visible_text(&self) -> String {
        self.parser.screen().contents()
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let current = self.parser.screen().scrollback();
        self.parser.screen_mut().set_scrollback(current + lines);
        self.dirty = true;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let current = self.parser.screen().scrollback();
        self.parser
            .screen_mut()
            .set_scrollback(current.saturating_sub(lines));
        self.dirty = true;
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.pty.as_ref().and_then(|pty| pty.child.process_id())
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        if self.parser.screen().size() == (rows, cols) {
            return;
        }
        self.parser.screen_mut().set_size(rows, cols);
        if let Some(pty) = &self.pty {
            if let Err(e) = pty.master.resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            }) {
                log::warn!("pane {}: PTY resize failed: {e}", self.index);
            }
        }
        self.dirty = true;
    }

    /// Kill the child and drop the PTY handles.
    pub fn dispose(&mut self) {
        if let Some(mut pty) = self.pty.take() {
            if let Err(e) = pty.child.kill() {
                log::debug!("pane {}: kill on dispose: {e}", self.index);
            }
        }
        self.exited = true;
    }

    fn flush_initial_commands(&mut self) {
        if self.initial_sent {
            return;
        }
        let Some(_) = self.first_output_time else {
            return;
        };
        if self.last_output_time.elapsed() < INITIAL_COMMAND_IDLE {
            return;
        }
        let commands = std::mem::take(&mut self.initial_commands);
        for command in &commands {
            log::info!("pane {}: sending initial command {command:?}", self.index);
            self.write_input(command.as_bytes());
            self.write_input(b"\r");
        }
        self.initial_sent = true;
    }

    fn check_child_exit(&mut self) {
        if self.exited {
            return;
        }
        if let Some(pty) = &mut self.pty {
            match pty.child.try_wait() {
                Ok(Some(status)) => {
                    log::info!("pane {}: shell exited with {status:?}", self.index);
                    self.exited = true;
                    self.dirty = true;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("pane {}: try_wait failed: {e}", self.index);
                    self.exited = true;
                }
            }
        }
    }
}

impl Drop for TerminalPlugin {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

fn default_shell_name() -> String {
    let shell = default_shell();
    shell
        .rsplit('/')
        .next()
        .unwrap_or(shell.as_str())
        .to_string()
}

fn spawn_shell(cwd: Option<&str>) -> anyhow::Result<PtyHandles> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| anyhow::anyhow!("openpty failed: {e}"))?;

    let mut cmd = CommandBuilder::new(default_shell());
    cmd.env("TERM", "xterm-256color");
    if let Some(dir) = cwd {
        cmd.cwd(dir);
    }

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| anyhow::anyhow!("spawn failed: {e}"))?;
    drop(pair.slave);

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| anyhow::anyhow!("clone reader failed: {e}"))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| anyhow::anyhow!("take writer failed: {e}"))?;

    let (tx, output) = channel();
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    Ok(PtyHandles {
        master: pair.master,
        writer,
        child,
        output,
    })
}

fn pack_color(color: vt100::Color) -> u32 {
    match color {
        vt100::Color::Default => 0,
        vt100::Color::Idx(idx) => {
            let [r, g, b] = ansi_to_rgb(idx);
            u32::from_be_bytes([r, g, b, 0xff])
        }
        vt100::Color::Rgb(r, g, b) => u32::from_be_bytes([r, g, b, 0xff]),
    }
}

/// Convert an ANSI palette index to RGB.
fn ansi_to_rgb(color_idx: u8) -> [u8; 3] {
    match color_idx {
        // Standard 16 colors
        0 => [0, 0, 0],
        1 => [205, 0, 0],
        2 => [0, 205, 0],
        3 => [205, 205, 0],
        4 => [0, 0, 238],
        5 => [205, 0, 205],
        6 => [0, 205, 205],
        7 => [229, 229, 229],
        8 => [127, 127, 127],
        9 => [255, 0, 0],
        10 => [0, 255, 0],
        11 => [255, 255, 0],
        12 => [92, 92, 255],
        13 => [255, 0, 255],
        14 => [0, 255, 255],
        15 => [255, 255, 255],
        // 216 color cube (16-231)
        16..=231 => {
            let idx = color_idx - 16;
            let r = (idx / 36) * 51;
            let g = ((idx % 36) / 6) * 51;
            let b = (idx % 6) * 51;
            [r, g, b]
        }
        // Grayscale (232-255)
        232..=255 => {
            let gray = 8 + (color_idx - 232) * 10;
            [gray, gray, gray]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_to_rgb_palette() {
        assert_eq!(ansi_to_rgb(0), [0, 0, 0]);
        assert_eq!(ansi_to_rgb(15), [255, 255, 255]);
        assert_eq!(ansi_to_rgb(196), [255, 0, 0]);
        assert_eq!(ansi_to_rgb(232), [8, 8, 8]);
    }

    #[test]
    fn test_pack_color() {
        assert_eq!(pack_color(vt100::Color::Default), 0);
        assert_eq!(pack_color(vt100::Color::Rgb(1, 2, 3)), 0x010203ff);
    }

    #[test]
    fn test_spawn_and_dispose() {
        let entry = PaneEntryConfig::default();
        let mut plugin = TerminalPlugin::new(0, &entry, 1000);
        assert!(!plugin.has_error());
        assert!(plugin.child_pid().is_some());
        plugin.dispose();
        assert!(plugin.is_exited());
    }

    #[test]
    fn test_poll_reads_shell_output() {
        let entry = PaneEntryConfig::default();
        let mut plugin = TerminalPlugin::new(0, &entry, 1000);
        plugin.write_input(b"echo termania_ok\r");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while Instant::now() < deadline {
            plugin.poll();
            if plugin.visible_text().contains("termania_ok") {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(seen, "expected echo output in pane contents");
        assert!(plugin.is_dirty());
        plugin.dispose();
    }

    #[test]
    fn test_render_data_shape() {
        let entry = PaneEntryConfig::default();
        let plugin = TerminalPlugin::new(0, &entry, 1000);
        let data = plugin.render_data();
        assert_eq!(data.rows, DEFAULT_ROWS);
        assert_eq!(data.cols, DEFAULT_COLS);
        assert_eq!(data.cells.len(), (DEFAULT_ROWS as usize) * (DEFAULT_COLS as usize));
        assert_ne!(data.cursor_row, CURSOR_AWAY);
    }

    #[test]
    fn test_cursor_sentinel_when_scrolled() {
        let entry = PaneEntryConfig::default();
        let mut plugin = TerminalPlugin::new(0, &entry, 1000);
        plugin.scroll_up(5);
        let data = plugin.render_data();
        assert_eq!(data.cursor_row, CURSOR_AWAY);
        plugin.scroll_down(100);
        let data = plugin.render_data();
        assert_ne!(data.cursor_row, CURSOR_AWAY);
        plugin.dispose();
    }

    #[test]
    fn test_initial_command_splits_lines() {
        let entry = PaneEntryConfig {
            command: Some("echo a\necho b".to_string()),
            ..Default::default()
        };
        let plugin = TerminalPlugin::new(0, &entry, 100);
        assert_eq!(plugin.initial_commands, vec!["echo a", "echo b"]);
        assert!(!plugin.initial_sent);
        drop(plugin);
    }
}
