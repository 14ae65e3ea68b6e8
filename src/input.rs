//! Keyboard input: decoding raw key/modifier bytes from the frontend and
//! converting key events to terminal input bytes.
//!
//! Terminal-bound keys follow xterm conventions. App-level keybindings
//! (all on Ctrl+Shift) are matched first by the controller and never reach
//! the PTY.

/// A decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A printable key, stored as its unshifted US-QWERTY character.
    Char(char),
    Enter,
    Tab,
    Escape,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function key F1..F12.
    F(u8),
}

/// Modifier state accompanying a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMods {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl KeyMods {
    pub fn from_byte(mods: u8) -> Self {
        Self {
            ctrl: mods & 0x01 != 0,
            alt: mods & 0x02 != 0,
            shift: mods & 0x04 != 0,
            super_key: mods & 0x08 != 0,
        }
    }

    fn any(&self) -> bool {
        self.ctrl || self.alt || self.shift
    }

    /// xterm modifier parameter: 1 + shift + 2*alt + 4*ctrl.
    fn xterm_param(&self) -> u8 {
        1 + u8::from(self.shift) + 2 * u8::from(self.alt) + 4 * u8::from(self.ctrl)
    }
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub mods: KeyMods,
}

/// App-level commands triggered by keybindings or the frontend directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    NewPane,
    ClosePane,
    NavigateLeft,
    NavigateRight,
    NavigateUp,
    NavigateDown,
    /// Jump to pane 1..=9.
    JumpToPane(u8),
    BroadcastToggle,
    FontSizeIncrease,
    FontSizeDecrease,
    RenamePane,
    CommandOverlayToggle,
    HelpToggle,
}

impl AppAction {
    /// Decode the action byte used by the foreign interface.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => AppAction::NewPane,
            1 => AppAction::ClosePane,
            2 => AppAction::NavigateLeft,
            3 => AppAction::NavigateRight,
            4 => AppAction::NavigateUp,
            5 => AppAction::NavigateDown,
            6..=14 => AppAction::JumpToPane(value - 5),
            15 => AppAction::BroadcastToggle,
            16 => AppAction::FontSizeIncrease,
            17 => AppAction::FontSizeDecrease,
            18 => AppAction::RenamePane,
            19 => AppAction::CommandOverlayToggle,
            20 => AppAction::HelpToggle,
            _ => return None,
        })
    }
}

/// Decode a raw key code byte plus modifier byte into a [`KeyEvent`].
///
/// The code table is part of the foreign interface and must stay stable:
/// 0x00-0x19 letters a-z, 0x1A-0x23 digits 0-9, 0x24.. named keys,
/// 0x33-0x3E F1-F12, 0x3F.. punctuation.
pub fn decode_key_event(code: u8, mods: u8) -> Option<KeyEvent> {
    let key = match code {
        0x00..=0x19 => KeyCode::Char((b'a' + code) as char),
        0x1A..=0x23 => KeyCode::Char((b'0' + (code - 0x1A)) as char),
        0x24 => KeyCode::Enter,
        0x25 => KeyCode::Tab,
        0x26 => KeyCode::Escape,
        0x27 => KeyCode::Backspace,
        0x28 => KeyCode::Char(' '),
        0x29 => KeyCode::Insert,
        0x2A => KeyCode::Delete,
        0x2B => KeyCode::Home,
        0x2C => KeyCode::End,
        0x2D => KeyCode::PageUp,
        0x2E => KeyCode::PageDown,
        0x2F => KeyCode::Up,
        0x30 => KeyCode::Down,
        0x31 => KeyCode::Left,
        0x32 => KeyCode::Right,
        0x33..=0x3E => KeyCode::F(code - 0x33 + 1),
        0x3F => KeyCode::Char('-'),
        0x40 => KeyCode::Char('='),
        0x41 => KeyCode::Char('['),
        0x42 => KeyCode::Char(']'),
        0x43 => KeyCode::Char('\\'),
        0x44 => KeyCode::Char(';'),
        0x45 => KeyCode::Char('\''),
        0x46 => KeyCode::Char(','),
        0x47 => KeyCode::Char('.'),
        0x48 => KeyCode::Char('/'),
        0x49 => KeyCode::Char('`'),
        _ => return None,
    };
    Some(KeyEvent {
        key,
        mods: KeyMods::from_byte(mods),
    })
}

/// Match an app keybinding: every binding requires Ctrl+Shift and no Super.
pub fn app_binding(event: &KeyEvent) -> Option<AppAction> {
    let mods = event.mods;
    if !mods.ctrl || !mods.shift || mods.super_key {
        return None;
    }
    Some(match event.key {
        KeyCode::Char('n') => AppAction::NewPane,
        KeyCode::Char('w') => AppAction::ClosePane,
        KeyCode::Left => AppAction::NavigateLeft,
        KeyCode::Right => AppAction::NavigateRight,
        KeyCode::Up => AppAction::NavigateUp,
        KeyCode::Down => AppAction::NavigateDown,
        KeyCode::Char(c @ '1'..='9') => AppAction::JumpToPane(c as u8 - b'0'),
        KeyCode::Char('r') => AppAction::RenamePane,
        KeyCode::Char('b') => AppAction::BroadcastToggle,
        // '+' arrives as shifted '='.
        KeyCode::Char('=') => AppAction::FontSizeIncrease,
        KeyCode::Char('-') => AppAction::FontSizeDecrease,
        KeyCode::Enter => AppAction::CommandOverlayToggle,
        KeyCode::Char('/') => AppAction::HelpToggle,
        _ => return None,
    })
}

/// US-QWERTY shifted form of a printable key.
fn shifted(c: char) -> char {
    match c {
        'a'..='z' => c.to_ascii_uppercase(),
        '1' => '!',
        '2' => '@',
        '3' => '#',
        '4' => '$',
        '5' => '%',
        '6' => '^',
        '7' => '&',
        '8' => '*',
        '9' => '(',
        '0' => ')',
        '-' => '_',
        '=' => '+',
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        ';' => ':',
        '\'' => '"',
        ',' => '<',
        '.' => '>',
        '/' => '?',
        '`' => '~',
        _ => c,
    }
}

fn csi_with_mods(out: &mut Vec<u8>, param: u8, mods: &KeyMods, final_byte: u8) {
    out.extend_from_slice(b"\x1b[");
    if mods.any() {
        out.push(b'0' + param);
        out.push(b';');
        out.push(b'0' + mods.xterm_param());
    } else if param != 1 {
        out.push(b'0' + param);
    }
    out.push(final_byte);
}

fn tilde_seq(out: &mut Vec<u8>, code: u8, mods: &KeyMods) {
    out.extend_from_slice(b"\x1b[");
    if code >= 10 {
        out.push(b'0' + code / 10);
    }
    out.push(b'0' + code % 10);
    if mods.any() {
        out.push(b';');
        out.push(b'0' + mods.xterm_param());
    }
    out.push(b'~');
}

/// Convert a key event to the bytes a terminal application expects.
///
/// Returns an empty vector for combinations that produce no input.
pub fn key_event_to_bytes(event: &KeyEvent) -> Vec<u8> {
    let mods = event.mods;
    let mut out = Vec::with_capacity(8);

    match event.key {
        KeyCode::Char(c) => {
            if mods.ctrl && c.is_ascii_lowercase() {
                // Ctrl+A..Ctrl+Z map to 0x01..0x1A; Alt adds an ESC prefix.
                if mods.alt {
                    out.push(0x1b);
                }
                out.push(c as u8 - b'a' + 1);
            } else {
                if mods.alt {
                    out.push(0x1b);
                }
                let ch = if mods.shift { shifted(c) } else { c };
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
        KeyCode::Enter => out.push(b'\r'),
        KeyCode::Tab => {
            if mods.shift {
                out.extend_from_slice(b"\x1b[Z");
            } else {
                out.push(b'\t');
            }
        }
        KeyCode::Escape => out.push(0x1b),
        KeyCode::Backspace => {
            if mods.ctrl {
                out.push(0x08);
            } else {
                if mods.alt {
                    out.push(0x1b);
                }
                out.push(0x7f);
            }
        }
        KeyCode::Up => csi_with_mods(&mut out, 1, &mods, b'A'),
        KeyCode::Down => csi_with_mods(&mut out, 1, &mods, b'B'),
        KeyCode::Right => csi_with_mods(&mut out, 1, &mods, b'C'),
        KeyCode::Left => csi_with_mods(&mut out, 1, &mods, b'D'),
        KeyCode::Home => csi_with_mods(&mut out, 1, &mods, b'H'),
        KeyCode::End => csi_with_mods(&mut out, 1, &mods, b'F'),
        KeyCode::Insert => tilde_seq(&mut out, 2, &mods),
        KeyCode::Delete => tilde_seq(&mut out, 3, &mods),
        KeyCode::PageUp => tilde_seq(&mut out, 5, &mods),
        KeyCode::PageDown => tilde_seq(&mut out, 6, &mods),
        KeyCode::F(n @ 1..=4) => {
            if mods.any() {
                csi_with_mods(&mut out, 1, &mods, b'P' + n - 1);
            } else {
                out.extend_from_slice(b"\x1bO");
                out.push(b'P' + n - 1);
            }
        }
        KeyCode::F(n @ 5..=12) => {
            const VT_CODES: [u8; 8] = [15, 17, 18, 19, 20, 21, 23, 24];
            tilde_seq(&mut out, VT_CODES[(n - 5) as usize], &mods);
        }
        KeyCode::F(_) => {}
    }

    out
}
