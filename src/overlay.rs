//! Per-pane overlay pairs and watermark strings.
//!
//! Overlays pair a foreground pane with a background pane occupying the
//! same layout cell; a focus bit selects which of the two receives input.
//! Both registries are index-to-value lookups that never own panes: when a
//! pane is removed the controller calls `remove_pane` so entries referring
//! to the dead index are scrubbed and higher indices slide down.

use std::collections::HashMap;

/// Which member of an overlay pair currently has input focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusLayer {
    #[default]
    Foreground,
    Background,
}

#[derive(Debug, Clone, Copy)]
struct OverlayEntry {
    bg: u32,
    focus: FocusLayer,
}

/// Foreground pane index -> background pane index plus focus bit.
#[derive(Debug, Default)]
pub struct OverlayMap {
    entries: HashMap<u32, OverlayEntry>,
}

impl OverlayMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the overlay pair for `fg`.
    pub fn set(&mut self, fg: u32, bg: u32) {
        self.entries.insert(
            fg,
            OverlayEntry {
                bg,
                focus: FocusLayer::Foreground,
            },
        );
    }

    /// Remove the pair for `fg`, returning the background index if any.
    pub fn remove(&mut self, fg: u32) -> Option<u32> {
        self.entries.remove(&fg).map(|entry| entry.bg)
    }

    pub fn background_of(&self, fg: u32) -> Option<u32> {
        self.entries.get(&fg).map(|entry| entry.bg)
    }

    pub fn has_overlay(&self, fg: u32) -> bool {
        self.entries.contains_key(&fg)
    }

    pub fn focus(&self, fg: u32) -> Option<FocusLayer> {
        self.entries.get(&fg).map(|entry| entry.focus)
    }

    /// Flip the focus bit for `fg`. Returns the new layer, or `None` when
    /// no overlay is registered.
    pub fn toggle_focus(&mut self, fg: u32) -> Option<FocusLayer> {
        let entry = self.entries.get_mut(&fg)?;
        entry.focus = match entry.focus {
            FocusLayer::Foreground => FocusLayer::Background,
            FocusLayer::Background => FocusLayer::Foreground,
        };
        Some(entry.focus)
    }

    /// Scrub entries referencing `removed` and shift higher indices down.
    pub fn remove_pane(&mut self, removed: u32) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|(fg, entry)| *fg != removed && entry.bg != removed)
            .map(|(fg, mut entry)| {
                let fg = if fg > removed { fg - 1 } else { fg };
                if entry.bg > removed {
                    entry.bg -= 1;
                }
                (fg, entry)
            })
            .collect();
    }

    /// Shift indices at or above `at` up by one, for a pane insertion.
    pub fn shift_for_insert(&mut self, at: u32) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(fg, mut entry)| {
                let fg = if fg >= at { fg + 1 } else { fg };
                if entry.bg >= at {
                    entry.bg += 1;
                }
                (fg, entry)
            })
            .collect();
    }
}

/// Maximum stored watermark length in bytes.
pub const WATERMARK_MAX_LEN: usize = 128;

/// Pane index -> decorative watermark string, bounded to 128 bytes.
#[derive(Debug, Default)]
pub struct WatermarkMap {
    entries: HashMap<u32, String>,
}

impl WatermarkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a watermark, truncating to the byte bound on a char boundary.
    pub fn set(&mut self, pane: u32, watermark: &str) {
        let mut end = watermark.len().min(WATERMARK_MAX_LEN);
        while end > 0 && !watermark.is_char_boundary(end) {
            end -= 1;
        }
        self.entries.insert(pane, watermark[..end].to_string());
    }

    pub fn clear(&mut self, pane: u32) {
        self.entries.remove(&pane);
    }

    pub fn get(&self, pane: u32) -> Option<&str> {
        self.entries.get(&pane).map(String::as_str)
    }

    /// Drop the removed pane's entry and shift higher indices down.
    pub fn remove_pane(&mut self, removed: u32) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|(pane, _)| *pane != removed)
            .map(|(pane, text)| (if pane > removed { pane - 1 } else { pane }, text))
            .collect();
    }

    /// Shift indices at or above `at` up by one, for a pane insertion.
    pub fn shift_for_insert(&mut self, at: u32) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(pane, text)| (if pane >= at { pane + 1 } else { pane }, text))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_set_and_lookup() {
        let mut overlays = OverlayMap::new();
        overlays.set(0, 3);
        assert!(overlays.has_overlay(0));
        assert_eq!(overlays.background_of(0), Some(3));
        assert_eq!(overlays.focus(0), Some(FocusLayer::Foreground));
        assert!(!overlays.has_overlay(3));
    }

    #[test]
    fn test_overlay_toggle_focus() {
        let mut overlays = OverlayMap::new();
        overlays.set(1, 2);
        assert_eq!(overlays.toggle_focus(1), Some(FocusLayer::Background));
        assert_eq!(overlays.toggle_focus(1), Some(FocusLayer::Foreground));
        assert_eq!(overlays.toggle_focus(9), None);
    }

    #[test]
    fn test_overlay_remove_pane_scrubs_and_shifts() {
        let mut overlays = OverlayMap::new();
        overlays.set(0, 4);
        overlays.set(2, 5);
        overlays.remove_pane(4);
        // The pair referencing pane 4 is gone; pane 5 slid down to 4.
        assert!(!overlays.has_overlay(0));
        assert_eq!(overlays.background_of(2), Some(4));
    }

    #[test]
    fn test_overlay_shift_for_insert() {
        let mut overlays = OverlayMap::new();
        overlays.set(1, 3);
        overlays.shift_for_insert(2);
        assert_eq!(overlays.background_of(1), Some(4));
    }

    #[test]
    fn test_watermark_roundtrip_and_clear() {
        let mut marks = WatermarkMap::new();
        marks.set(0, "staging");
        assert_eq!(marks.get(0), Some("staging"));
        marks.clear(0);
        assert_eq!(marks.get(0), None);
    }

    #[test]
    fn test_watermark_truncates_to_bound() {
        let mut marks = WatermarkMap::new();
        let long = "x".repeat(300);
        marks.set(0, &long);
        assert_eq!(marks.get(0).unwrap().len(), WATERMARK_MAX_LEN);
    }

    #[test]
    fn test_watermark_truncates_on_char_boundary() {
        let mut marks = WatermarkMap::new();
        // 3-byte chars: 128 is not a boundary (42 * 3 = 126).
        let long = "\u{65e5}".repeat(50);
        marks.set(0, &long);
        let stored = marks.get(0).unwrap();
        assert!(stored.len() <= WATERMARK_MAX_LEN);
        assert_eq!(stored.len() % 3, 0);
    }

    #[test]
    fn test_watermark_remove_pane_shifts() {
        let mut marks = WatermarkMap::new();
        marks.set(1, "one");
        marks.set(3, "three");
        marks.remove_pane(1);
        assert_eq!(marks.get(1), None);
        assert_eq!(marks.get(2), Some("three"));
    }
}
