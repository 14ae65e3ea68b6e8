//! Stable C ABI for GUI frontends.
//!
//! Every function takes the opaque handle returned by [`termania_create`]
//! and tolerates a null handle by returning a safe default. Pointer
//! arguments are bounds-checked; string outputs write at most `max` bytes
//! and return the written length without a NUL terminator, except
//! [`termania_font_family`] which hands out a persistent NUL-terminated
//! pointer owned by the controller.
//!
//! The host must serialize all calls on a single thread; the core has no
//! internal locking.

use crate::controller::Controller;
use crate::input::AppAction;
use crate::plugin::CellData;
use std::ffi::{CStr, c_char};
use termania_config::Config;

/// Per-pane metadata snapshot handed to the renderer.
#[repr(C)]
pub struct PaneInfo {
    pub rows: u16,
    pub cols: u16,
    pub cursor_row: u16,
    pub cursor_col: u16,
    pub title: [u8; 128],
    pub title_len: u32,
    /// Bit 0 dirty, 1 has_error, 2 is_exited, 3 is_focused.
    pub flags: u8,
}

/// Pane rectangle in window pixels.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PaneLayoutOut {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub title_height: f32,
}

unsafe fn controller<'a>(handle: *mut Controller) -> Option<&'a mut Controller> {
    unsafe { handle.as_mut() }
}

/// Copy `src` into a caller buffer of `max` bytes, returning the number
/// of bytes written. No NUL terminator is appended.
unsafe fn copy_str(src: &str, buf: *mut u8, max: u32) -> u32 {
    if buf.is_null() || max == 0 {
        return 0;
    }
    let len = src.len().min(max as usize);
    unsafe {
        std::ptr::copy_nonoverlapping(src.as_ptr(), buf, len);
    }
    len as u32
}

/// Create a controller with default configuration. Returns null only when
/// construction is impossible.
#[unsafe(no_mangle)]
pub extern "C" fn termania_create() -> *mut Controller {
    crate::debug::init_log_bridge();
    Box::into_raw(Box::new(Controller::new(Config::default())))
}

/// Create a controller from a config file path. A missing or invalid
/// config falls back to defaults rather than failing creation.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_create_with_config(path: *const c_char) -> *mut Controller {
    crate::debug::init_log_bridge();
    let config = if path.is_null() {
        Config::default()
    } else {
        let path = unsafe { CStr::from_ptr(path) }.to_string_lossy();
        match Config::load(std::path::Path::new(path.as_ref())) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("config load failed, using defaults: {e:#}");
                Config::default()
            }
        }
    };
    Box::into_raw(Box::new(Controller::new(config)))
}

/// Destroy a controller and release every resource it owns.
///
/// # Safety
/// `handle` must be null or a pointer returned by `termania_create*` that
/// has not been destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_destroy(handle: *mut Controller) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Run one controller tick. Returns the number of dirty panes.
#[unsafe(no_mangle)]
pub extern "C" fn termania_poll(handle: *mut Controller) -> u32 {
    match unsafe { controller(handle) } {
        Some(ctrl) => ctrl.poll(),
        None => 0,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_pane_count(handle: *mut Controller) -> u32 {
    unsafe { controller(handle) }.map_or(0, |ctrl| ctrl.pane_count())
}

/// Fill `info` for pane `index`. Returns 1 on success, 0 otherwise.
///
/// # Safety
/// `info` must be null or valid for writes of `PaneInfo`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_pane_info(
    handle: *mut Controller,
    index: u32,
    info: *mut PaneInfo,
) -> u8 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    if info.is_null() {
        return 0;
    }
    let Some(plugin) = ctrl.pane(index) else {
        return 0;
    };
    let data = plugin.render_data();
    let title = plugin.title();

    let mut out = PaneInfo {
        rows: data.rows,
        cols: data.cols,
        cursor_row: data.cursor_row,
        cursor_col: data.cursor_col,
        title: [0; 128],
        title_len: 0,
        flags: 0,
    };
    let title_bytes = title.as_bytes();
    let len = title_bytes.len().min(out.title.len());
    out.title[..len].copy_from_slice(&title_bytes[..len]);
    out.title_len = len as u32;

    out.flags |= u8::from(plugin.is_dirty());
    out.flags |= u8::from(plugin.has_error()) << 1;
    out.flags |= u8::from(plugin.is_exited()) << 2;
    out.flags |= u8::from(ctrl.focused_pane() == index) << 3;

    unsafe {
        *info = out;
    }
    1
}

/// Copy up to `max` cells of pane `index` into `cells`, row-major.
/// Returns the number of cells written.
///
/// # Safety
/// `cells` must be null or valid for writes of `max` `CellData` entries.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_pane_cells(
    handle: *mut Controller,
    index: u32,
    cells: *mut CellData,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    if cells.is_null() || max == 0 {
        return 0;
    }
    let Some(data) = ctrl.pane_render_data(index) else {
        return 0;
    };
    let count = data.cells.len().min(max as usize);
    unsafe {
        std::ptr::copy_nonoverlapping(data.cells.as_ptr(), cells, count);
    }
    count as u32
}

/// Compute pane layouts for a window of `width` x `height` at `scale`.
/// Returns the number of layouts written (at most `max`).
///
/// # Safety
/// `layouts` must be null or valid for writes of `max` entries.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_pane_layouts(
    handle: *mut Controller,
    width: f32,
    height: f32,
    scale: f32,
    layouts: *mut PaneLayoutOut,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    if layouts.is_null() || max == 0 {
        return 0;
    }
    let computed = ctrl.layouts(width, height, scale);
    let count = computed.len().min(max as usize);
    for (i, layout) in computed.iter().take(count).enumerate() {
        unsafe {
            *layouts.add(i) = PaneLayoutOut {
                x: layout.x,
                y: layout.y,
                width: layout.width,
                height: layout.height,
                title_height: layout.title_height,
            };
        }
    }
    count as u32
}

/// Deliver a raw key event (see the key code table in `input`).
#[unsafe(no_mangle)]
pub extern "C" fn termania_send_key(handle: *mut Controller, key: u8, mods: u8) {
    if let Some(ctrl) = unsafe { controller(handle) } {
        ctrl.handle_key(key, mods);
    }
}

/// Deliver UTF-8 text input.
///
/// # Safety
/// `text` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_send_text(handle: *mut Controller, text: *const u8, len: u32) {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return;
    };
    if text.is_null() || len == 0 {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(text, len as usize) };
    ctrl.send_text(bytes);
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_resize(
    handle: *mut Controller,
    width: f32,
    height: f32,
    scale: f32,
    cell_w: f32,
    cell_h: f32,
) {
    if let Some(ctrl) = unsafe { controller(handle) } {
        ctrl.resize(width, height, scale, cell_w, cell_h);
    }
}

/// Execute a GUI app action by code (see `AppAction::from_u8`).
#[unsafe(no_mangle)]
pub extern "C" fn termania_action(handle: *mut Controller, action: u8) {
    if let Some(ctrl) = unsafe { controller(handle) } {
        if let Some(action) = AppAction::from_u8(action) {
            ctrl.app_action(action);
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_focused_pane(handle: *mut Controller) -> u32 {
    unsafe { controller(handle) }.map_or(0, |ctrl| ctrl.focused_pane())
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_set_focused_pane(handle: *mut Controller, pane: u32) {
    if let Some(ctrl) = unsafe { controller(handle) } {
        ctrl.set_focused_pane(pane);
    }
}

/// Overlay a background pane of the given plugin type behind `fg`.
/// Returns 1 on success.
///
/// # Safety
/// `pane_type` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_add_overlay(
    handle: *mut Controller,
    fg: u32,
    pane_type: *const u8,
    len: u32,
) -> u8 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    if pane_type.is_null() || len == 0 {
        return 0;
    }
    let bytes = unsafe { std::slice::from_raw_parts(pane_type, len as usize) };
    let Ok(type_name) = std::str::from_utf8(bytes) else {
        return 0;
    };
    u8::from(ctrl.add_overlay(fg, type_name))
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_remove_overlay(handle: *mut Controller, fg: u32) -> u8 {
    unsafe { controller(handle) }.map_or(0, |ctrl| u8::from(ctrl.remove_overlay(fg)))
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_swap_overlay(handle: *mut Controller, fg: u32) -> u8 {
    unsafe { controller(handle) }.map_or(0, |ctrl| u8::from(ctrl.swap_overlay(fg)))
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_toggle_overlay_focus(handle: *mut Controller, fg: u32) -> u8 {
    unsafe { controller(handle) }.map_or(0, |ctrl| u8::from(ctrl.toggle_overlay_focus(fg)))
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_has_overlay(handle: *mut Controller, fg: u32) -> u8 {
    unsafe { controller(handle) }.map_or(0, |ctrl| u8::from(ctrl.has_overlay(fg)))
}

/// Copy pane `index`'s watermark into `buf`. Returns the bytes written.
///
/// # Safety
/// `buf` must be null or valid for writes of `max` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_pane_watermark(
    handle: *mut Controller,
    index: u32,
    buf: *mut u8,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    match ctrl.watermark(index) {
        Some(watermark) => unsafe { copy_str(watermark, buf, max) },
        None => 0,
    }
}

/// Set pane `index`'s watermark.
///
/// # Safety
/// `text` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_set_watermark(
    handle: *mut Controller,
    index: u32,
    text: *const u8,
    len: u32,
) {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return;
    };
    if text.is_null() {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(text, len as usize) };
    if let Ok(watermark) = std::str::from_utf8(bytes) {
        ctrl.set_watermark(index, watermark);
    }
}

/// Take the pending notification. Returns 1 and fills both buffers (NUL
/// terminated, truncated to `max - 1`) when one was pending.
///
/// # Safety
/// `title_buf` / `body_buf` must be null or valid for writes of their max.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_poll_notification(
    handle: *mut Controller,
    title_buf: *mut u8,
    title_max: u32,
    body_buf: *mut u8,
    body_max: u32,
) -> u8 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    let Some((title, body)) = ctrl.take_notification() else {
        return 0;
    };
    unsafe {
        copy_cstr_truncated(&title, title_buf, title_max);
        copy_cstr_truncated(&body, body_buf, body_max);
    }
    1
}

unsafe fn copy_cstr_truncated(src: &str, buf: *mut u8, max: u32) {
    if buf.is_null() || max == 0 {
        return;
    }
    let len = src.len().min(max as usize - 1);
    unsafe {
        std::ptr::copy_nonoverlapping(src.as_ptr(), buf, len);
        *buf.add(len) = 0;
    }
}

/// Read the latest context-usage telemetry. Returns 1 when any has been
/// received; the slot persists until overwritten.
///
/// # Safety
/// All out-pointers must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_context_usage(
    handle: *mut Controller,
    used: *mut u64,
    total: *mut u64,
    percentage: *mut u8,
    pre_compact: *mut u8,
) -> u8 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    let Some(usage) = ctrl.context_usage() else {
        return 0;
    };
    unsafe {
        if !used.is_null() {
            *used = usage.used_tokens;
        }
        if !total.is_null() {
            *total = usage.total_tokens;
        }
        if !percentage.is_null() {
            *percentage = usage.percentage;
        }
        if !pre_compact.is_null() {
            *pre_compact = u8::from(usage.is_pre_compact);
        }
    }
    1
}

/// Copy the latest telemetry session id into `buf`; returns bytes written.
///
/// # Safety
/// `buf` must be null or valid for writes of `max` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_context_session_id(
    handle: *mut Controller,
    buf: *mut u8,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    match ctrl.context_usage() {
        Some(usage) => unsafe { copy_str(&usage.session_id, buf, max) },
        None => 0,
    }
}

/// Queue an LLM prompt. Returns 1 when accepted. The request itself runs
/// in `termania_llm_poll`.
///
/// # Safety
/// `prompt` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_llm_submit(
    handle: *mut Controller,
    prompt: *const u8,
    len: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    if prompt.is_null() || len == 0 {
        return 0;
    }
    let bytes = unsafe { std::slice::from_raw_parts(prompt, len as usize) };
    let Ok(text) = std::str::from_utf8(bytes) else {
        return 0;
    };
    ctrl.llm_submit(text);
    1
}

/// Perform a pending LLM request. Blocking: call from a timer tick or
/// worker where a multi-second stall is acceptable.
#[unsafe(no_mangle)]
pub extern "C" fn termania_llm_poll(handle: *mut Controller) -> u8 {
    match unsafe { controller(handle) } {
        Some(ctrl) => {
            ctrl.llm_poll();
            ctrl.llm_status_byte()
        }
        None => 0,
    }
}

/// 0 idle, 1 waiting, 2 error, 3 response ready.
#[unsafe(no_mangle)]
pub extern "C" fn termania_llm_status(handle: *mut Controller) -> u8 {
    unsafe { controller(handle) }.map_or(0, |ctrl| ctrl.llm_status_byte())
}

/// Copy the held response's explanation text; returns bytes written.
///
/// # Safety
/// `buf` must be null or valid for writes of `max` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_llm_response_text(
    handle: *mut Controller,
    buf: *mut u8,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    match ctrl.llm_response_text() {
        Some(text) => unsafe { copy_str(text, buf, max) },
        None => 0,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_llm_action_count(handle: *mut Controller) -> u32 {
    unsafe { controller(handle) }.map_or(0, |ctrl| ctrl.llm_action_count())
}

/// Copy the display line of held action `index`; returns bytes written.
///
/// # Safety
/// `buf` must be null or valid for writes of `max` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn termania_llm_action_desc(
    handle: *mut Controller,
    index: u32,
    buf: *mut u8,
    max: u32,
) -> u32 {
    let Some(ctrl) = (unsafe { controller(handle) }) else {
        return 0;
    };
    match ctrl.llm_action_display(index) {
        Some(line) => unsafe { copy_str(&line, buf, max) },
        None => 0,
    }
}

/// Execute the held LLM response's actions and reset the client to idle.
#[unsafe(no_mangle)]
pub extern "C" fn termania_llm_execute(handle: *mut Controller) {
    if let Some(ctrl) = unsafe { controller(handle) } {
        ctrl.llm_execute();
    }
}

/// Persistent NUL-terminated font family string, owned by the controller
/// and valid until `termania_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn termania_font_family(handle: *mut Controller) -> *const c_char {
    match unsafe { controller(handle) } {
        Some(ctrl) => ctrl.font_family_ptr(),
        None => std::ptr::null(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn termania_font_size(handle: *mut Controller) -> f32 {
    unsafe { controller(handle) }.map_or(0.0, |ctrl| ctrl.font_size())
}
