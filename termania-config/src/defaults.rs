//! Default value functions for configuration.
//!
//! Free functions referenced from `#[serde(default = "crate::defaults::...")]`
//! attributes so that a partially-written config file still yields a fully
//! populated `Config`.

pub fn font_family() -> String {
    "monospace".to_string()
}

pub fn font_size() -> f32 {
    14.0
}

pub fn rows() -> u32 {
    1
}

pub fn cols() -> u32 {
    2
}

pub fn window_title() -> String {
    "termania".to_string()
}

pub fn outer_padding() -> f32 {
    12.0
}

pub fn gap() -> f32 {
    8.0
}

pub fn title_bar_height() -> f32 {
    24.0
}

pub fn socket_path() -> String {
    "/tmp/termania.sock".to_string()
}

pub fn llm_max_tokens() -> u32 {
    2048
}

pub fn scrollback_lines() -> usize {
    10000
}
