// Library exports for the control core.
//
// # Threading policy
//
// The controller and every subsystem it owns run on one thread: the thread
// the host calls `poll()` from. All socket and PTY I/O is non-blocking, so
// a tick never stalls. Two deliberate exceptions:
//
//   - each terminal pane runs a PTY reader thread that only pushes bytes
//     into a channel the controller drains;
//   - the LLM HTTP request blocks inside `llm_poll()`, which the host is
//     documented to call from a context that tolerates a stall.
//
// The ABI boundary does not serialize calls itself; the host agrees to
// call it from a single thread.

/// Application version (root crate version).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod abi;
pub mod action;
pub mod controller;
pub mod debug;
pub mod grid;
pub mod input;
pub mod llm;
pub mod overlay;
pub mod plugin;
pub mod tap;

pub use termania_config as config;
