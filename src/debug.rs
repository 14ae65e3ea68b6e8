//! Logging bridge for embedded use.
//!
//! The core usually runs inside a GUI host where stderr is invisible
//! (macOS app bundles, Windows GUI apps), so all `log` crate output is
//! written to `<temp_dir>/termania_debug.log`. When `RUST_LOG` is set the
//! output is additionally mirrored to stderr for terminal debugging.
//!
//! The log file is created with 0600 permissions on Unix and refused when
//! it is a symlink.

use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static LOGGER: OnceLock<LogBridge> = OnceLock::new();

struct LogBridge {
    file: Option<Mutex<std::fs::File>>,
    mirror_stderr: bool,
}

impl LogBridge {
    fn new() -> Self {
        let log_path = std::env::temp_dir().join("termania_debug.log");

        // Clear out a stale symlink so the open below can succeed. The
        // refusal itself is enforced by O_NOFOLLOW on the open, so a
        // symlink recreated between these two calls still cannot redirect
        // the log.
        if log_path
            .symlink_metadata()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
        {
            let _ = std::fs::remove_file(&log_path);
        }

        let mut options = OpenOptions::new();
        options.write(true).truncate(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
            options.custom_flags(libc::O_NOFOLLOW);
        }
        let file = options.open(&log_path).ok().map(Mutex::new);

        Self {
            file,
            mirror_stderr: std::env::var_os("RUST_LOG").is_some(),
        }
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level_from_env()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let line = format!(
            "[{timestamp}] {:5} {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = &self.file {
            let _ = file.lock().write_all(line.as_bytes());
        }
        if self.mirror_stderr {
            let _ = std::io::stderr().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

fn max_level_from_env() -> Level {
    match std::env::var("RUST_LOG")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "error" => Level::Error,
        "warn" => Level::Warn,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => Level::Info,
    }
}

/// Install the log bridge. Idempotent; safe to call from every entry
/// point.
pub fn init_log_bridge() {
    let logger = LOGGER.get_or_init(LogBridge::new);
    if log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_log_bridge();
        init_log_bridge();
        log::info!("log bridge smoke test");
    }
}
