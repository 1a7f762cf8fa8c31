//! Small shared helpers: hex dumping and debug tracing.

pub mod hex;

use std::sync::OnceLock;

static DEBUG: OnceLock<bool> = OnceLock::new();

/// True when the `INNODB_DEBUG` environment variable is set (non-empty).
pub fn debug_enabled() -> bool {
    *DEBUG.get_or_init(|| {
        std::env::var("INNODB_DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    })
}

/// Emit a verbose trace line on stderr when `INNODB_DEBUG` is set.
pub fn trace(message: &str) {
    if debug_enabled() {
        eprintln!("[ibd] {}", message);
    }
}
