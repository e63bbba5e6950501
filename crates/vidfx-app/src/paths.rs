// src/paths.rs
// Single source of truth for where vidfx writes export output.

use std::path::PathBuf;

/// Default export directory: `exports/` next to the current working
/// directory. Overridable per invocation with `--out-dir`.
pub fn default_exports_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| std::env::temp_dir())
        .join("exports")
}
