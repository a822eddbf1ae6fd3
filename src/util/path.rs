use std::ffi::OsStr;
use std::path::Path;

/// Extension of class source files.
pub const SOURCE_EXTENSION: &str = "php";

pub trait PathExt {
    fn is_class_source(&self) -> bool;
    fn display_relative_to(&self, base: &Path) -> String;
}

impl PathExt for Path {
    fn is_class_source(&self) -> bool {
        self.extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
            .unwrap_or(false)
    }

    /// Path relative to `base` when one exists, as given otherwise.
    fn display_relative_to(&self, base: &Path) -> String {
        pathdiff::diff_paths(self, base)
            .filter(|rel| !rel.starts_with(".."))
            .map(|rel| normalize_path_separator(&rel.to_string_lossy()))
            .unwrap_or_else(|| normalize_path_separator(&self.to_string_lossy()))
    }
}

// Helper function for cross-platform path comparison
pub fn normalize_path_separator(s: &str) -> String {
    s.replace('\\', "/")
}
