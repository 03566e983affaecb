use regex::Regex;
use std::sync::LazyLock;

/// CSI sequences (`ESC [ params intermediates final`) and two-character
/// escapes (`ESC` followed by one byte in `@`..`_`).
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid ansi regex")
});

/// Remove every ANSI escape sequence from `text`. Nothing else changes.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}
