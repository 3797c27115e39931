//! The human-readable list of available sounds.

use std::fmt::Write;

const TITLE: &str = "Available Sounds";

/// Render `names` as a small markdown document, sorted for stable output.
pub fn render_sound_list<S: AsRef<str>>(names: &[S]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(out, "{}", "=".repeat(TITLE.len()));
    out.push('\n');
    for name in sorted {
        let _ = writeln!(out, " * {name}");
    }
    out
}
