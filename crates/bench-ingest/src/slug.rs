//! Pure string transforms used while recording metadata (§3/§8): the
//! project URL-slug and the commit-message filter applied to `Source`.

/// `name` with any character outside `[0-9A-Za-z-]` replaced by `-`.
pub fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

/// Strips any line matching `Signed-off-by:.*`, turns literal `\n` escapes
/// into real newlines, and trims the result.
pub fn filter_commit_message(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .lines()
        .filter(|line| !line.contains("Signed-off-by:"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
