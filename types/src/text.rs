//! Text shortening for messages that cross the boundary.

const ELLIPSIS: &str = "...";

/// Shorten `raw` (trimmed) to at most `max` characters, ending in `...` when cut.
///
/// Counts `char`s, so multi-byte text is never split mid-scalar. `max` below
/// three is raised to three.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let raw = raw.trim();
    let max = max.max(ELLIPSIS.len());
    match raw.char_indices().nth(max) {
        None => raw.to_string(),
        Some(_) => {
            let keep = max - ELLIPSIS.len();
            let end = raw.char_indices().nth(keep).map_or(raw.len(), |(i, _)| i);
            format!("{}{ELLIPSIS}", &raw[..end])
        }
    }
}
