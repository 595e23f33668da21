//! Log-line formatting for player-supplied names and grid positions.

use crate::validation::MAX_NAME_LENGTH;

/// Render a character, species or quest name for a single log line.
///
/// Any whitespace becomes a plain space and other control characters become
/// `?`. Names are never stored longer than `MAX_NAME_LENGTH`, so anything past
/// that is cut with an ellipsis.
pub fn log_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .take(MAX_NAME_LENGTH)
        .map(|ch| match ch {
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();
    if name.chars().nth(MAX_NAME_LENGTH).is_some() {
        out.push('…');
    }
    out
}

/// Render a grid position the same way in every log line.
pub fn fmt_pos(x: i32, y: i32) -> String {
    format!("({}, {})", x, y)
}
