//! Shared utility functions
//!
//! Small helpers used across the application, kept in a single file.

/// Mask the middle digits of a phone number for outbound messages.
///
/// Numbers of 7 characters or fewer are returned unchanged; longer inputs
/// keep the first 3 and last 4 characters with `***` in between.
pub fn mask_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    if chars.len() <= 7 {
        return number.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Render an optional duration in seconds for message text.
pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        Some(s) => format!("{}s", s),
        None => "unknown".to_string(),
    }
}
