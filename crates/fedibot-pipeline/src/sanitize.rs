//! Cleanup applied to model output before it is posted.

use std::sync::OnceLock;

use regex::Regex;

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Approximates "emoji" with the other-symbol and modifier-symbol categories.
    PATTERN.get_or_init(|| Regex::new(r"[\p{So}\p{Sk}]").expect("symbol pattern must compile"))
}

/// Strips emoji-like symbols and normalises spacing.
///
/// Runs of spaces collapse to one, no space precedes a `.`, and exactly one
/// space follows a `.` unless it ends the text or is followed by another `.`
/// or a line break. The result is trimmed, and `clean_response` is idempotent.
pub fn clean_response(text: &str) -> String {
    let without_symbols = symbol_pattern().replace_all(text, "");
    let collapsed = collapse_spaces(&without_symbols);
    normalize_periods(&collapsed).trim().to_string()
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for ch in text.chars() {
        if ch == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        out.push(ch);
    }
    out
}

fn normalize_periods(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '.' {
            out.push(ch);
            continue;
        }

        while out.ends_with(' ') {
            out.pop();
        }
        out.push('.');
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        // A space between two periods would be a space before a period, so a run
        // like `...` stays joined. Existing line breaks already separate.
        match chars.peek() {
            Some(next) if *next != '.' && !next.is_whitespace() => out.push(' '),
            _ => {}
        }
    }
    out
}
