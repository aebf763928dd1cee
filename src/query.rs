use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Digits, whitespace, then the rest of the line. Not anchored: the first
/// digit run followed by whitespace anywhere in the message wins. The
/// whitespace class is the ECMAScript one (adds U+FEFF, leaves out U+0085), and
/// the area stops at any line terminator, `\r` and U+2028/U+2029 included.
static QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"([0-9]+)",
        r"[\t\n\x0B\f\r \xA0\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}]+",
        r"([^\n\r\x{2028}\x{2029}]+)",
    ))
    .expect("valid regex")
});

/// Same set as the separator class above.
fn is_separator(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

/// A "<days> <area>" request, e.g. "5 nhật bản".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Digit run exactly as the user typed it
    pub days: String,
    /// Remaining text, lower-cased and trimmed
    pub area: String,
}

impl ParsedQuery {
    /// Parse a chat message. Returns `None` when the text does not look like
    /// a query, which the caller answers with the usage help.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let captures = QUERY_PATTERN.captures(&lowered)?;
        Some(Self {
            days: captures.get(1)?.as_str().to_string(),
            area: captures.get(2)?.as_str().trim_matches(is_separator).to_string(),
        })
    }

    /// The value sent to the lookup service.
    pub fn keyword(&self) -> String {
        format!("{} {}", self.days, self.area)
    }

    /// Day count as a number, `None` if it overflows.
    pub fn day_count(&self) -> Option<i64> {
        self.days.parse().ok()
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.days, self.area)
    }
}
