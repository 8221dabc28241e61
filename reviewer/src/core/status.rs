//! Status extraction from free-text agent transcripts.
//!
//! The agent is asked to end its output with one machine-readable line:
//! `ALL_CLEAR` or `CRITICAL_REMAINING: <n>`. Nothing enforces that, so the
//! parser is total and conservative: anything that does not match the exact
//! convention is [`Status::Unknown`], never a guess.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static CRITICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CRITICAL_REMAINING:\s*([0-9]{1,6})$").expect("critical status regex")
});

/// CSI sequences (colors, cursor movement), OSC sequences (titles, links), and
/// the remaining two-byte escapes.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("ansi escape regex")
});

/// Completion status derived from the last line of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Zero outstanding critical issues.
    AllClear,
    /// The agent declared a positive number of critical issues.
    CriticalRemaining,
    /// No conforming status line: insufficient evidence of completion.
    Unknown,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::AllClear => "all_clear",
            Status::CriticalRemaining => "critical_remaining",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conforming status line, with the declared count preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    AllClear,
    Critical(u32),
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::AllClear => f.write_str("ALL_CLEAR"),
            StatusLine::Critical(n) => write!(f, "CRITICAL_REMAINING: {n}"),
        }
    }
}

/// Classify a transcript into a [`Status`].
///
/// `CRITICAL_REMAINING: 0` counts as all-clear.
pub fn classify(text: &str) -> Status {
    match parse_status_line(text) {
        Some(StatusLine::AllClear) | Some(StatusLine::Critical(0)) => Status::AllClear,
        Some(StatusLine::Critical(_)) => Status::CriticalRemaining,
        None => Status::Unknown,
    }
}

/// Parse the last non-blank line of `text` as a status line.
///
/// The line is stripped of ANSI escapes, uppercased, and trimmed before
/// matching. Returns `None` when the line does not follow the convention.
pub fn parse_status_line(text: &str) -> Option<StatusLine> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last = trimmed.lines().rev().find(|line| !line.trim().is_empty())?;
    let stripped = strip_ansi(last).to_uppercase();
    let normalized = stripped.trim();

    if normalized == "ALL_CLEAR" {
        return Some(StatusLine::AllClear);
    }
    let caps = CRITICAL_RE.captures(normalized)?;
    // At most six digits, so this cannot overflow.
    let count = caps.get(1)?.as_str().parse::<u32>().ok()?;
    Some(StatusLine::Critical(count))
}

/// Remove ANSI escape sequences from `line`.
pub fn strip_ansi(line: &str) -> String {
    ANSI_RE.replace_all(line, "").into_owned()
}
