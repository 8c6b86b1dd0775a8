//! Human-friendly duration strings used in lagguard.toml.

use std::time::Duration;

/// Parse a duration string like "5s", "500ms", "2m".
///
/// A bare number is taken as seconds. Values that do not fit a `Duration`
/// are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n = digits.parse::<u64>().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" | "" => Some(Duration::from_secs(n)),
        "m" => n.checked_mul(60).map(Duration::from_secs),
        _ => None,
    }
}
