//! Server version normalisation used to gate collectors.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Parse a server version string into an integer (e.g., "8.0.36-28" -> `80_036`).
/// Returns 0 if parsing fails.
#[must_use]
pub fn parse_server_version(version_string: &str) -> i32 {
    let (_, num) = normalize_version(version_string);
    i32::try_from(num).unwrap_or(i32::MAX)
}

/// Parse and normalize a server version string.
/// Returns a tuple of (`normalized_string`, `version_number`).
/// e.g. "10.5.8-MariaDB" -> ("10.5.8", 100508)
///      "8.4" -> ("8.4.0", 80400)
#[must_use]
pub fn normalize_version(version_string: &str) -> (String, i64) {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("Invalid regex")
    });

    let Some(caps) = re.captures(version_string.trim()) else {
        return ("0.0.0".to_string(), 0);
    };

    let part = |idx: usize| {
        caps.get(idx)
            .map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0))
    };
    let (major, minor, patch) = (part(1), part(2), part(3));

    (format!("{major}.{minor}.{patch}"), major * 10000 + minor * 100 + patch)
}
