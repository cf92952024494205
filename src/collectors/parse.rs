//! Conversion of untyped status text into metric values.
//!
//! `SHOW ... STATUS` output mixes booleans, timestamps, log file names and
//! plain numbers in one column stream. [`parse_status`] decides how each value
//! is read and returns `None` for anything it does not recognise so callers can
//! skip the sample instead of failing the scrape.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// `<anything>.<digits>`, e.g. `mysql-bin.000123`.
static LOG_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(.+)\.(\d+)$").expect("valid log file regex")
});

/// Convert a raw status value into a float.
///
/// Resolution order (first match wins):
/// 1. keywords (case-insensitive): `yes`, `on`, `primary` → 1; `no`, `off`,
///    `disabled`, `connecting`, `non-primary`, `disconnected` → 0
/// 2. `Jan 02 15:04:05 2006 GMT` → unix seconds
/// 3. `2006-01-02 15:04:05` (UTC) → unix seconds, fractional seconds kept
/// 4. dotted sequence suffix (`binlog.000006` → 6) when the prefix is not
///    itself numeric, so `12.5` and an IPv4 address such as `10.0.0.5` are
///    never read as a file sequence
/// 5. plain float
#[must_use]
pub fn parse_status(raw: &str) -> Option<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "on" | "primary" => return Some(1.0),
        // Slave_IO_Running reports "Connecting" while it is not running.
        "no" | "off" | "disabled" | "connecting" | "non-primary" | "disconnected" => {
            return Some(0.0);
        }
        _ => {}
    }

    if let Some(ts) = parse_zoned_timestamp(raw) {
        return Some(ts);
    }

    // `%.f` also matches a value without a fraction.
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(unix_seconds(ts));
    }

    if let Some(caps) = LOG_FILE_RE.captures(raw)
        && let (Some(prefix), Some(suffix)) = (caps.get(1), caps.get(2))
        && !is_numeric_prefix(prefix.as_str())
    {
        return suffix.as_str().parse::<u64>().ok().map(to_f64);
    }

    raw.parse::<f64>().ok()
}

/// `Apr 14 10:35:29 2031 GMT`, as reported by `Ssl_server_not_after`.
///
/// The zone abbreviation has to be alphabetic and is read as UTC.
fn parse_zoned_timestamp(raw: &str) -> Option<f64> {
    let (datetime, zone) = raw.rsplit_once(' ')?;
    if zone.is_empty() || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    NaiveDateTime::parse_from_str(datetime, "%b %d %H:%M:%S%.f %Y")
        .ok()
        .map(unix_seconds)
}

/// A number or a dotted run of digits such as an IPv4 address.
fn is_numeric_prefix(prefix: &str) -> bool {
    prefix.parse::<f64>().is_ok() || prefix.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds(ts: NaiveDateTime) -> f64 {
    let ts = ts.and_utc();
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

/// Convert a `Y`/`N` privilege flag. Anything else is rejected.
#[must_use]
pub fn parse_privilege(raw: &str) -> Option<f64> {
    match raw {
        "Y" => Some(1.0),
        "N" => Some(0.0),
        _ => None,
    }
}

/// Sequence number of a log file name, the integer after the last `.`.
///
/// # Errors
///
/// Returns an error if the name has no `.` or the suffix is not an integer.
pub fn log_file_number(file: &str) -> Result<f64> {
    let (_, suffix) = file
        .rsplit_once('.')
        .ok_or_else(|| anyhow!("split {file} by `.` item not enough"))?;

    suffix
        .parse::<u64>()
        .map(to_f64)
        .with_context(|| format!("invalid log file sequence in {file}"))
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(v: u64) -> f64 {
    v as f64
}

/// Lower-case a column or variable name and replace anything outside
/// `[a-z0-9_]` so it can be used in a metric name.
#[must_use]
pub fn metric_name_part(column: &str) -> String {
    column
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
