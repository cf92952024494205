//! Parser for replication position markers (GTID sets) such as
//! `3E11FA47-71CA-11E1-9E33-C80AA9429562:1-3:11:47-49, 24DA167-...:1-19`.
//!
//! Ranges are kept in the order they appear in the source text. Overlapping or
//! decreasing ranges are accepted as-is; the parser only checks syntax.

use anyhow::{Result, anyhow, bail};

/// One contiguous run of transactions, `start..=end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionRange {
    pub start: i64,
    pub end: i64,
}

/// All transaction ranges recorded for one originating server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSet {
    pub server_id: String,
    pub first_transaction: i64,
    pub last_transaction: i64,
    pub ranges: Vec<TransactionRange>,
}

/// Parse a comma separated GTID set.
///
/// Each entry is `server_id:range(:range)*` where a range is `N` or `N-M`.
/// Whitespace (including the newlines `MySQL` inserts after commas) around
/// entries is ignored.
///
/// # Errors
///
/// Returns an error naming the offending entry or numeral if any part of the
/// input is malformed. No partial result is returned.
pub fn parse_gtid_set(s: &str) -> Result<Vec<TransactionSet>> {
    s.split(',').map(|item| parse_item(item.trim())).collect()
}

fn parse_item(item: &str) -> Result<TransactionSet> {
    let mut parts = item.split(':');

    let server_id = parts.next().unwrap_or_default();
    let ranges = parts
        .map(|part| parse_range(item, part))
        .collect::<Result<Vec<_>>>()?;

    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        bail!("can not parse gtid: {item}, transaction item is too little");
    };

    Ok(TransactionSet {
        server_id: server_id.to_string(),
        first_transaction: first.start,
        last_transaction: last.end,
        ranges,
    })
}

fn parse_range(item: &str, part: &str) -> Result<TransactionRange> {
    let bounds: Vec<&str> = part.split('-').collect();

    let (start, end) = match bounds.as_slice() {
        [single] => {
            let n = parse_number(single)?;
            (n, n)
        }
        [start, end] => (parse_number(start)?, parse_number(end)?),
        _ => bail!("can not parse gtid: {item}, range {part:?} has more than 2 items"),
    };

    Ok(TransactionRange { start, end })
}

fn parse_number(s: &str) -> Result<i64> {
    // i64::from_str accepts a leading '+', GTID numerals are unsigned digits only.
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        bail!("parse {s:?} to int64 failed: not a decimal number");
    }
    s.parse::<i64>()
        .map_err(|e| anyhow!("parse {s:?} to int64 failed: {e}"))
}
