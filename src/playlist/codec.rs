//! Tag value formatting.
//!
//! Shared text rendering for the playlist encoders: attribute lists,
//! byte ranges, timestamps and segment durations. Everything here is
//! deterministic so that identical models encode to identical bytes.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, SecondsFormat};

use crate::types::ByteRange;

/// Append `,NAME="value"`, skipping empty values.
pub(crate) fn push_quoted_attr(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(',');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(value);
    out.push('"');
}

/// Append `,NAME=value` as an unquoted token, skipping empty values.
pub(crate) fn push_attr(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(',');
    out.push_str(name);
    out.push('=');
    out.push_str(value);
}

/// Render a float the short way: no trailing zeros, no exponent.
/// Used for time offsets, cue timings and date range durations.
pub(crate) fn format_float(value: f64) -> String {
    format!("{}", value)
}

/// `length@offset` rendering for `#EXT-X-BYTERANGE` and MAP sub-ranges.
pub(crate) fn format_byte_range(range: &ByteRange) -> String {
    format!("{}@{}", range.length, range.offset)
}

/// The one date-time format used everywhere: ISO 8601 / RFC 3339 with
/// seconds precision and an explicit timezone (`Z` for UTC).
pub(crate) fn format_date_time(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Per-encode memoization of duration text keyed by the f64 bit pattern.
///
/// Live playlists repeat a handful of distinct durations across hundreds
/// of segments; formatting each distinct value once is enough.
pub(crate) struct DurationCache {
    as_int: bool,
    cache: HashMap<u64, String>,
}

impl DurationCache {
    pub(crate) fn new(as_int: bool) -> Self {
        Self {
            as_int,
            cache: HashMap::new(),
        }
    }

    /// Integer-ceiling mode for old clients that reject fractional
    /// durations, 3-decimal fixed point otherwise.
    pub(crate) fn format(&mut self, duration: f64) -> &str {
        let as_int = self.as_int;
        self.cache
            .entry(duration.to_bits())
            .or_insert_with(|| {
                if as_int {
                    (duration.ceil() as i64).to_string()
                } else {
                    format!("{:.3}", duration)
                }
            })
            .as_str()
    }
}
