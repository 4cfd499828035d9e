//! Normalisation of commit timestamps into naive UTC plus an explicit offset.
//!
//! The sink stores every event as a zone-less UTC wall-clock value together with
//! the offset the author's clock was using, e.g. `"2021-03-01T10:00:00+02:00"`
//! becomes (`2021-03-01 08:00:00`, `"+02:00"`). Inputs without an offset suffix
//! are taken to be UTC already and carry an empty offset string.

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Timelike};

use crate::errors::TimestampError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Length of the `YYYY-MM-DD` prefix; offset signs are only searched after it.
const DATE_PREFIX_LEN: usize = 10;

/// A timestamp converted to UTC, remembering the offset it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTimestamp {
    utc: NaiveDateTime,
    offset: String,
}

impl NormalizedTimestamp {
    /// The instant in UTC, without zone metadata.
    pub fn utc(&self) -> NaiveDateTime {
        self.utc
    }

    /// The original offset as `"+HH:MM"` / `"-HH:MM"`, or `""` when the input
    /// carried none.
    pub fn offset(&self) -> &str {
        &self.offset
    }

    /// Renders the UTC instant the way the sink expects it:
    /// `YYYY-MM-DD HH:MM:SS`, with a `.ffffff` suffix only when the instant has
    /// a non-zero microsecond part.
    pub fn utc_string(&self) -> String {
        let whole = self.utc.format("%Y-%m-%d %H:%M:%S").to_string();
        let micros = self.utc.nanosecond() / 1_000;
        if micros == 0 {
            whole
        } else {
            format!("{whole}.{micros:06}")
        }
    }
}

/// Parses `value` and converts it to UTC.
///
/// Accepts `T` or space between date and time, optional fractional seconds, and
/// an optional `Z`, `UTC`, `GMT`, `±HH:MM`, `±HHMM` or `±HH` suffix, which may be
/// separated from the time by whitespace.
///
/// # Errors
///
/// Returns [`TimestampError`] when the input is not a recognisable timestamp.
pub fn normalize(value: &str) -> Result<NormalizedTimestamp, TimestampError> {
    let invalid = || TimestampError {
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let (local_part, offset_seconds) = split_offset(trimmed).ok_or_else(invalid)?;

    let local = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local_part, fmt).ok())
        .ok_or_else(invalid)?;

    let Some(seconds) = offset_seconds else {
        return Ok(NormalizedTimestamp {
            utc: local,
            offset: String::new(),
        });
    };

    let offset = FixedOffset::east_opt(seconds).ok_or_else(invalid)?;
    let utc = offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(invalid)?
        .naive_utc();

    Ok(NormalizedTimestamp {
        utc,
        offset: render_offset(seconds),
    })
}

/// Splits a trailing offset off `value`.
///
/// Returns the remaining local part and the offset in seconds east of UTC
/// (`None` when there is no suffix). Returns `None` overall when a suffix is
/// present but malformed.
fn split_offset(value: &str) -> Option<(&str, Option<i32>)> {
    if let Some(local) = value.strip_suffix(['Z', 'z']).or_else(|| strip_zone_name(value)) {
        return Some((local.trim_end(), Some(0)));
    }
    if value.len() <= DATE_PREFIX_LEN || !value.is_char_boundary(DATE_PREFIX_LEN) {
        return Some((value, None));
    }

    let time_part = &value[DATE_PREFIX_LEN..];
    let Some(pos) = time_part.rfind(['+', '-']) else {
        return Some((value, None));
    };
    let split_at = DATE_PREFIX_LEN + pos;
    let (local, suffix) = value.split_at(split_at);
    let local = local.trim_end();

    let sign = if suffix.starts_with('-') { -1 } else { 1 };
    let digits: String = suffix[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    Some((local, Some(sign * (hours * 3600 + minutes * 60))))
}

/// Strips a trailing `UTC` or `GMT` zone name, in any case.
fn strip_zone_name(value: &str) -> Option<&str> {
    let split_at = value.len().checked_sub(3)?;
    if !value.is_char_boundary(split_at) {
        return None;
    }
    let (local, zone) = value.split_at(split_at);
    (zone.eq_ignore_ascii_case("utc") || zone.eq_ignore_ascii_case("gmt")).then_some(local)
}

fn render_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}
