//! Conversion between stored instants and client-facing timestamp text.
//!
//! Readings are stored as unix seconds and compared numerically. Clients
//! see and send `YYYY-MM-DD HH:MM:SS` text in a fixed civil offset (not a
//! named time zone), so the offset is applied only at this boundary.

use time::format_description::BorrowedFormatItem;
use time::macros::{format_description, offset};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Error, Result};

/// Offset used when none is configured (UTC+07:00).
pub const DEFAULT_UTC_OFFSET: UtcOffset = offset!(+7);

const SECONDS_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const MINUTES_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Renders and parses timestamp text in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilClock {
    offset: UtcOffset,
}

impl Default for CivilClock {
    fn default() -> Self {
        Self::new(DEFAULT_UTC_OFFSET)
    }
}

impl CivilClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Build a clock from `±HH:MM` text such as `+07:00`.
    pub fn from_offset_str(text: &str) -> Result<Self> {
        parse_offset(text).map(Self::new)
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Format an instant as `YYYY-MM-DD HH:MM:SS` in this clock's offset.
    pub fn format(&self, instant: OffsetDateTime) -> String {
        instant
            .to_offset(self.offset)
            .format(SECONDS_FORMAT)
            .unwrap_or_default()
    }

    /// Parse client timestamp text in this clock's offset.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM` and `YYYY-MM-DD`.
    /// A `T` separator (as sent by HTML `datetime-local` inputs) is treated
    /// as a space. Missing components default to zero.
    pub fn parse(&self, text: &str) -> Result<OffsetDateTime> {
        let normalized = text.trim().replacen('T', " ", 1);

        let local = PrimitiveDateTime::parse(&normalized, SECONDS_FORMAT)
            .or_else(|_| PrimitiveDateTime::parse(&normalized, MINUTES_FORMAT))
            .or_else(|_| Date::parse(&normalized, DATE_FORMAT).map(|d| d.midnight()))
            .map_err(|_| Error::InvalidTimestamp(text.to_string()))?;

        Ok(local.assume_offset(self.offset))
    }
}

/// Parse `±HH:MM` offset text.
pub fn parse_offset(text: &str) -> Result<UtcOffset> {
    UtcOffset::parse(text.trim(), OFFSET_FORMAT)
        .map_err(|_| Error::InvalidTimestamp(format!("invalid UTC offset '{}'", text)))
}

/// Current time with the sub-second part dropped.
pub(crate) fn now_whole_seconds() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_applies_offset() {
        let clock = CivilClock::default();
        let instant = datetime!(2024-03-01 20:15:09 UTC);
        assert_eq!(clock.format(instant), "2024-03-02 03:15:09");
    }

    #[test]
    fn test_format_is_zero_padded() {
        let clock = CivilClock::new(UtcOffset::UTC);
        let instant = datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(clock.format(instant), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_parse_datetime_local_input() {
        let clock = CivilClock::default();
        let parsed = clock.parse("2024-03-02T03:15").unwrap();
        assert_eq!(parsed, datetime!(2024-03-01 20:15:00 UTC));
    }

    #[test]
    fn test_parse_full_seconds() {
        let clock = CivilClock::default();
        let parsed = clock.parse("2024-03-02 03:15:09").unwrap();
        assert_eq!(parsed, datetime!(2024-03-01 20:15:09 UTC));
    }

    #[test]
    fn test_parse_date_only() {
        let clock = CivilClock::new(UtcOffset::UTC);
        let parsed = clock.parse("2024-03-02").unwrap();
        assert_eq!(parsed, datetime!(2024-03-02 00:00:00 UTC));
    }

    #[test]
    fn test_parse_round_trips_format() {
        let clock = CivilClock::default();
        let instant = datetime!(2023-12-31 23:59:59 UTC);
        assert_eq!(clock.parse(&clock.format(instant)).unwrap(), instant);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let clock = CivilClock::default();
        assert!(matches!(
            clock.parse("yesterday"),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(clock.parse("2024-13-01 00:00").is_err());
        assert!(clock.parse("").is_err());
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+07:00").unwrap(), DEFAULT_UTC_OFFSET);
        assert_eq!(
            parse_offset("-05:30").unwrap(),
            UtcOffset::from_hms(-5, -30, 0).unwrap()
        );
        assert!(parse_offset("7").is_err());
        assert!(CivilClock::from_offset_str("UTC").is_err());
    }

    #[test]
    fn test_now_whole_seconds() {
        assert_eq!(now_whole_seconds().nanosecond(), 0);
    }
}
