//! Date string parsing for the individual metadata sources
//!
//! Three families of input are handled:
//! - EXIF ASCII fields, which must match `YYYY:MM:DD HH:MM:SS` exactly
//! - container tag strings, tried against a fixed list of formats
//! - shell property strings, which are localized and may carry invisible
//!   bidi control characters

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime};

/// Length of an EXIF date string without its NUL terminator
const EXIF_DATETIME_LEN: usize = 19;

/// Container tag formats that carry an explicit UTC offset, in priority order
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%:z",   // ISO 8601 with offset
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z", // ISO 8601 with fractional seconds
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Container tag formats without offset, in priority order
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S", // ISO 8601 without offset
    "%Y-%m-%d %H:%M:%S", // Simple datetime
    "%Y:%m:%d %H:%M:%S", // EXIF style
];

/// Loose formats accepted by the general fallback parse
const GENERAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Time-of-day layouts a shell may append to a localized date
const SHELL_TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Parse an EXIF date field (`"2024:01:15 14:30:00"`).
///
/// Trailing NULs and padding spaces are stripped; anything that is not an
/// exact match of the EXIF layout is rejected.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim_matches(|c| c == '\0' || c == ' ');
    if s.len() != EXIF_DATETIME_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S").ok()
}

/// Parse a date string embedded in a video container.
///
/// Offset-bearing values are converted to local time. Values without an
/// offset are taken as local time already.
pub fn parse_container_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(to_local(dt));
        }
    }

    // ISO 8601 UTC
    if let Some(body) = s.strip_suffix('Z')
        && let Ok(naive) = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S")
    {
        return Some(utc_to_local(naive));
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    if let Some(dt) = parse_year_only(s) {
        return Some(dt);
    }

    parse_general(s)
}

/// Locale-agnostic last-resort parse
pub fn parse_general(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(to_local(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(to_local(dt));
    }

    for format in GENERAL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    None
}

fn parse_year_only(s: &str) -> Option<NaiveDateTime> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn to_local(dt: DateTime<FixedOffset>) -> NaiveDateTime {
    dt.with_timezone(&Local).naive_local()
}

/// Interpret a naive UTC timestamp in the local time zone
pub fn utc_to_local(naive: NaiveDateTime) -> NaiveDateTime {
    naive.and_utc().with_timezone(&Local).naive_local()
}

/// Order of day, month and year in a culture's numeric short date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCulture {
    /// `M/d/yyyy` (United States and the invariant culture)
    MonthFirst,
    /// `d/M/yyyy`, `d.M.yyyy` (most of Europe, Latin America, India)
    DayFirst,
    /// `yyyy/M/d`, `yyyy-MM-dd` (East Asia, Hungary, Sweden, Canada)
    YearFirst,
}

impl DateCulture {
    /// Map a BCP 47 locale tag (`en-US`, `de_DE.UTF-8`, `zh-Hans-CN`) to its date order.
    pub fn from_locale(tag: &str) -> Self {
        let tag = tag
            .split('.')
            .next()
            .unwrap_or(tag)
            .replace('_', "-")
            .to_ascii_lowercase();
        let language = tag.split('-').next().unwrap_or("");
        let region = tag.rsplit('-').next().unwrap_or("");

        match (language, region) {
            ("zh" | "ja" | "ko" | "hu" | "lt" | "mn", _) => DateCulture::YearFirst,
            ("sv", _) | ("en" | "fr", "ca") => DateCulture::YearFirst,
            ("en", "en" | "us" | "ph" | "pr" | "um" | "as" | "gu") => DateCulture::MonthFirst,
            ("es", "us") => DateCulture::MonthFirst,
            _ => DateCulture::DayFirst,
        }
    }

    /// Detect the date order of the user's current locale.
    pub fn current() -> Self {
        sys_locale::get_locale()
            .map(|tag| Self::from_locale(&tag))
            .unwrap_or(DateCulture::MonthFirst)
    }

    fn date_formats(self) -> &'static [&'static str] {
        match self {
            DateCulture::MonthFirst => &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"],
            DateCulture::DayFirst => &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"],
            DateCulture::YearFirst => &["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d"],
        }
    }

    /// Parse a localized numeric date with an optional time of day.
    pub fn parse(self, s: &str) -> Option<NaiveDateTime> {
        for date_format in self.date_formats() {
            for time_format in SHELL_TIME_FORMATS {
                let format = format!("{} {}", date_format, time_format);
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, &format) {
                    return Some(dt);
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, date_format) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

/// Strip the invisible direction marks and control characters shells insert
/// around localized dates, and collapse whitespace.
pub fn scrub_shell_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && !is_directional_mark(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_directional_mark(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{061C}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
    )
}

/// Parse a shell property date: first under `culture`, then invariant.
pub fn parse_shell_datetime(raw: &str, culture: DateCulture) -> Option<NaiveDateTime> {
    let s = scrub_shell_text(raw);
    if s.is_empty() {
        return None;
    }

    culture
        .parse(&s)
        .or_else(|| DateCulture::MonthFirst.parse(&s))
        .or_else(|| parse_general(&s))
        .or_else(|| {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(
            parse_exif_datetime("2021:05:03 10:15:00"),
            Some(ymd_hms(2021, 5, 3, 10, 15, 0))
        );

        // NUL terminator and padding
        assert_eq!(
            parse_exif_datetime("2021:05:03 10:15:00\0"),
            Some(ymd_hms(2021, 5, 3, 10, 15, 0))
        );

        // ISO hyphens are not EXIF
        assert!(parse_exif_datetime("2021-05-03 10:15:00").is_none());
        // Blank placeholder written by some cameras
        assert!(parse_exif_datetime("    :  :     :  :  ").is_none());
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("2021:5:3 10:15:00").is_none());
        assert!(parse_exif_datetime("").is_none());
    }

    #[test]
    fn test_parse_container_naive_formats() {
        let expected = ymd_hms(2024, 1, 15, 14, 30, 0);
        assert_eq!(parse_container_datetime("2024-01-15T14:30:00"), Some(expected));
        assert_eq!(parse_container_datetime("2024-01-15 14:30:00"), Some(expected));
        assert_eq!(parse_container_datetime("2024:01:15 14:30:00"), Some(expected));
        assert_eq!(
            parse_container_datetime("2024-01-15"),
            Some(ymd_hms(2024, 1, 15, 0, 0, 0))
        );
        assert_eq!(
            parse_container_datetime("2019"),
            Some(ymd_hms(2019, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_container_offset_formats() {
        // Converted to local time; mid-month noon keeps year and month stable
        for s in [
            "2024-06-15T12:00:00+02:00",
            "2024-06-15T12:00:00+0200",
            "2024-06-15T12:00:00.250+02:00",
            "2024-06-15T12:00:00Z",
            "2024-06-15T12:00:00.000000Z",
        ] {
            let dt = parse_container_datetime(s).unwrap_or_else(|| panic!("failed: {s}"));
            assert_eq!(dt.year(), 2024, "{s}");
            assert_eq!(dt.month(), 6, "{s}");
        }
    }

    #[test]
    fn test_parse_container_rejects_garbage() {
        assert!(parse_container_datetime("").is_none());
        assert!(parse_container_datetime("not a date").is_none());
        assert!(parse_container_datetime("12345").is_none());
    }

    #[test]
    fn test_scrub_shell_text() {
        assert_eq!(
            scrub_shell_text("\u{200E}5/\u{200E}3/\u{200E}2021 \u{200F}\u{200E}10:15 AM"),
            "5/3/2021 10:15 AM"
        );
        assert_eq!(scrub_shell_text("\u{200E}\u{200F}  "), "");
        assert_eq!(scrub_shell_text("03.05.2021\u{202F}10:15"), "03.05.2021 10:15");
    }

    #[test]
    fn test_parse_shell_datetime_month_first() {
        let dt = parse_shell_datetime(
            "\u{200E}5/\u{200E}3/\u{200E}2021 \u{200F}\u{200E}10:15 AM",
            DateCulture::MonthFirst,
        )
        .unwrap();
        assert_eq!(dt, ymd_hms(2021, 5, 3, 10, 15, 0));

        let dt = parse_shell_datetime("5/3/2021 10:15 PM", DateCulture::MonthFirst).unwrap();
        assert_eq!(dt.hour(), 22);
    }

    #[test]
    fn test_parse_shell_datetime_day_first() {
        let dt = parse_shell_datetime("03.05.2021 10:15", DateCulture::DayFirst).unwrap();
        assert_eq!(dt, ymd_hms(2021, 5, 3, 10, 15, 0));

        let dt = parse_shell_datetime("03/05/2021 10:15:30", DateCulture::DayFirst).unwrap();
        assert_eq!(dt, ymd_hms(2021, 5, 3, 10, 15, 30));
    }

    #[test]
    fn test_parse_shell_datetime_year_first() {
        let dt = parse_shell_datetime("2021/05/03 10:15", DateCulture::YearFirst).unwrap();
        assert_eq!(dt, ymd_hms(2021, 5, 3, 10, 15, 0));
    }

    #[test]
    fn test_parse_shell_datetime_falls_back_to_invariant() {
        // Day 25 cannot be a month, so the day-first culture fails first
        let dt = parse_shell_datetime("12/25/2020 08:00:00", DateCulture::DayFirst).unwrap();
        assert_eq!(dt, ymd_hms(2020, 12, 25, 8, 0, 0));

        // ISO strings from portable providers
        let dt = parse_shell_datetime("2021-05-03 10:15:00", DateCulture::DayFirst).unwrap();
        assert_eq!(dt, ymd_hms(2021, 5, 3, 10, 15, 0));
    }

    #[test]
    fn test_parse_shell_datetime_unavailable() {
        assert!(parse_shell_datetime("", DateCulture::MonthFirst).is_none());
        assert!(parse_shell_datetime("\u{200E}", DateCulture::MonthFirst).is_none());
        assert!(parse_shell_datetime("yesterday", DateCulture::MonthFirst).is_none());
    }

    #[test]
    fn test_date_culture_from_locale() {
        assert_eq!(DateCulture::from_locale("en-US"), DateCulture::MonthFirst);
        assert_eq!(DateCulture::from_locale("en_US.UTF-8"), DateCulture::MonthFirst);
        assert_eq!(DateCulture::from_locale("en"), DateCulture::MonthFirst);
        assert_eq!(DateCulture::from_locale("en-GB"), DateCulture::DayFirst);
        assert_eq!(DateCulture::from_locale("de-DE"), DateCulture::DayFirst);
        assert_eq!(DateCulture::from_locale("zh-Hans-CN"), DateCulture::YearFirst);
        assert_eq!(DateCulture::from_locale("ja-JP"), DateCulture::YearFirst);
        assert_eq!(DateCulture::from_locale("fr-CA"), DateCulture::YearFirst);
    }
}
