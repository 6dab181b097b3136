//! Calendar date, time-of-day and timestamp values with their text forms.
//!
//! Text forms:
//! - Date: `YYYY-MM-DD` (year may be negative or longer than four digits)
//! - Time: `HH:MM:SS[.fraction][zone]`
//! - Timestamp: `DATE/TIME`
//!
//! A zone suffix is one of `/Area/Location`, `/latitude/longitude` (degrees
//! with up to two decimals) or `+HH:MM`/`-HH:MM`. A missing zone means UTC.

use std::fmt;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Error type for date/time parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeParseError {
    pub message: String,
}

impl DateTimeParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DateTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DateTimeParseError {}

/// Returns true if the given year is a leap year.
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Returns the number of days in a given month (1-indexed).
fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

// =====================
// Values
// =====================

/// A calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    year: i32,
    month: u8,
    day: u8,
}

impl Date {
    /// Creates a validated date. Year 0 is not a valid year.
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self, DateTimeParseError> {
        if year == 0 {
            return Err(DateTimeParseError::new("year 0 does not exist"));
        }
        if !(1..=12).contains(&month) {
            return Err(DateTimeParseError::new(format!("invalid month {}", month)));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(DateTimeParseError::new(format!(
                "invalid day {} for {}-{:02}",
                day, year, month
            )));
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

/// Time zone attached to a time or timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Zone {
    #[default]
    Utc,
    /// IANA area/location name such as `Europe/Berlin`.
    Area(String),
    /// Global coordinates in hundredths of a degree.
    LatLong { latitude: i16, longitude: i16 },
    /// Offset from UTC in minutes.
    Offset(i16),
}

impl Zone {
    /// Validates coordinate and offset ranges.
    pub fn validate(&self) -> Result<(), DateTimeParseError> {
        match self {
            Zone::Utc => Ok(()),
            Zone::Area(name) => {
                if name.is_empty() {
                    Err(DateTimeParseError::new("empty time zone name"))
                } else {
                    Ok(())
                }
            }
            Zone::LatLong {
                latitude,
                longitude,
            } => {
                if !(-9000..=9000).contains(latitude) {
                    return Err(DateTimeParseError::new(format!(
                        "latitude {} out of range",
                        latitude
                    )));
                }
                if !(-18000..=18000).contains(longitude) {
                    return Err(DateTimeParseError::new(format!(
                        "longitude {} out of range",
                        longitude
                    )));
                }
                Ok(())
            }
            Zone::Offset(minutes) => {
                if (-1440..=1440).contains(minutes) {
                    Ok(())
                } else {
                    Err(DateTimeParseError::new(format!(
                        "offset {} minutes out of range [-24:00, +24:00]",
                        minutes
                    )))
                }
            }
        }
    }
}

/// A time of day with nanosecond resolution and a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Time {
    hour: u8,
    minute: u8,
    second: u8,
    nanosecond: u32,
    zone: Zone,
}

impl Time {
    /// Creates a validated time. Second 60 is accepted for leap seconds.
    pub fn new(
        hour: u8,
        minute: u8,
        second: u8,
        nanosecond: u32,
        zone: Zone,
    ) -> Result<Self, DateTimeParseError> {
        if hour > 23 {
            return Err(DateTimeParseError::new(format!("invalid hour {}", hour)));
        }
        if minute > 59 {
            return Err(DateTimeParseError::new(format!("invalid minute {}", minute)));
        }
        if second > 60 {
            return Err(DateTimeParseError::new(format!("invalid second {}", second)));
        }
        if nanosecond >= NANOS_PER_SECOND {
            return Err(DateTimeParseError::new(format!(
                "invalid nanosecond {}",
                nanosecond
            )));
        }
        zone.validate()?;
        Ok(Self {
            hour,
            minute,
            second,
            nanosecond,
            zone,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn nanosecond(&self) -> u32 {
        self.nanosecond
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }
}

/// A date, time or timestamp value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimeValue {
    Date(Date),
    Time(Time),
    Timestamp(Date, Time),
}

// =====================
// Parsing
// =====================

/// Parses `[-]Y+-MM-DD`.
pub fn parse_date(s: &str) -> Result<Date, DateTimeParseError> {
    let invalid = || DateTimeParseError::new(format!("invalid date: {}", s));

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let mut parts = body.splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if year.is_empty() || month.len() != 2 || day.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = parse_digits(year).ok_or_else(invalid)?;
    let month: u8 = parse_digits(month).ok_or_else(invalid)?;
    let day: u8 = parse_digits(day).ok_or_else(invalid)?;
    Date::new(if negative { -year } else { year }, month, day)
}

/// Parses `H[H]:MM:SS[.fraction][zone]`.
pub fn parse_time(s: &str) -> Result<Time, DateTimeParseError> {
    let invalid = || DateTimeParseError::new(format!("invalid time: {}", s));

    let hour_len = s.find(':').ok_or_else(invalid)?;
    if !(1..=2).contains(&hour_len) || s.len() < hour_len + 6 {
        return Err(invalid());
    }
    let rest = &s[hour_len..];
    if rest.as_bytes()[0] != b':' || rest.as_bytes()[3] != b':' {
        return Err(invalid());
    }
    let hour: u8 = parse_digits(&s[..hour_len]).ok_or_else(invalid)?;
    let minute: u8 = parse_digits(&rest[1..3]).ok_or_else(invalid)?;
    let second: u8 = parse_digits(&rest[4..6]).ok_or_else(invalid)?;

    let mut rest = &rest[6..];
    let mut nanosecond = 0;
    if let Some(after_dot) = rest.strip_prefix('.') {
        let frac_end = after_dot
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_dot.len());
        nanosecond = parse_fractional_seconds(&after_dot[..frac_end]).ok_or_else(invalid)?;
        rest = &after_dot[frac_end..];
    }

    let zone = parse_zone(rest)?;
    Time::new(hour, minute, second, nanosecond, zone)
}

/// Parses `DATE/TIME`.
pub fn parse_timestamp(s: &str) -> Result<(Date, Time), DateTimeParseError> {
    let slash = s
        .find('/')
        .ok_or_else(|| DateTimeParseError::new(format!("invalid timestamp: {}", s)))?;
    Ok((parse_date(&s[..slash])?, parse_time(&s[slash + 1..])?))
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses 1 to 9 fractional digits as nanoseconds.
fn parse_fractional_seconds(frac: &str) -> Option<u32> {
    if frac.is_empty() || frac.len() > 9 {
        return None;
    }
    let digits: u32 = parse_digits(frac)?;
    Some(digits * 10u32.pow(9 - frac.len() as u32))
}

/// Parses the zone suffix following a time.
fn parse_zone(s: &str) -> Result<Zone, DateTimeParseError> {
    if s.is_empty() || s == "Z" {
        return Ok(Zone::Utc);
    }
    if s.starts_with('+') || s.starts_with('-') {
        return parse_timezone_offset(s).map(Zone::Offset);
    }
    let Some(body) = s.strip_prefix('/') else {
        return Err(DateTimeParseError::new(format!("invalid time zone: {}", s)));
    };

    let starts_numeric = body
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+');
    if starts_numeric {
        let (lat, long) = body
            .split_once('/')
            .ok_or_else(|| DateTimeParseError::new(format!("invalid coordinates: {}", s)))?;
        let zone = Zone::LatLong {
            latitude: parse_hundredths(lat)?,
            longitude: parse_hundredths(long)?,
        };
        zone.validate()?;
        return Ok(zone);
    }

    match body {
        "Z" | "Zero" | "UTC" | "Etc/UTC" => Ok(Zone::Utc),
        "" => Err(DateTimeParseError::new("empty time zone name")),
        name => Ok(Zone::Area(name.to_string())),
    }
}

/// Parses a coordinate in degrees with up to two decimals into hundredths.
fn parse_hundredths(s: &str) -> Result<i16, DateTimeParseError> {
    let invalid = || DateTimeParseError::new(format!("invalid coordinate: {}", s));
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
    if frac.len() > 2 {
        return Err(invalid());
    }
    let whole: i32 = parse_digits(whole).ok_or_else(invalid)?;
    let frac: i32 = if frac.is_empty() {
        0
    } else {
        let value: i32 = parse_digits(frac).ok_or_else(invalid)?;
        if frac.len() == 1 { value * 10 } else { value }
    };
    let value = whole * 100 + frac;
    let value = if negative { -value } else { value };
    i16::try_from(value).map_err(|_| invalid())
}

/// Parses a timezone offset string (+HH:MM, -HH:MM) and returns offset in minutes.
fn parse_timezone_offset(offset: &str) -> Result<i16, DateTimeParseError> {
    let invalid = || DateTimeParseError::new(format!("invalid timezone offset: {}", offset));

    if offset.len() != 6 || offset.as_bytes()[3] != b':' {
        return Err(invalid());
    }
    let sign = match offset.as_bytes()[0] {
        b'+' => 1i16,
        b'-' => -1i16,
        _ => return Err(invalid()),
    };
    let hours: i16 = parse_digits(&offset[1..3]).ok_or_else(invalid)?;
    let minutes: i16 = parse_digits(&offset[4..6]).ok_or_else(invalid)?;

    // Allow 24:00 as special case for ±24:00
    if hours > 24 || (hours == 24 && minutes != 0) || minutes > 59 {
        return Err(invalid());
    }
    Ok(sign * (hours * 60 + minutes))
}

// =====================
// Formatting
// =====================

/// Formats nanoseconds as fractional seconds, omitting if zero.
fn format_fractional_seconds(ns: u32) -> String {
    if ns == 0 {
        return String::new();
    }
    let digits = format!("{:09}", ns);
    format!(".{}", digits.trim_end_matches('0'))
}

/// Formats a coordinate in hundredths of a degree.
fn format_hundredths(value: i16) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    match abs % 100 {
        0 => format!("{}{}", sign, abs / 100),
        frac if frac % 10 == 0 => format!("{}{}.{}", sign, abs / 100, frac / 10),
        frac => format!("{}{}.{:02}", sign, abs / 100, frac),
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Utc => Ok(()),
            Zone::Area(name) => write!(f, "/{}", name),
            Zone::LatLong {
                latitude,
                longitude,
            } => write!(
                f,
                "/{}/{}",
                format_hundredths(*latitude),
                format_hundredths(*longitude)
            ),
            Zone::Offset(minutes) => {
                let sign = if *minutes >= 0 { '+' } else { '-' };
                let abs = minutes.unsigned_abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
            }
        }
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.year < 0 { "-" } else { "" };
        write!(
            f,
            "{}{:04}-{:02}-{:02}",
            sign,
            self.year.unsigned_abs(),
            self.month,
            self.day
        )
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}{}{}",
            self.hour,
            self.minute,
            self.second,
            format_fractional_seconds(self.nanosecond),
            self.zone
        )
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Date(date) => write!(f, "{}", date),
            TimeValue::Time(time) => write!(f, "{}", time),
            TimeValue::Timestamp(date, time) => write!(f, "{}/{}", date, time),
        }
    }
}
