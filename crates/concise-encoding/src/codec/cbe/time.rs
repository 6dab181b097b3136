//! Compact date/time encoding.
//!
//! ```text
//! date      = ULEB128( zigzag(year - 2000) << 9 | month << 5 | day )
//! time      = ULEB128( subsec << 20 | hour << 15 | minute << 9 | second << 3
//!                      | precision << 1 | has_zone )
//! zone      = ULEB128 header h, then:
//!               h & 3 == 0: area name, h >> 2 bytes of UTF-8
//!               h & 3 == 1: latitude, longitude (zigzag varints, 1/100 degree)
//!               h & 3 == 2: offset minutes (zigzag varint)
//! ```
//!
//! `precision` is 0 (whole seconds), 1 (milliseconds), 2 (microseconds) or
//! 3 (nanoseconds); `subsec` counts units of that precision.

use super::tags;
use crate::codec::primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
use crate::error::Error;
use crate::util::datetime::{Date, DateTimeParseError, Time, TimeValue, Zone};

const YEAR_BIAS: i64 = 2000;

const ZONE_AREA: u64 = 0;
const ZONE_LAT_LONG: u64 = 1;
const ZONE_OFFSET: u64 = 2;

/// Upper bound on an area name, far beyond any IANA zone name.
const MAX_AREA_NAME_LEN: u64 = 127;

fn invalid(e: DateTimeParseError) -> Error {
    Error::InvalidTime { message: e.message }
}

// =============================================================================
// ENCODING
// =============================================================================

pub fn write_date(writer: &mut Writer, date: &Date) {
    let year = zigzag_encode(i64::from(date.year()) - YEAR_BIAS);
    writer.write_varint((year << 9) | (u64::from(date.month()) << 5) | u64::from(date.day()));
}

pub fn write_time(writer: &mut Writer, time: &Time) -> Result<(), Error> {
    let ns = time.nanosecond();
    let (precision, subsec) = if ns == 0 {
        (0u64, 0u64)
    } else if ns % 1_000_000 == 0 {
        (1, u64::from(ns / 1_000_000))
    } else if ns % 1_000 == 0 {
        (2, u64::from(ns / 1_000))
    } else {
        (3, u64::from(ns))
    };
    let has_zone = u64::from(*time.zone() != Zone::Utc);
    writer.write_varint(
        (subsec << 20)
            | (u64::from(time.hour()) << 15)
            | (u64::from(time.minute()) << 9)
            | (u64::from(time.second()) << 3)
            | (precision << 1)
            | has_zone,
    );
    match time.zone() {
        Zone::Utc => {}
        Zone::Area(name) => {
            if name.len() as u64 > MAX_AREA_NAME_LEN {
                return Err(Error::UnsupportedType {
                    type_name: "time zone name longer than 127 bytes",
                    format: "CBE",
                });
            }
            writer.write_varint(((name.len() as u64) << 2) | ZONE_AREA);
            writer.write_bytes(name.as_bytes());
        }
        Zone::LatLong {
            latitude,
            longitude,
        } => {
            writer.write_varint(ZONE_LAT_LONG);
            writer.write_signed_varint(i64::from(*latitude));
            writer.write_signed_varint(i64::from(*longitude));
        }
        Zone::Offset(minutes) => {
            writer.write_varint(ZONE_OFFSET);
            writer.write_signed_varint(i64::from(*minutes));
        }
    }
    Ok(())
}

pub fn write_time_value(writer: &mut Writer, value: &TimeValue) -> Result<(), Error> {
    match value {
        TimeValue::Date(date) => {
            writer.write_byte(tags::DATE);
            write_date(writer, date);
        }
        TimeValue::Time(time) => {
            writer.write_byte(tags::TIME);
            write_time(writer, time)?;
        }
        TimeValue::Timestamp(date, time) => {
            writer.write_byte(tags::TIMESTAMP);
            write_date(writer, date);
            write_time(writer, time)?;
        }
    }
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

pub fn read_date(reader: &mut Reader<'_>) -> Result<Date, Error> {
    let packed = reader.read_varint("date")?;
    let day = (packed & 0x1F) as u8;
    let month = ((packed >> 5) & 0x0F) as u8;
    let year = zigzag_decode(packed >> 9) + YEAR_BIAS;
    let year = i32::try_from(year).map_err(|_| Error::InvalidTime {
        message: format!("year {} out of range", year),
    })?;
    Date::new(year, month, day).map_err(invalid)
}

pub fn read_time(reader: &mut Reader<'_>) -> Result<Time, Error> {
    let packed = reader.read_varint("time")?;
    let has_zone = packed & 1 == 1;
    let precision = (packed >> 1) & 0x03;
    let second = ((packed >> 3) & 0x3F) as u8;
    let minute = ((packed >> 9) & 0x3F) as u8;
    let hour = ((packed >> 15) & 0x1F) as u8;
    let subsec = packed >> 20;

    let scale = match precision {
        0 if subsec == 0 => 0,
        0 => {
            return Err(Error::MalformedEncoding {
                context: "sub-second value without precision",
            });
        }
        1 => 1_000_000,
        2 => 1_000,
        _ => 1,
    };
    let nanosecond = subsec
        .checked_mul(scale)
        .and_then(|ns| u32::try_from(ns).ok())
        .ok_or(Error::MalformedEncoding {
            context: "sub-second value out of range",
        })?;

    let zone = if has_zone { read_zone(reader)? } else { Zone::Utc };
    Time::new(hour, minute, second, nanosecond, zone).map_err(invalid)
}

fn read_zone(reader: &mut Reader<'_>) -> Result<Zone, Error> {
    let header = reader.read_varint("time zone")?;
    match header & 0x03 {
        ZONE_AREA => {
            let len = header >> 2;
            if len == 0 || len > MAX_AREA_NAME_LEN {
                return Err(Error::MalformedEncoding {
                    context: "time zone name length",
                });
            }
            Ok(Zone::Area(reader.read_str(len as usize, "time zone name")?))
        }
        ZONE_LAT_LONG => {
            let latitude = read_i16(reader, "latitude")?;
            let longitude = read_i16(reader, "longitude")?;
            Ok(Zone::LatLong {
                latitude,
                longitude,
            })
        }
        ZONE_OFFSET => Ok(Zone::Offset(read_i16(reader, "time zone offset")?)),
        _ => Err(Error::MalformedEncoding {
            context: "time zone type",
        }),
    }
}

fn read_i16(reader: &mut Reader<'_>, context: &'static str) -> Result<i16, Error> {
    let value = reader.read_signed_varint(context)?;
    i16::try_from(value).map_err(|_| Error::MalformedEncoding { context })
}
