//! GeneralizedTime and UTCTime values.
//!
//! Values keep their parsed calendar fields (and any fractional-second text)
//! so re-encoding reproduces the input exactly; comparisons use the derived
//! UNIX timestamp.

use {super::error::Asn1Error, std::fmt};

/// GeneralizedTime: `YYYYMMDDHHMMSS[.fraction]Z`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneralizedTime {
    pub year:     u32,
    pub month:    u8,
    pub day:      u8,
    pub hour:     u8,
    pub minute:   u8,
    pub second:   u8,
    /// Fractional-second digits, kept verbatim for round-trip fidelity.
    pub fraction: Option<String>,
}

impl GeneralizedTime {
    pub fn new(year: u32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self, Asn1Error> {
        check_fields(year, month, day, hour, minute, second)?;
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            fraction: None,
        })
    }

    /// Parse the DER content octets.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, Asn1Error> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Asn1Error::decoding("GeneralizedTime is not ASCII"))?;
        let body = text
            .strip_suffix('Z')
            .ok_or_else(|| Asn1Error::decoding("GeneralizedTime must end with Z"))?;
        let (main, fraction) = match body.split_once('.') {
            Some((main, fraction)) => (main, Some(fraction)),
            None => (body, None),
        };
        if main.len() != 14 || !main.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Asn1Error::decoding("malformed GeneralizedTime"));
        }
        if let Some(fraction) = fraction {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Asn1Error::decoding("malformed GeneralizedTime fraction"));
            }
        }
        let mut time = Self::new(
            digits(main, 0, 4) as u32,
            digits(main, 4, 2) as u8,
            digits(main, 6, 2) as u8,
            digits(main, 8, 2) as u8,
            digits(main, 10, 2) as u8,
            digits(main, 12, 2) as u8,
        )?;
        time.fraction = fraction.map(str::to_owned);
        Ok(time)
    }

    /// Seconds since the UNIX epoch (fraction discarded).
    pub fn unix_timestamp(&self) -> i64 {
        unix_timestamp(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }
}

impl fmt::Display for GeneralizedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        if let Some(fraction) = &self.fraction {
            write!(f, ".{fraction}")?;
        }
        f.write_str("Z")
    }
}

/// UTCTime: `YYMMDDHHMMSSZ`. RFC 5280: 00-49 maps to 20xx, 50-99 to 19xx.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtcTime {
    pub year:   u32,
    pub month:  u8,
    pub day:    u8,
    pub hour:   u8,
    pub minute: u8,
    pub second: u8,
}

impl UtcTime {
    pub fn new(year: u32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self, Asn1Error> {
        check_fields(year, month, day, hour, minute, second)?;
        if !(1950..=2049).contains(&year) {
            return Err(Asn1Error::invalid("UTCTime year out of range"));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, Asn1Error> {
        let text =
            std::str::from_utf8(bytes).map_err(|_| Asn1Error::decoding("UTCTime is not ASCII"))?;
        let body = text
            .strip_suffix('Z')
            .ok_or_else(|| Asn1Error::decoding("UTCTime must end with Z"))?;
        if body.len() != 12 || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Asn1Error::decoding("malformed UTCTime"));
        }
        let yy = digits(body, 0, 2) as u32;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        Self::new(
            year,
            digits(body, 2, 2) as u8,
            digits(body, 4, 2) as u8,
            digits(body, 6, 2) as u8,
            digits(body, 8, 2) as u8,
            digits(body, 10, 2) as u8,
        )
    }

    /// Seconds since the UNIX epoch.
    pub fn unix_timestamp(&self) -> i64 {
        unix_timestamp(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            self.year % 100,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )
    }
}

fn digits(s: &str, start: usize, len: usize) -> u64 {
    s[start..start + len].parse().unwrap_or(0)
}

fn check_fields(year: u32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<(), Asn1Error> {
    if year < 1 || !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 59 {
        return Err(Asn1Error::invalid("date-time field out of range"));
    }
    Ok(())
}

/// Civil date-time to seconds since 1970-01-01T00:00:00Z (Gregorian).
fn unix_timestamp(year: u32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> i64 {
    let y = i64::from(if month <= 2 { year - 1 } else { year });
    let m = i64::from(if month <= 2 { month + 9 } else { month - 3 });
    let days = 365 * y + y / 4 - y / 100 + y / 400 + (m * 306 + 5) / 10 + i64::from(day) - 1
        - 719468; // offset so the epoch lands on 1970-01-01
    days * 86400 + i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second)
}

/// Current time as a UNIX timestamp.
pub(crate) fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generalized_time() {
        let time = GeneralizedTime::parse(b"20240115093020Z").unwrap();
        assert_eq!((time.year, time.month, time.day), (2024, 1, 15));
        assert_eq!((time.hour, time.minute, time.second), (9, 30, 20));
        assert_eq!(time.to_string(), "20240115093020Z");
    }

    #[test]
    fn keeps_fractional_seconds() {
        let time = GeneralizedTime::parse(b"20240115093020.123Z").unwrap();
        assert_eq!(time.fraction.as_deref(), Some("123"));
        assert_eq!(time.to_string(), "20240115093020.123Z");
    }

    #[test]
    fn rejects_missing_zulu() {
        assert!(GeneralizedTime::parse(b"20240115093020").is_err());
    }

    #[test]
    fn epoch_timestamp_is_zero() {
        let time = GeneralizedTime::new(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(time.unix_timestamp(), 0);
    }

    #[test]
    fn known_timestamp() {
        // 2000-01-01 00:00:00 UTC
        let time = GeneralizedTime::new(2000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(time.unix_timestamp(), 946684800);
    }

    #[test]
    fn utc_time_century_windowing() {
        let recent = UtcTime::parse(b"240115093020Z").unwrap();
        assert_eq!(recent.year, 2024);
        let old = UtcTime::parse(b"990115093020Z").unwrap();
        assert_eq!(old.year, 1999);
        assert_eq!(recent.to_string(), "240115093020Z");
    }
}
