//! MS-DOS timestamps for entry headers.

use std::time::SystemTime;

/// Represents an MS-DOS timestamp with 2-second precision.
///
/// MS-DOS timestamps are stored as packed 16-bit values for date and time,
/// with a limited range from 1980 to 2107 and 2-second precision for seconds.
/// Values are computed in UTC so archives don't depend on the local time zone
/// of the machine that built them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    time: u16,
    date: u16,
}

impl DosDateTime {
    /// Creates a new MS-DOS datetime from packed date and time values.
    #[must_use]
    pub(crate) const fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Packs calendar components, saturating the year to the DOS range.
    #[must_use]
    pub fn from_components(
        year: i16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        if year < 1980 {
            // earliest representable instant: 1980-01-01 00:00:00
            return Self::new(0, (1 << 5) | 1);
        }

        let dos_year = (year as u16).min(2107);

        // Pack the date: bits 15-9: year-1980, bits 8-5: month, bits 4-0: day
        let date = ((dos_year - 1980) << 9) | ((month as u16) << 5) | (day as u16);

        // Pack the time: bits 15-11: hour, bits 10-5: minute, bits 4-0: second/2
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | ((second as u16) / 2);

        Self::new(time, date)
    }

    /// Converts a file system timestamp. Times that can't be represented
    /// fall back to the DOS epoch.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let Ok(timestamp) = jiff::Timestamp::try_from(time) else {
            return Self::from_components(1980, 1, 1, 0, 0, 0);
        };

        let dt = timestamp.to_zoned(jiff::tz::TimeZone::UTC).datetime();
        Self::from_components(
            dt.year(),
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
    }

    /// Returns the year (1980-2107).
    #[must_use]
    pub fn year(&self) -> u16 {
        ((self.date >> 9) & 0x7f) + 1980
    }

    /// Returns the month (1-12).
    #[must_use]
    pub fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0f) as u8
    }

    /// Returns the day of the month (1-31).
    #[must_use]
    pub fn day(&self) -> u8 {
        (self.date & 0x1f) as u8
    }

    /// Returns the packed time and date components as (time, date).
    #[must_use]
    pub(crate) const fn into_parts(self) -> (u16, u16) {
        (self.time, self.date)
    }
}
