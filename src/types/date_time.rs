// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    ops::{Add, Sub},
};

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::encoding::*;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = NANOS_PER_SECOND / NANOS_PER_TICK;

const MIN_YEAR: i32 = 1601;
const MAX_YEAR: i32 = 9999;

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// A date/time value. This is a wrapper around the chrono type with extra functionality
/// for obtaining ticks in OPC UA measurements, endtimes, epoch etc.
#[derive(PartialEq, PartialOrd, Debug, Clone, Copy)]
pub struct DateTime {
    date_time: DateTimeUtc,
}

impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ticks = self.checked_ticks();
        ticks.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<DateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ticks = i64::deserialize(deserializer)?;
        Ok(DateTime::from(ticks))
    }
}

/// DateTime encoded as 64-bit signed int
impl BinaryEncoder<DateTime> for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let ticks = self.checked_ticks();
        write_i64(stream, ticks)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?;
        Ok(DateTime::from(ticks))
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::epoch()
    }
}

impl Add<Duration> for DateTime {
    type Output = Self;

    fn add(self, duration: Duration) -> Self {
        DateTime::from(self.date_time + duration)
    }
}

impl Sub<DateTime> for DateTime {
    type Output = Duration;

    fn sub(self, other: DateTime) -> Duration {
        self.date_time - other.date_time
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        // Internal representation is rounded to the nearest tick
        let nanos = (date_time.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK) * NANOS_PER_TICK;
        let date_time = Utc
            .timestamp_opt(date_time.timestamp(), nanos as u32)
            .unwrap();
        DateTime { date_time }
    }
}

impl From<i64> for DateTime {
    fn from(value: i64) -> Self {
        // The epoch of OPC UA is midnight Jan 1, 1601. Ticks are 100 nanosecond intervals from then.
        if value == i64::MAX {
            // Max signifies end times
            DateTime::endtimes()
        } else {
            let secs = value / TICKS_PER_SECOND;
            let nanos = (value - secs * TICKS_PER_SECOND) * NANOS_PER_TICK;
            let duration = Duration::seconds(secs) + Duration::nanoseconds(nanos);
            DateTime::from(DateTime::epoch_chrono() + duration)
        }
    }
}

impl From<DateTime> for i64 {
    fn from(value: DateTime) -> Self {
        value.checked_ticks()
    }
}

impl From<DateTime> for DateTimeUtc {
    fn from(value: DateTime) -> Self {
        value.date_time
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date_time.to_rfc3339())
    }
}

impl DateTime {
    /// Constructs from the current time
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// Constructs from the OPC UA epoch, midnight Jan 1, 1601
    pub fn epoch() -> DateTime {
        DateTime::from(Self::epoch_chrono())
    }

    /// Constructs the maximum representable date/time, the so called "end times"
    pub fn endtimes() -> DateTime {
        DateTime::from(Self::endtimes_chrono())
    }

    /// Returns the time in ticks, 100 nanosecond intervals relative to the epoch
    pub fn ticks(&self) -> i64 {
        Self::duration_to_ticks(self.date_time - Self::epoch_chrono())
    }

    /// To checked ticks. Function returns 0 or i64::MAX if the date time is prior to the
    /// epoch or past the end times.
    pub fn checked_ticks(&self) -> i64 {
        let nanos = self.ticks();
        if nanos < 0 {
            0
        } else if self.date_time >= Self::endtimes_chrono() {
            i64::MAX
        } else {
            nanos
        }
    }

    /// Test if the date time is the null value, i.e. the epoch
    pub fn is_null(&self) -> bool {
        self.ticks() == 0
    }

    fn epoch_chrono() -> DateTimeUtc {
        Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
    }

    fn endtimes_chrono() -> DateTimeUtc {
        Utc.with_ymd_and_hms(MAX_YEAR, 12, 31, 23, 59, 59).unwrap()
    }

    fn duration_to_ticks(duration: Duration) -> i64 {
        // Sub-second part handled on its own because the full duration in nanoseconds can
        // overflow an i64 over this range of years. Truncates to whole ticks.
        let seconds = duration.num_seconds();
        let subsec_nanos = (duration - Duration::seconds(seconds))
            .num_nanoseconds()
            .unwrap_or(0);
        seconds * TICKS_PER_SECOND + subsec_nanos / NANOS_PER_TICK
    }
}
