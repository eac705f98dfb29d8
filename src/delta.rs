use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use crate::network::{DayIndex, Minutes, UnixTime};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A point in time relative to the base day of a query.
///
/// Ordering is lexicographic on `(days, mam)`, which matches the ordering of the
/// absolute times as long as `mam` stays below one day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Delta {
    days: u16,
    mam: u16,
}

impl Delta {
    pub const fn new(days: u16, mam: u16) -> Self {
        debug_assert!(mam < MINUTES_PER_DAY);
        Self { days, mam }
    }

    pub const fn days(self) -> u16 { self.days }

    pub const fn mam(self) -> u16 { self.mam }

    /// Minutes since midnight of the base day.
    pub const fn as_minutes(self) -> u32 {
        self.days as u32 * MINUTES_PER_DAY as u32 + self.mam as u32
    }

    /// Minutes elapsed since an earlier delta. Going backwards in time is a logic error.
    pub fn minutes_since(self, earlier: Delta) -> u32 {
        debug_assert!(self >= earlier, "{self:?} precedes {earlier:?}");
        self.as_minutes() - earlier.as_minutes()
    }

    /// Delta `minutes` later, or `None` if the day count would overflow.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<Delta> {
        let total = self.as_minutes().checked_add(minutes)?;
        let days = u16::try_from(total / MINUTES_PER_DAY as u32).ok()?;
        Some(Delta::new(days, (total % MINUTES_PER_DAY as u32) as u16))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("Day offset {day_offset} lies before the base day.")]
    BeforeBase { day_offset: i32 },
    #[error("Day offset {day_offset} lies outside the supported window of {max_day_offset} days.")]
    OutsideWindow { day_offset: i32, max_day_offset: u16 },
}

/// Converts between absolute times and deltas relative to a base day.
///
/// Day indices count days since `first_day`, the first day of the timetable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeFrame {
    first_day: NaiveDate,
    base: DayIndex,
    max_day_offset: u16,
}

impl TimeFrame {
    pub fn new(first_day: NaiveDate, base: DayIndex, max_day_offset: u16) -> Self {
        Self { first_day, base, max_day_offset }
    }

    pub fn base(&self) -> DayIndex { self.base }

    pub fn max_day_offset(&self) -> u16 { self.max_day_offset }

    /// Absolute day index (days since the first timetable day) of a day offset.
    pub fn absolute_day(&self, day_offset: i32) -> i32 { self.base as i32 + day_offset }

    /// Checked constructor: `day_offset` must lie in `0..max_day_offset`.
    pub fn offset_delta(&self, day_offset: i32, mam: u16) -> Result<Delta, DeltaError> {
        if day_offset < 0 {
            return Err(DeltaError::BeforeBase { day_offset });
        }
        if day_offset >= self.max_day_offset as i32 {
            return Err(DeltaError::OutsideWindow { day_offset, max_day_offset: self.max_day_offset });
        }
        Ok(Delta::new(day_offset as u16, mam))
    }

    /// Delta of an event given in minutes relative to the midnight of a run whose service day
    /// is `run_offset` days after the base day. Event minutes may exceed one day.
    pub fn event_delta(&self, run_offset: i32, minutes: Minutes) -> Result<Delta, DeltaError> {
        let carry = (minutes / MINUTES_PER_DAY) as i32;
        self.offset_delta(run_offset + carry, minutes % MINUTES_PER_DAY)
    }

    pub fn delta_of(&self, day: DayIndex, mam: u16) -> Result<Delta, DeltaError> {
        self.offset_delta(day as i32 - self.base as i32, mam)
    }

    pub fn to_delta(&self, time: UnixTime) -> Result<Delta, DeltaError> {
        let day = time.date().signed_duration_since(self.first_day).num_days();
        let mam = (time.hour() * 60 + time.minute()) as u16;
        let day_offset = i32::try_from(day - self.base as i64).unwrap_or(i32::MAX);
        self.offset_delta(day_offset, mam)
    }

    pub fn from_delta(&self, delta: Delta) -> UnixTime {
        self.at(delta.days() as i32, delta.mam())
    }

    /// Absolute time `minutes` after the midnight of the day `day_offset` days after the base day.
    pub fn at(&self, day_offset: i32, minutes: Minutes) -> UnixTime {
        self.first_day.and_time(NaiveTime::MIN)
            + Duration::days(self.absolute_day(day_offset) as i64)
            + Duration::minutes(minutes as i64)
    }
}
