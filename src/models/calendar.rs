//! Weekday and time slot models.
//!
//! # Time Model
//! A weekly pattern: a slot is a half-open interval `[start, end)` of
//! wall-clock time on one [`Day`]. Two slots overlap only if they fall on the
//! same day and their intervals intersect; touching intervals do not overlap.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A day of the teaching week.
///
/// Ordering follows the calendar week (Monday first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// Monday through Friday.
    pub const WEEKDAYS: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    /// Full English name.
    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = String;

    /// Accepts full names and three-letter abbreviations, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let day = match lower.as_str() {
            "monday" | "mon" => Day::Monday,
            "tuesday" | "tue" => Day::Tuesday,
            "wednesday" | "wed" => Day::Wednesday,
            "thursday" | "thu" => Day::Thursday,
            "friday" | "fri" => Day::Friday,
            "saturday" | "sat" => Day::Saturday,
            "sunday" | "sun" => Day::Sunday,
            _ => return Err(format!("unknown day: {s}")),
        };
        Ok(day)
    }
}

/// A bookable interval `[start, end)` on one day.
///
/// Generated by the slot generator, never supplied directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Day of the week.
    pub day: Day,
    /// Interval start (inclusive).
    pub start: NaiveTime,
    /// Interval end (exclusive).
    pub end: NaiveTime,
}

impl TimeSlot {
    /// Creates a new slot.
    pub fn new(day: Day, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    /// Length of the slot in minutes.
    #[inline]
    pub fn duration_minutes(&self) -> u32 {
        minutes_between(self.start, self.end)
    }

    /// Whether two slots share any instant.
    pub fn overlaps(&self, other: &Self) -> bool {
        ranges_overlap(self.day, self.start, self.end, other.day, other.start, other.end)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Whether `(day_a, [start_a, end_a))` and `(day_b, [start_b, end_b))` intersect.
pub(crate) fn ranges_overlap(
    day_a: Day,
    start_a: NaiveTime,
    end_a: NaiveTime,
    day_b: Day,
    start_b: NaiveTime,
    end_b: NaiveTime,
) -> bool {
    day_a == day_b && start_a < end_b && start_b < end_a
}

/// Minutes from `start` to `end`, zero if `end` is not after `start`.
pub(crate) fn minutes_between(start: NaiveTime, end: NaiveTime) -> u32 {
    let s = start.num_seconds_from_midnight();
    let e = end.num_seconds_from_midnight();
    e.saturating_sub(s) / 60
}
