//! Slot generation.
//!
//! Derives the ordered grid of bookable slots from a working-day list, a
//! daily window, and a slot duration. Slots are back-to-back within a day;
//! a trailing remainder shorter than one slot is dropped.
//!
//! Daily breaks (lunch, assembly) are never covered by a slot. A slot that
//! would reach into a break is not generated; the next one starts where the
//! break ends.
//!
//! # Ordering
//! Days appear in the order they were listed, slots within a day by start
//! time. The scheduler walks this order, so it is part of the determinism
//! contract.

use std::ops::Range;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::calendar::minutes_between;
use crate::models::{Day, ScheduleEntry, TimeSlot};

/// The weekly pattern parameters of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWindow {
    /// Working days, in scheduling order.
    pub working_days: Vec<Day>,
    /// Daily start time.
    pub day_start: NaiveTime,
    /// Daily end time.
    pub day_end: NaiveTime,
    /// Slot length in minutes.
    pub slot_minutes: u32,
    /// Periods left free on every working day.
    #[serde(default)]
    pub breaks: Vec<DailyBreak>,
}

/// A daily period `[start, end)` no session may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailyBreak {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyBreak {
    fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start < end && start < self.end
    }
}

impl WeeklyWindow {
    /// Creates a window.
    pub fn new(working_days: Vec<Day>, day_start: NaiveTime, day_end: NaiveTime, slot_minutes: u32) -> Self {
        Self {
            working_days,
            day_start,
            day_end,
            slot_minutes,
            breaks: Vec::new(),
        }
    }

    /// Adds a daily break.
    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.breaks.push(DailyBreak { start, end });
        self
    }

    /// Monday to Friday with the given daily window.
    pub fn weekdays(day_start: NaiveTime, day_end: NaiveTime, slot_minutes: u32) -> Self {
        Self::new(Day::WEEKDAYS.to_vec(), day_start, day_end, slot_minutes)
    }
}

/// The ordered slot sequence of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    slots: Vec<TimeSlot>,
    slot_minutes: u32,
}

/// Generates the slot grid for `window`.
///
/// # Errors
/// - [`ConfigError::EmptyDayList`] / [`ConfigError::DuplicateDay`]
/// - [`ConfigError::InvalidWindow`] if start is not before end
/// - [`ConfigError::InvalidBreak`] if a break does not start before it ends
/// - [`ConfigError::InvalidDuration`] if the slot length is zero
/// - [`ConfigError::SlotDoesNotFit`] if not even one slot fits around the breaks
pub fn generate_slots(window: &WeeklyWindow) -> Result<SlotGrid, ConfigError> {
    if window.working_days.is_empty() {
        return Err(ConfigError::EmptyDayList);
    }
    for (i, day) in window.working_days.iter().enumerate() {
        if window.working_days[..i].contains(day) {
            return Err(ConfigError::DuplicateDay(day.to_string()));
        }
    }
    if window.day_start >= window.day_end {
        return Err(ConfigError::InvalidWindow {
            start: window.day_start,
            end: window.day_end,
        });
    }
    if let Some(b) = window.breaks.iter().find(|b| b.start >= b.end) {
        return Err(ConfigError::InvalidBreak {
            start: b.start,
            end: b.end,
        });
    }
    if window.slot_minutes == 0 {
        return Err(ConfigError::InvalidDuration);
    }

    let daily = daily_intervals(window);
    if daily.is_empty() {
        return Err(ConfigError::SlotDoesNotFit {
            slot_minutes: window.slot_minutes,
            window_minutes: minutes_between(window.day_start, window.day_end),
        });
    }

    let mut slots = Vec::with_capacity(window.working_days.len() * daily.len());
    for &day in &window.working_days {
        slots.extend(daily.iter().map(|&(start, end)| TimeSlot::new(day, start, end)));
    }

    Ok(SlotGrid {
        slots,
        slot_minutes: window.slot_minutes,
    })
}

/// Start and end of each slot in one working day.
fn daily_intervals(window: &WeeklyWindow) -> Vec<(NaiveTime, NaiveTime)> {
    let step = Duration::minutes(i64::from(window.slot_minutes));
    let mut intervals = Vec::new();
    let mut start = window.day_start;

    while start < window.day_end && minutes_between(start, window.day_end) >= window.slot_minutes {
        let end = start + step;
        let resume = window
            .breaks
            .iter()
            .filter(|b| b.overlaps(start, end))
            .map(|b| b.end)
            .max();
        match resume {
            Some(after_break) => start = after_break,
            None => {
                intervals.push((start, end));
                start = end;
            }
        }
    }
    intervals
}

impl SlotGrid {
    /// All slots in scheduling order.
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    /// Slot length in minutes.
    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`.
    pub fn get(&self, index: usize) -> Option<&TimeSlot> {
        self.slots.get(index)
    }

    /// Range of `len` back-to-back slots on one day starting at `first`.
    ///
    /// Returns `None` if the run would leave the day or the grid.
    pub fn span(&self, first: usize, len: usize) -> Option<Range<usize>> {
        let last = first.checked_add(len)?.checked_sub(1)?;
        if last >= self.slots.len() {
            return None;
        }
        let run = &self.slots[first..=last];
        let contiguous = run
            .windows(2)
            .all(|w| w[0].day == w[1].day && w[0].end == w[1].start);
        contiguous.then_some(first..last + 1)
    }

    /// The interval covered by a span.
    pub fn span_slot(&self, range: &Range<usize>) -> Option<TimeSlot> {
        let first = self.slots.get(range.start)?;
        let last = self.slots.get(range.end.checked_sub(1)?)?;
        Some(TimeSlot::new(first.day, first.start, last.end))
    }

    /// Indices of every slot an entry occupies, wholly or partly.
    pub fn overlapping(&self, entry: &ScheduleEntry) -> Vec<usize> {
        self.overlapping_period(&entry.slot())
    }

    /// Indices of every slot touching `period`.
    pub fn overlapping_period(&self, period: &TimeSlot) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.overlaps(period))
            .map(|(i, _)| i)
            .collect()
    }

    /// The span an entry covers exactly, if it starts and ends on slot
    /// boundaries of this grid.
    pub fn aligned_span(&self, entry: &ScheduleEntry) -> Option<Range<usize>> {
        let first = self
            .slots
            .iter()
            .position(|s| s.day == entry.day && s.start == entry.start)?;
        let last = self.slots[first..]
            .iter()
            .position(|s| s.day == entry.day && s.end == entry.end)?
            + first;
        self.span(first, last - first + 1)
    }

    /// Distinct days in grid order.
    pub fn days(&self) -> Vec<Day> {
        let mut days: Vec<Day> = Vec::new();
        for s in &self.slots {
            if days.last() != Some(&s.day) {
                days.push(s.day);
            }
        }
        days
    }
}
