//! Faculty model.
//!
//! A faculty member teaches sessions of the subjects they are qualified for,
//! one session at a time, optionally bounded by a weekly teaching-hour cap
//! and blocked out of the weekly periods they cannot teach.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::calendar::TimeSlot;

/// A teacher who can be assigned to sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    /// Unique faculty identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Subject IDs this faculty member may teach.
    #[serde(default)]
    pub qualified_subjects: BTreeSet<String>,
    /// Maximum teaching hours per week. `None` = uncapped.
    #[serde(default)]
    pub max_hours_per_week: Option<u32>,
    /// Weekly periods this faculty member cannot teach.
    #[serde(default, alias = "unavailable_slots")]
    pub unavailable: Vec<TimeSlot>,
}

impl Faculty {
    /// Creates a faculty member with no qualifications.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            qualified_subjects: BTreeSet::new(),
            max_hours_per_week: None,
            unavailable: Vec::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a subject this faculty member can teach.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.qualified_subjects.insert(subject_id.into());
        self
    }

    /// Adds several subjects at once.
    pub fn with_subjects<I, S>(mut self, subject_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualified_subjects
            .extend(subject_ids.into_iter().map(Into::into));
        self
    }

    /// Sets the weekly teaching-hour cap.
    pub fn with_max_hours(mut self, hours: u32) -> Self {
        self.max_hours_per_week = Some(hours);
        self
    }

    /// Blocks out a weekly period.
    pub fn with_unavailable(mut self, period: TimeSlot) -> Self {
        self.unavailable.push(period);
        self
    }

    /// Whether `slot` is clear of every blocked period.
    pub fn is_available(&self, slot: &TimeSlot) -> bool {
        !self.unavailable.iter().any(|blocked| blocked.overlaps(slot))
    }

    /// Whether this faculty member may teach `subject_id`.
    pub fn can_teach(&self, subject_id: &str) -> bool {
        self.qualified_subjects.contains(subject_id)
    }

    /// Weekly cap in minutes, if any.
    pub fn max_minutes_per_week(&self) -> Option<u32> {
        self.max_hours_per_week.map(|h| h.saturating_mul(60))
    }
}
