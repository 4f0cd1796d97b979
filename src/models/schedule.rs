//! Schedule (solution) and validation report models.
//!
//! A schedule is an ordered list of session placements. Entries are never
//! mutated once accepted; a change produces a replacement entry.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::calendar::{minutes_between, ranges_overlap};
use super::{Day, TimeSlot};

/// One placed session: a section attends a subject taught by a faculty
/// member in a classroom at a given time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: Day,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub subject_id: String,
    pub faculty_id: String,
    pub classroom_id: String,
    pub section_id: String,
}

impl ScheduleEntry {
    /// Creates a new entry.
    pub fn new(
        slot: TimeSlot,
        subject_id: impl Into<String>,
        faculty_id: impl Into<String>,
        classroom_id: impl Into<String>,
        section_id: impl Into<String>,
    ) -> Self {
        Self {
            day: slot.day,
            start: slot.start,
            end: slot.end,
            subject_id: subject_id.into(),
            faculty_id: faculty_id.into(),
            classroom_id: classroom_id.into(),
            section_id: section_id.into(),
        }
    }

    /// The occupied interval as a slot.
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.day, self.start, self.end)
    }

    /// Session length in minutes.
    #[inline]
    pub fn duration_minutes(&self) -> u32 {
        minutes_between(self.start, self.end)
    }

    /// Whether this entry and `other` share any instant.
    pub fn overlaps(&self, other: &Self) -> bool {
        ranges_overlap(self.day, self.start, self.end, other.day, other.start, other.end)
    }

    /// A copy of this entry taught by another faculty member.
    pub fn with_faculty(&self, faculty_id: impl Into<String>) -> Self {
        Self {
            faculty_id: faculty_id.into(),
            ..self.clone()
        }
    }

    /// A copy of this entry held in another classroom.
    pub fn with_classroom(&self, classroom_id: impl Into<String>) -> Self {
        Self {
            classroom_id: classroom_id.into(),
            ..self.clone()
        }
    }

    /// Whether this entry belongs to the (subject, section) pair.
    pub fn is_pair(&self, subject_id: &str, section_id: &str) -> bool {
        self.subject_id == subject_id && self.section_id == section_id
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} for {} by {} in {}",
            self.slot(),
            self.subject_id,
            self.section_id,
            self.faculty_id,
            self.classroom_id
        )
    }
}

/// An ordered list of schedule entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schedule from entries, keeping their order.
    pub fn from_entries(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    /// Sorts entries into canonical order: day, start, section, subject,
    /// faculty, classroom.
    pub fn into_canonical(mut self) -> Self {
        self.entries.sort_by(|a, b| {
            (a.day, a.start, &a.section_id, &a.subject_id, &a.faculty_id, &a.classroom_id, a.end).cmp(&(
                b.day,
                b.start,
                &b.section_id,
                &b.subject_id,
                &b.faculty_id,
                &b.classroom_id,
                b.end,
            ))
        });
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries taught by a faculty member.
    pub fn entries_for_faculty(&self, faculty_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.faculty_id == faculty_id)
            .collect()
    }

    /// Entries attended by a section.
    pub fn entries_for_section(&self, section_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.section_id == section_id)
            .collect()
    }

    /// Entries held in a classroom.
    pub fn entries_for_classroom(&self, classroom_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.classroom_id == classroom_id)
            .collect()
    }

    /// Number of entries for one (subject, section) pair.
    pub fn count_for_pair(&self, subject_id: &str, section_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.is_pair(subject_id, section_id))
            .count()
    }
}

/// A hard-constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub kind: ViolationKind,
    /// Human-readable description.
    pub detail: String,
    /// Indices of the offending entries in the validated schedule.
    pub entries: Vec<usize>,
}

/// Classification of hard-constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A faculty member teaches two overlapping sessions.
    FacultyConflict,
    /// A classroom hosts two overlapping sessions.
    ClassroomConflict,
    /// A section attends two overlapping sessions.
    SectionConflict,
    /// A classroom is smaller than the section placed in it.
    CapacityViolation,
    /// A faculty member is not qualified for the subject taught.
    QualificationMismatch,
    /// A (subject, section) pair has fewer sessions than required.
    UnscheduledRequirement,
    /// A (subject, section) pair has more sessions than required, or is not
    /// in scope at all.
    ExcessSessions,
    /// A faculty member or classroom is booked during a period it is
    /// marked unavailable.
    AvailabilityConflict,
}

/// An advisory, non-blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub detail: String,
    pub entries: Vec<usize>,
}

/// Classification of advisory warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A faculty member teaches a long run of back-to-back sessions.
    ConsecutiveSessions,
    /// A subject's sessions are packed onto fewer days than they could be.
    SubjectClustering,
    /// A faculty member's weekly hours exceed their cap or the recommended load.
    WorkloadExceeded,
    /// A session is held in a room of the wrong type.
    RoomTypeMismatch,
    /// Fewer sessions than required, reported as advisory under the
    /// warning shortfall policy.
    SessionShortfall,
}

impl Violation {
    pub fn new(kind: ViolationKind, detail: impl Into<String>, entries: Vec<usize>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            entries,
        }
    }
}

impl Warning {
    pub fn new(kind: WarningKind, detail: impl Into<String>, entries: Vec<usize>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            entries,
        }
    }
}

/// Outcome of validating a schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
    /// True iff `violations` is empty.
    pub satisfied: bool,
}

impl ValidationReport {
    /// Builds a report; `satisfied` is derived from `violations`.
    pub fn new(violations: Vec<Violation>, warnings: Vec<Warning>) -> Self {
        let satisfied = violations.is_empty();
        Self {
            violations,
            warnings,
            satisfied,
        }
    }

    /// Violations of one kind.
    pub fn violations_of(&self, kind: ViolationKind) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }

    /// Warnings of one kind.
    pub fn warnings_of(&self, kind: WarningKind) -> Vec<&Warning> {
        self.warnings.iter().filter(|w| w.kind == kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(day: Day, start: (u32, u32), end: (u32, u32), subject: &str, section: &str) -> ScheduleEntry {
        ScheduleEntry::new(
            TimeSlot::new(day, t(start.0, start.1), t(end.0, end.1)),
            subject,
            "F1",
            "R1",
            section,
        )
    }

    fn sample_schedule() -> Schedule {
        Schedule::from_entries(vec![
            entry(Day::Tuesday, (9, 0), (10, 0), "MATH", "S1"),
            entry(Day::Monday, (10, 0), (11, 0), "PHY", "S1"),
            entry(Day::Monday, (9, 0), (10, 0), "MATH", "S2"),
        ])
    }

    #[test]
    fn test_entry_overlap() {
        let a = entry(Day::Monday, (9, 0), (10, 0), "MATH", "S1");
        let b = entry(Day::Monday, (9, 30), (10, 30), "PHY", "S2");
        let c = entry(Day::Monday, (10, 0), (11, 0), "PHY", "S2");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.duration_minutes(), 60);
    }

    #[test]
    fn test_substitution_leaves_original() {
        let a = entry(Day::Monday, (9, 0), (10, 0), "MATH", "S1");
        let b = a.with_faculty("F2").with_classroom("R9");
        assert_eq!(a.faculty_id, "F1");
        assert_eq!(b.faculty_id, "F2");
        assert_eq!(b.classroom_id, "R9");
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn test_canonical_order() {
        let s = sample_schedule().into_canonical();
        let order: Vec<(Day, &str)> = s
            .entries
            .iter()
            .map(|e| (e.day, e.subject_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(Day::Monday, "MATH"), (Day::Monday, "PHY"), (Day::Tuesday, "MATH")]
        );
    }

    #[test]
    fn test_queries() {
        let s = sample_schedule();
        assert_eq!(s.entries_for_section("S1").len(), 2);
        assert_eq!(s.entries_for_faculty("F1").len(), 3);
        assert_eq!(s.entries_for_classroom("R2").len(), 0);
        assert_eq!(s.count_for_pair("MATH", "S1"), 1);
    }

    #[test]
    fn test_report_satisfied_flag() {
        let ok = ValidationReport::new(vec![], vec![Warning::new(WarningKind::SubjectClustering, "x", vec![])]);
        assert!(ok.satisfied);

        let bad = ValidationReport::new(
            vec![Violation::new(ViolationKind::FacultyConflict, "clash", vec![0, 1])],
            vec![],
        );
        assert!(!bad.satisfied);
        assert_eq!(bad.violations_of(ViolationKind::FacultyConflict).len(), 1);
    }

    #[test]
    fn test_schedule_serializes_as_list() {
        let s = sample_schedule();
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 3);
    }
}
