//! Constraint validator.
//!
//! Re-derives every hard violation and advisory warning of a schedule from
//! the catalog alone. It does not trust the scheduler: hand-built and edited
//! schedules are checked the same way.
//!
//! # Checks
//!
//! | Check | Kind |
//! |-------|------|
//! | Faculty / classroom / section overlap | `*Conflict` (one per overlapping pair) |
//! | Room smaller than section, unknown room or section | `CapacityViolation` |
//! | Faculty not qualified, unknown faculty or subject | `QualificationMismatch` |
//! | Fewer sessions than required | `UnscheduledRequirement` or `SessionShortfall` warning |
//! | More sessions than required, pair not in scope | `ExcessSessions` |
//! | Faculty or classroom booked while unavailable | `AvailabilityConflict` |
//!
//! Warnings: back-to-back runs, day clustering, weekly workload, room type.
//!
//! Output order is fixed by entry index and ID order, so validating the same
//! input twice gives identical reports.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::{ShortfallPolicy, ValidationPolicy};
use crate::models::{
    Catalog, Day, Schedule, ScheduleEntry, ValidationReport, Violation, ViolationKind, Warning,
    WarningKind,
};
use crate::scheduler::SessionPlan;

/// Validates schedules against a catalog under a policy.
#[derive(Debug, Clone, Default)]
pub struct ConstraintValidator {
    policy: ValidationPolicy,
}

/// Validates with the catalog's default session counts and the default
/// policy.
pub fn validate_schedule(catalog: &Catalog, schedule: &Schedule) -> ValidationReport {
    ConstraintValidator::new().validate(catalog, &SessionPlan::from_catalog(catalog), schedule)
}

impl ConstraintValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the validation policy.
    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Checks `schedule` against `catalog` and the session counts in `plan`.
    pub fn validate(&self, catalog: &Catalog, plan: &SessionPlan, schedule: &Schedule) -> ValidationReport {
        let entries = &schedule.entries;
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        check_overlaps(entries, |e| &e.faculty_id, ViolationKind::FacultyConflict, "Faculty", &mut violations);
        check_overlaps(entries, |e| &e.classroom_id, ViolationKind::ClassroomConflict, "Classroom", &mut violations);
        check_overlaps(entries, |e| &e.section_id, ViolationKind::SectionConflict, "Section", &mut violations);

        for (i, e) in entries.iter().enumerate() {
            check_capacity(catalog, i, e, &mut violations);
            check_qualification(catalog, i, e, &mut violations);
            check_availability(catalog, i, e, &mut violations);
            check_room_type(catalog, i, e, &mut warnings);
        }

        self.check_counts(plan, entries, &mut violations, &mut warnings);
        self.check_consecutive(entries, &mut warnings);
        check_clustering(plan, entries, &mut warnings);
        self.check_workload(catalog, entries, &mut warnings);

        debug!(
            entries = entries.len(),
            violations = violations.len(),
            warnings = warnings.len(),
            "Schedule validated"
        );
        ValidationReport::new(violations, warnings)
    }

    fn check_counts(
        &self,
        plan: &SessionPlan,
        entries: &[ScheduleEntry],
        violations: &mut Vec<Violation>,
        warnings: &mut Vec<Warning>,
    ) {
        let mut by_pair = group_by_pair(entries);

        for (subject_id, section_id, required) in plan.iter() {
            let held = by_pair.remove(&(subject_id, section_id)).unwrap_or_default();
            let count = held.len() as u32;

            for occurrence in count..required {
                let detail = format!(
                    "{subject_id} for {section_id}: session {} of {required} not scheduled",
                    occurrence + 1
                );
                match self.policy.shortfall {
                    ShortfallPolicy::Violation => violations.push(Violation::new(
                        ViolationKind::UnscheduledRequirement,
                        detail,
                        Vec::new(),
                    )),
                    ShortfallPolicy::Warning => {
                        warnings.push(Warning::new(WarningKind::SessionShortfall, detail, Vec::new()))
                    }
                }
            }
            if count > required {
                violations.push(Violation::new(
                    ViolationKind::ExcessSessions,
                    format!("{subject_id} for {section_id}: {count} sessions scheduled, {required} required"),
                    held,
                ));
            }
        }

        for ((subject_id, section_id), held) in by_pair {
            violations.push(Violation::new(
                ViolationKind::ExcessSessions,
                format!("{subject_id} is not required by section {section_id}"),
                held,
            ));
        }
    }

    fn check_consecutive(&self, entries: &[ScheduleEntry], warnings: &mut Vec<Warning>) {
        let limit = self.policy.max_consecutive_sessions as usize;

        for (faculty_id, mut held) in group_by(entries, |e| &e.faculty_id) {
            held.sort_by_key(|&i| (entries[i].day, entries[i].start, i));

            let mut run: Vec<usize> = Vec::new();
            for i in held {
                let extends = run.last().is_some_and(|&prev| {
                    entries[prev].day == entries[i].day && entries[prev].end == entries[i].start
                });
                if !extends {
                    flush_run(faculty_id, &run, entries, limit, warnings);
                    run.clear();
                }
                run.push(i);
            }
            flush_run(faculty_id, &run, entries, limit, warnings);
        }
    }

    fn check_workload(&self, catalog: &Catalog, entries: &[ScheduleEntry], warnings: &mut Vec<Warning>) {
        let by_faculty = group_by(entries, |e| &e.faculty_id);

        for faculty in catalog.all_faculty() {
            let Some(held) = by_faculty.get(faculty.id.as_str()) else {
                continue;
            };
            let minutes: u32 = held.iter().map(|&i| entries[i].duration_minutes()).sum();
            let (limit_hours, label) = match faculty.max_hours_per_week {
                Some(cap) => (cap, "weekly cap"),
                None => (self.policy.workload_warning_hours, "recommended load"),
            };
            if minutes > limit_hours.saturating_mul(60) {
                warnings.push(Warning::new(
                    WarningKind::WorkloadExceeded,
                    format!(
                        "Faculty {} scheduled for {:.1} h, above {label} of {limit_hours} h",
                        faculty.id,
                        f64::from(minutes) / 60.0
                    ),
                    held.clone(),
                ));
            }
        }
    }
}

/// Indices of entries grouped by a key, each group ascending.
fn group_by<'a>(
    entries: &'a [ScheduleEntry],
    key: impl Fn(&'a ScheduleEntry) -> &'a String,
) -> BTreeMap<&'a str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, e) in entries.iter().enumerate() {
        groups.entry(key(e).as_str()).or_default().push(i);
    }
    groups
}

fn group_by_pair(entries: &[ScheduleEntry]) -> BTreeMap<(&str, &str), Vec<usize>> {
    let mut groups: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (i, e) in entries.iter().enumerate() {
        groups
            .entry((e.subject_id.as_str(), e.section_id.as_str()))
            .or_default()
            .push(i);
    }
    groups
}

fn check_overlaps<'a>(
    entries: &'a [ScheduleEntry],
    key: impl Fn(&'a ScheduleEntry) -> &'a String,
    kind: ViolationKind,
    label: &str,
    violations: &mut Vec<Violation>,
) {
    for (id, held) in group_by(entries, key) {
        for (n, &a) in held.iter().enumerate() {
            for &b in &held[n + 1..] {
                if entries[a].overlaps(&entries[b]) {
                    violations.push(Violation::new(
                        kind,
                        format!(
                            "{label} {id} double-booked: {} ({}) overlaps {} ({})",
                            entries[a].slot(),
                            entries[a].subject_id,
                            entries[b].slot(),
                            entries[b].subject_id
                        ),
                        vec![a, b],
                    ));
                }
            }
        }
    }
}

fn check_capacity(catalog: &Catalog, i: usize, e: &ScheduleEntry, violations: &mut Vec<Violation>) {
    let room = catalog.classroom(&e.classroom_id);
    let section = catalog.section(&e.section_id);

    if room.is_none() {
        violations.push(Violation::new(
            ViolationKind::CapacityViolation,
            format!("Entry {i} references unknown classroom {}", e.classroom_id),
            vec![i],
        ));
    }
    if section.is_none() {
        violations.push(Violation::new(
            ViolationKind::CapacityViolation,
            format!("Entry {i} references unknown section {}", e.section_id),
            vec![i],
        ));
    }
    if let (Some(room), Some(section)) = (room, section) {
        if !room.fits(section.size) {
            violations.push(Violation::new(
                ViolationKind::CapacityViolation,
                format!(
                    "Classroom {} (capacity {}) is too small for section {} (size {}) at {}",
                    room.id,
                    room.capacity,
                    section.id,
                    section.size,
                    e.slot()
                ),
                vec![i],
            ));
        }
    }
}

fn check_qualification(catalog: &Catalog, i: usize, e: &ScheduleEntry, violations: &mut Vec<Violation>) {
    let subject = catalog.subject(&e.subject_id);
    let faculty = catalog.faculty(&e.faculty_id);

    if subject.is_none() {
        violations.push(Violation::new(
            ViolationKind::QualificationMismatch,
            format!("Entry {i} references unknown subject {}", e.subject_id),
            vec![i],
        ));
    }
    match faculty {
        None => violations.push(Violation::new(
            ViolationKind::QualificationMismatch,
            format!("Entry {i} references unknown faculty {}", e.faculty_id),
            vec![i],
        )),
        Some(f) if subject.is_some() && !f.can_teach(&e.subject_id) => {
            violations.push(Violation::new(
                ViolationKind::QualificationMismatch,
                format!("Faculty {} is not qualified to teach {}", f.id, e.subject_id),
                vec![i],
            ))
        }
        Some(_) => {}
    }
}

fn check_availability(catalog: &Catalog, i: usize, e: &ScheduleEntry, violations: &mut Vec<Violation>) {
    let slot = e.slot();
    if let Some(f) = catalog.faculty(&e.faculty_id).filter(|f| !f.is_available(&slot)) {
        violations.push(Violation::new(
            ViolationKind::AvailabilityConflict,
            format!("Faculty {} is unavailable at {slot} ({})", f.id, e.subject_id),
            vec![i],
        ));
    }
    if let Some(room) = catalog.classroom(&e.classroom_id).filter(|c| !c.is_available(&slot)) {
        violations.push(Violation::new(
            ViolationKind::AvailabilityConflict,
            format!("Classroom {} is unavailable at {slot} ({})", room.id, e.subject_id),
            vec![i],
        ));
    }
}

fn check_room_type(catalog: &Catalog, i: usize, e: &ScheduleEntry, warnings: &mut Vec<Warning>) {
    let (Some(subject), Some(room)) = (catalog.subject(&e.subject_id), catalog.classroom(&e.classroom_id)) else {
        return;
    };
    if let Some(wanted) = &subject.room_type {
        if !subject.accepts_room_type(&room.room_type) {
            warnings.push(Warning::new(
                WarningKind::RoomTypeMismatch,
                format!(
                    "{} needs a {wanted} but is held in {} ({})",
                    subject.id, room.id, room.room_type
                ),
                vec![i],
            ));
        }
    }
}

/// Pairs spread over fewer days than they could use.
///
/// A pair with `n` sessions could use `min(n, days in the schedule)` days.
fn check_clustering(plan: &SessionPlan, entries: &[ScheduleEntry], warnings: &mut Vec<Warning>) {
    let schedule_days: BTreeSet<Day> = entries.iter().map(|e| e.day).collect();
    let by_pair = group_by_pair(entries);

    for (subject_id, section_id, _) in plan.iter() {
        let Some(held) = by_pair.get(&(subject_id, section_id)) else {
            continue;
        };
        if held.len() < 2 {
            continue;
        }
        let days: BTreeSet<Day> = held.iter().map(|&i| entries[i].day).collect();
        let possible = held.len().min(schedule_days.len());
        if days.len() < possible {
            warnings.push(Warning::new(
                WarningKind::SubjectClustering,
                format!(
                    "{subject_id} for {section_id}: {} sessions on {} day(s), {possible} possible",
                    held.len(),
                    days.len()
                ),
                held.clone(),
            ));
        }
    }
}

fn flush_run(
    faculty_id: &str,
    run: &[usize],
    entries: &[ScheduleEntry],
    limit: usize,
    warnings: &mut Vec<Warning>,
) {
    if run.len() <= limit {
        return;
    }
    let (Some(&first), Some(&last)) = (run.first(), run.last()) else {
        return;
    };
    warnings.push(Warning::new(
        WarningKind::ConsecutiveSessions,
        format!(
            "Faculty {faculty_id} teaches {} back-to-back sessions on {} from {} to {}",
            run.len(),
            entries[first].day,
            entries[first].start.format("%H:%M"),
            entries[last].end.format("%H:%M")
        ),
        run.to_vec(),
    ));
}
