//! Local repair of a prior timetable.
//!
//! # Algorithm
//!
//! 1. Apply the delta to the request and rebuild catalog, session plan, and
//!    slot grid from the result.
//! 2. Walk prior entries chronologically. An entry is
//!    - released when the delta names it, or it no longer fits the new
//!      catalog or grid, or it clashes with an entry already kept;
//!    - dropped when its pair is out of scope or already has every session
//!      it needs (the latest sessions go first);
//!    - kept otherwise.
//! 3. Schedule the missing sessions of each pair with the kept entries as
//!    fixed bookings, under the backtrack budget of a full run.
//! 4. If anything is left unplaced, regenerate from scratch instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::delta::{Delta, Pin};
use crate::config::SearchSettings;
use crate::error::ConfigError;
use crate::models::{Catalog, Schedule, ScheduleEntry};
use crate::pipeline::GenerationRequest;
use crate::scheduler::{Requirement, Scheduler, SearchStats, SessionPlan};
use crate::slots::{generate_slots, SlotGrid};

/// How a refinement result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// Kept entries untouched, placed only what was missing.
    LocalRepair,
    /// Discarded the prior schedule and scheduled everything again.
    FullRegeneration,
}

/// Result of repairing a prior schedule.
#[derive(Debug, Clone)]
pub struct Repair {
    /// The request after the delta.
    pub request: GenerationRequest,
    pub catalog: Catalog,
    pub plan: SessionPlan,
    pub grid: SlotGrid,
    /// Full schedule, canonical order.
    pub schedule: Schedule,
    pub mode: RepairMode,
    /// Prior entries kept, released, and dropped.
    pub retained: usize,
    pub released: usize,
    pub dropped: usize,
    /// Counters of the scheduler run that produced `schedule`.
    pub stats: SearchStats,
}

/// Applies deltas to prior schedules.
#[derive(Debug, Clone, Default)]
pub struct RefinementEngine {
    settings: SearchSettings,
}

/// Prior entries sorted into kept, released, and dropped.
#[derive(Debug, Default)]
struct Triage {
    retained: Vec<ScheduleEntry>,
    kept_per_pair: BTreeMap<(String, String), u32>,
    released: usize,
    dropped: usize,
}

impl RefinementEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search settings used for both repair and fallback.
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Applies `delta` to `request` and repairs `prior` accordingly.
    ///
    /// # Errors
    /// Any [`ConfigError`] raised by the delta or by the updated request.
    pub fn repair(&self, request: &GenerationRequest, prior: &Schedule, delta: &Delta) -> Result<Repair, ConfigError> {
        let next = delta.apply(request, prior)?;
        let catalog = next.catalog()?;
        let plan = next.plan(&catalog)?;
        let grid = generate_slots(&next.window)?;
        let pin = delta.pin(prior);

        let triage = triage(&catalog, &plan, &grid, prior, pin.as_ref());
        debug!(
            delta = delta.label(),
            retained = triage.retained.len(),
            released = triage.released,
            dropped = triage.dropped,
            "Classified prior entries"
        );

        let scheduler = Scheduler::new()
            .with_settings(self.settings)
            .with_budget_basis(plan.total() as usize);
        let requirements = pinned(missing_requirements(&plan, &triage.kept_per_pair), prior, pin.as_ref());
        let local = scheduler.assign(&catalog, &grid, &requirements, &triage.retained);

        let (schedule, mode, stats) = if local.is_complete() {
            let mut entries = triage.retained.clone();
            entries.extend(local.schedule.entries);
            (
                Schedule::from_entries(entries).into_canonical(),
                RepairMode::LocalRepair,
                local.stats,
            )
        } else {
            warn!(
                delta = delta.label(),
                unassigned = local.unassigned.len(),
                "Local repair incomplete; regenerating the full schedule"
            );
            let everything = pinned(plan.requirements(), prior, pin.as_ref());
            let full = scheduler.assign(&catalog, &grid, &everything, &[]);
            (full.schedule, RepairMode::FullRegeneration, full.stats)
        };

        Ok(Repair {
            request: next,
            catalog,
            plan,
            grid,
            schedule,
            mode,
            retained: triage.retained.len(),
            released: triage.released,
            dropped: triage.dropped,
            stats,
        })
    }
}

fn triage(catalog: &Catalog, plan: &SessionPlan, grid: &SlotGrid, prior: &Schedule, pin: Option<&Pin>) -> Triage {
    let mut order: Vec<usize> = (0..prior.len()).collect();
    order.sort_by_key(|&i| (prior.entries[i].day, prior.entries[i].start, i));

    let mut t = Triage::default();
    let mut faculty_minutes: BTreeMap<&str, u32> = BTreeMap::new();

    for i in order {
        let e = &prior.entries[i];
        if pin.is_some_and(|p| p.entry == i) {
            t.released += 1;
            continue;
        }
        let required = plan.required(&e.subject_id, &e.section_id);
        let key = (e.subject_id.clone(), e.section_id.clone());
        let kept = t.kept_per_pair.get(&key).copied().unwrap_or(0);
        if kept >= required {
            t.dropped += 1;
            continue;
        }
        if !still_fits(catalog, grid, e) || t.retained.iter().any(|r| clashes(r, e)) {
            t.released += 1;
            continue;
        }
        let minutes = faculty_minutes.entry(e.faculty_id.as_str()).or_insert(0);
        let cap = catalog
            .faculty(&e.faculty_id)
            .and_then(|f| f.max_minutes_per_week());
        if cap.is_some_and(|cap| *minutes + e.duration_minutes() > cap) {
            t.released += 1;
            continue;
        }
        *minutes += e.duration_minutes();
        t.kept_per_pair.insert(key, kept + 1);
        t.retained.push(e.clone());
    }
    t
}

/// Whether a prior entry is still a legal placement under the new catalog
/// and grid.
fn still_fits(catalog: &Catalog, grid: &SlotGrid, e: &ScheduleEntry) -> bool {
    let (Some(subject), Some(faculty), Some(room), Some(section)) = (
        catalog.subject(&e.subject_id),
        catalog.faculty(&e.faculty_id),
        catalog.classroom(&e.classroom_id),
        catalog.section(&e.section_id),
    ) else {
        return false;
    };
    let span_ok = grid
        .aligned_span(e)
        .is_some_and(|span| span.len() == subject.span_slots(grid.slot_minutes()));

    let slot = e.slot();

    span_ok
        && faculty.can_teach(&subject.id)
        && room.fits(section.size)
        && subject.accepts_room_type(&room.room_type)
        && faculty.is_available(&slot)
        && room.is_available(&slot)
}

fn clashes(a: &ScheduleEntry, b: &ScheduleEntry) -> bool {
    a.overlaps(b)
        && (a.faculty_id == b.faculty_id || a.classroom_id == b.classroom_id || a.section_id == b.section_id)
}

/// Requirements for the sessions each pair still lacks. Occurrence indices
/// continue after the kept ones.
fn missing_requirements(plan: &SessionPlan, kept: &BTreeMap<(String, String), u32>) -> Vec<Requirement> {
    plan.iter()
        .flat_map(|(subject_id, section_id, required)| {
            let have = kept
                .get(&(subject_id.to_string(), section_id.to_string()))
                .copied()
                .unwrap_or(0);
            (have..required).map(move |k| Requirement::new(subject_id, section_id, k))
        })
        .collect()
}

/// Carries a replacement restriction onto the first requirement of the
/// released entry's pair.
fn pinned(mut requirements: Vec<Requirement>, prior: &Schedule, pin: Option<&Pin>) -> Vec<Requirement> {
    let Some((pin, old)) = pin.and_then(|p| Some((p, prior.entries.get(p.entry)?))) else {
        return requirements;
    };
    if let Some(req) = requirements
        .iter_mut()
        .find(|r| old.is_pair(&r.subject_id, &r.section_id))
    {
        req.faculty_rule = pin.faculty_rule.clone();
        req.classroom_rule = pin.classroom_rule.clone();
    }
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintValidator;
    use crate::models::{Classroom, Day, EntitySet, Faculty, Section, Subject, TimeSlot, ViolationKind};
    use crate::slots::WeeklyWindow;
    use chrono::NaiveTime;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            EntitySet::new()
                .with_faculty(Faculty::new("F1").with_subjects(["MATH", "PHY"]))
                .with_faculty(Faculty::new("F2").with_subjects(["MATH", "PHY"]))
                .with_subject(Subject::new("MATH", 2))
                .with_subject(Subject::new("PHY", 2))
                .with_classroom(Classroom::new("R1", 40))
                .with_classroom(Classroom::new("R2", 40))
                .with_section(Section::new("S1", 30).with_subject("MATH").with_subject("PHY"))
                .with_section(Section::new("S2", 30).with_subject("PHY")),
            WeeklyWindow::new(vec![Day::Monday, Day::Tuesday, Day::Wednesday], t(9), t(12), 60),
        )
    }

    fn generated(request: &GenerationRequest) -> Schedule {
        let catalog = request.catalog().unwrap();
        let plan = request.plan(&catalog).unwrap();
        let grid = generate_slots(&request.window).unwrap();
        Scheduler::new()
            .assign(&catalog, &grid, &plan.requirements(), &[])
            .schedule
    }

    fn satisfied(repair: &Repair) -> bool {
        ConstraintValidator::new()
            .validate(&repair.catalog, &repair.plan, &repair.schedule)
            .satisfied
    }

    #[test]
    fn test_add_session_keeps_prior_entries() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::AddSession {
            subject_id: "PHY".into(),
            section_id: "S2".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!(repair.schedule.len(), prior.len() + 1);
        assert_eq!(repair.retained, prior.len());
        for e in &prior.entries {
            assert!(repair.schedule.entries.contains(e));
        }
        assert_eq!(repair.schedule.count_for_pair("PHY", "S2"), 3);
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_remove_session_drops_latest() {
        let request = request();
        let prior = generated(&request);
        let latest = prior
            .entries
            .iter()
            .filter(|e| e.is_pair("MATH", "S1"))
            .max_by_key(|e| (e.day, e.start))
            .cloned()
            .unwrap();
        let delta = Delta::RemoveSession {
            subject_id: "MATH".into(),
            section_id: "S1".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!(repair.dropped, 1);
        assert_eq!(repair.schedule.len(), prior.len() - 1);
        assert!(!repair.schedule.entries.contains(&latest));
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_replace_faculty_moves_only_that_entry() {
        let request = request();
        let prior = generated(&request);
        let target = prior.entries[0].clone();
        let delta = Delta::ReplaceFaculty {
            entry: 0,
            faculty_id: None,
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!(repair.released, 1);
        assert!(!repair.schedule.entries.contains(&target));
        for e in &prior.entries[1..] {
            assert!(repair.schedule.entries.contains(e));
        }
        let moved: Vec<_> = repair
            .schedule
            .entries
            .iter()
            .filter(|e| e.is_pair(&target.subject_id, &target.section_id) && !prior.entries.contains(e))
            .collect();
        assert_eq!(moved.len(), 1);
        assert_ne!(moved[0].faculty_id, target.faculty_id);
    }

    #[test]
    fn test_narrower_window_releases_outside_entries() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::ChangeWindow {
            working_days: vec![Day::Monday, Day::Tuesday, Day::Wednesday, Day::Thursday],
            day_start: t(9),
            day_end: t(10),
            slot_minutes: 60,
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!(repair.released, 2);
        assert!(repair.schedule.entries.iter().all(|e| e.end <= t(10)));
        assert_eq!(repair.schedule.len(), prior.len());
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_falls_back_to_full_regeneration() {
        // Only F1 teaches A. The prior gives F1 the 09:00 slot for B, so a
        // second A session cannot be added around the kept entries.
        let request = GenerationRequest::new(
            EntitySet::new()
                .with_faculty(Faculty::new("F1").with_subjects(["A", "B"]))
                .with_faculty(Faculty::new("F2").with_subject("B"))
                .with_subject(Subject::new("A", 1))
                .with_subject(Subject::new("B", 1))
                .with_classroom(Classroom::new("R1", 40))
                .with_classroom(Classroom::new("R2", 40))
                .with_section(Section::new("S1", 30).with_subject("A"))
                .with_section(Section::new("S2", 30).with_subject("B")),
            WeeklyWindow::new(vec![Day::Monday], t(9), t(11), 60),
        );
        let prior = Schedule::from_entries(vec![
            ScheduleEntry::new(TimeSlot::new(Day::Monday, t(9), t(10)), "B", "F1", "R1", "S2"),
            ScheduleEntry::new(TimeSlot::new(Day::Monday, t(10), t(11)), "A", "F1", "R1", "S1"),
        ]);
        let delta = Delta::AddSession {
            subject_id: "A".into(),
            section_id: "S1".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::FullRegeneration);
        assert_eq!(repair.schedule.len(), 3);
        assert!(satisfied(&repair));
        let b = repair.schedule.entries.iter().find(|e| e.subject_id == "B").unwrap();
        assert_eq!(b.faculty_id, "F2");
    }

    fn entries_of<'a>(schedule: &'a Schedule, section_id: &str) -> Vec<&'a ScheduleEntry> {
        schedule.entries.iter().filter(|e| e.section_id == section_id).collect()
    }

    #[test]
    fn test_grown_section_moves_to_larger_room() {
        let mut request = request();
        request.entities.classrooms.push(Classroom::new("R3", 60));
        let prior = generated(&request);
        assert!(entries_of(&prior, "S1").iter().all(|e| e.classroom_id == "R1"));

        let delta = Delta::UpsertSection(Section::new("S1", 50).with_subject("MATH").with_subject("PHY"));
        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();

        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!((repair.retained, repair.released, repair.dropped), (2, 4, 0));
        for e in entries_of(&prior, "S2") {
            assert!(repair.schedule.entries.contains(e));
        }
        let s1 = entries_of(&repair.schedule, "S1");
        assert_eq!(s1.len(), 4);
        assert!(s1.iter().all(|e| e.classroom_id == "R3"));
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_remove_subject_drops_only_its_entries() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::RemoveSubject {
            subject_id: "MATH".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!((repair.retained, repair.released, repair.dropped), (4, 0, 2));
        for e in prior.entries.iter().filter(|e| e.subject_id == "PHY") {
            assert!(repair.schedule.entries.contains(e));
        }
        assert!(repair.schedule.entries.iter().all(|e| e.subject_id == "PHY"));
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_remove_section_drops_its_entries() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::RemoveSection {
            section_id: "S2".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!((repair.retained, repair.released, repair.dropped), (4, 0, 2));
        assert!(entries_of(&repair.schedule, "S2").is_empty());
        assert_eq!(repair.schedule.len(), 4);
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_unsatisfiable_room_type_falls_back() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::UpsertSubject(Subject::new("PHY", 2).with_room_type("lab"));

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::FullRegeneration);
        assert_eq!((repair.retained, repair.released, repair.dropped), (2, 4, 0));
        assert!(repair.schedule.entries.iter().all(|e| e.subject_id == "MATH"));

        let report = ConstraintValidator::new().validate(&repair.catalog, &repair.plan, &repair.schedule);
        assert!(!report.satisfied);
        assert_eq!(report.violations_of(ViolationKind::UnscheduledRequirement).len(), 4);
    }

    #[test]
    fn test_replace_classroom_pins_new_room() {
        let request = request();
        let prior = generated(&request);
        let entry = prior
            .entries
            .iter()
            .position(|e| e.classroom_id == "R1")
            .unwrap();
        let target = prior.entries[entry].clone();
        let delta = Delta::ReplaceClassroom {
            entry,
            classroom_id: Some("R2".into()),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!((repair.retained, repair.released, repair.dropped), (5, 1, 0));
        assert!(!repair.schedule.entries.contains(&target));
        let moved: Vec<_> = repair
            .schedule
            .entries
            .iter()
            .filter(|e| !prior.entries.contains(e))
            .collect();
        assert_eq!(moved.len(), 1);
        assert!(moved[0].is_pair(&target.subject_id, &target.section_id));
        assert_eq!(moved[0].classroom_id, "R2");
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_entries_in_unavailable_periods_are_released() {
        let unblocked = request();
        let prior = generated(&unblocked);
        let mut request = unblocked.clone();
        request.entities.faculty[0] = request.entities.faculty[0]
            .clone()
            .with_unavailable(TimeSlot::new(Day::Monday, t(9), t(10)));
        let delta = Delta::RemoveSession {
            subject_id: "PHY".into(),
            section_id: "S2".into(),
        };

        let repair = RefinementEngine::new().repair(&request, &prior, &delta).unwrap();
        assert_eq!(repair.mode, RepairMode::LocalRepair);
        assert_eq!((repair.retained, repair.released, repair.dropped), (4, 1, 1));
        assert!(!repair
            .schedule
            .entries
            .iter()
            .any(|e| e.faculty_id == "F1" && e.day == Day::Monday && e.start == t(9)));
        assert_eq!(repair.schedule.count_for_pair("MATH", "S1"), 2);
        assert!(satisfied(&repair));
    }

    #[test]
    fn test_unknown_reference_fails_fast() {
        let request = request();
        let prior = generated(&request);
        let delta = Delta::RemoveSubject {
            subject_id: "BIO".into(),
        };
        let err = RefinementEngine::new().repair(&request, &prior, &delta).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownReference { .. }));
    }
}
