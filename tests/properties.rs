//! Property tests over random catalogs.

use chrono::NaiveTime;
use proptest::prelude::*;
use u_timetable::constraints::ConstraintValidator;
use u_timetable::models::{Classroom, Day, EntitySet, Faculty, Section, Subject, ViolationKind};
use u_timetable::pipeline::{GenerationRequest, Pipeline, RefinementRequest};
use u_timetable::refinement::{Delta, RepairMode};
use u_timetable::slots::WeeklyWindow;

const HARD_PLACEMENT_KINDS: [ViolationKind; 6] = [
    ViolationKind::FacultyConflict,
    ViolationKind::ClassroomConflict,
    ViolationKind::SectionConflict,
    ViolationKind::CapacityViolation,
    ViolationKind::QualificationMismatch,
    ViolationKind::ExcessSessions,
];

fn subject_id(i: usize) -> String {
    format!("SUB{i}")
}

fn picked(mask: u8, n: usize) -> impl Iterator<Item = String> {
    (0..n).filter(move |i| mask & (1 << i) != 0).map(subject_id)
}

fn build(
    faculty: Vec<(u8, Option<u32>)>,
    subjects: Vec<(u32, bool)>,
    rooms: Vec<u32>,
    sections: Vec<(u32, u8)>,
    days: usize,
    hours: u32,
) -> GenerationRequest {
    let n = subjects.len();
    let mut entities = EntitySet::new();
    for (i, (mask, cap)) in faculty.into_iter().enumerate() {
        let mut f = Faculty::new(format!("F{i}")).with_subjects(picked(mask, n));
        if let Some(cap) = cap {
            f = f.with_max_hours(cap);
        }
        entities = entities.with_faculty(f);
    }
    for (i, (sessions, double)) in subjects.into_iter().enumerate() {
        let mut s = Subject::new(subject_id(i), sessions);
        if double {
            s = s.with_session_minutes(120);
        }
        entities = entities.with_subject(s);
    }
    for (i, capacity) in rooms.into_iter().enumerate() {
        entities = entities.with_classroom(Classroom::new(format!("R{i}"), capacity));
    }
    for (i, (size, mask)) in sections.into_iter().enumerate() {
        let mut s = Section::new(format!("S{i}"), size);
        for id in picked(mask, n) {
            s = s.with_subject(id);
        }
        entities = entities.with_section(s);
    }

    let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let end = NaiveTime::from_hms_opt(9 + hours, 0, 0).unwrap();
    GenerationRequest::new(entities, WeeklyWindow::new(Day::WEEKDAYS[..days].to_vec(), start, end, 60))
}

fn arb_request() -> impl Strategy<Value = GenerationRequest> {
    (1usize..=4, 1usize..=4, 1usize..=3, 1usize..=3, 1usize..=5, 2u32..=5)
        .prop_flat_map(|(nf, ns, nr, nsec, days, hours)| {
            (
                prop::collection::vec((0u8..16, prop::option::weighted(0.2, 1u32..=6)), nf),
                prop::collection::vec((1u32..=3, prop::bool::weighted(0.2)), ns),
                prop::collection::vec(10u32..=60, nr),
                prop::collection::vec((10u32..=50, 0u8..16), nsec),
                Just(days),
                Just(hours),
            )
        })
        .prop_map(|(faculty, subjects, rooms, sections, days, hours)| {
            build(faculty, subjects, rooms, sections, days, hours)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scheduler_output_never_breaks_placement_rules(request in arb_request()) {
        let outcome = Pipeline::new().generate(&request).unwrap();
        let report = &outcome.response.validation;

        for kind in HARD_PLACEMENT_KINDS {
            prop_assert!(report.violations_of(kind).is_empty(), "{:?}: {:?}", kind, report.violations);
        }
        let complete = outcome.response.schedule.len() as u32 == outcome.kpi.required_sessions;
        prop_assert_eq!(report.satisfied, complete);
    }

    #[test]
    fn satisfied_schedules_have_no_overlaps(request in arb_request()) {
        let outcome = Pipeline::new().generate(&request).unwrap();
        prop_assume!(outcome.response.validation.satisfied);

        let entries = &outcome.response.schedule.entries;
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.overlaps(b) {
                    prop_assert_ne!(&a.faculty_id, &b.faculty_id);
                    prop_assert_ne!(&a.classroom_id, &b.classroom_id);
                    prop_assert_ne!(&a.section_id, &b.section_id);
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic(request in arb_request()) {
        let first = Pipeline::new().generate(&request).unwrap();
        let second = Pipeline::new().generate(&request).unwrap();
        prop_assert_eq!(first.response, second.response);
        prop_assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn validation_is_idempotent(request in arb_request()) {
        let outcome = Pipeline::new().generate(&request).unwrap();
        let catalog = request.catalog().unwrap();
        let plan = request.plan(&catalog).unwrap();
        let validator = ConstraintValidator::new();

        let again = validator.validate(&catalog, &plan, &outcome.response.schedule);
        prop_assert_eq!(&again, &outcome.response.validation);
        prop_assert_eq!(again, validator.validate(&catalog, &plan, &outcome.response.schedule));
    }

    #[test]
    fn local_repair_keeps_every_prior_entry(request in arb_request()) {
        let pipeline = Pipeline::new();
        let prior = pipeline.generate(&request).unwrap().response.schedule;
        let catalog = request.catalog().unwrap();
        let plan = request.plan(&catalog).unwrap();
        let first_pair = plan.iter().next().map(|(s, sec, _)| (s.to_string(), sec.to_string()));
        prop_assume!(first_pair.is_some());
        let (subject_id, section_id) = first_pair.unwrap();

        let outcome = pipeline
            .refine(&RefinementRequest {
                request: request.clone(),
                prior: prior.clone(),
                delta: Delta::AddSession { subject_id, section_id },
            })
            .unwrap();

        if outcome.mode == RepairMode::LocalRepair {
            for e in &prior.entries {
                prop_assert!(outcome.response.schedule.entries.contains(e));
            }
            prop_assert_eq!(outcome.response.schedule.len() as u32, outcome.kpi.required_sessions);
        }
    }
}
