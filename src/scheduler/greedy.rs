//! Deterministic greedy scheduler with bounded backtracking.
//!
//! # Algorithm
//!
//! 1. Order requirements most-constrained-first: ascending by
//!    (qualified faculty × fitting rooms), ties by (subject, section,
//!    occurrence).
//! 2. For each requirement walk the grid in order (with day spreading on,
//!    days the pair has not used yet come first); at each start slot try
//!    faculty then rooms in ascending ID order, skipping anything already
//!    booked, over its weekly cap, or clashing with the section.
//! 3. Accept the first feasible (slot, faculty, room).
//! 4. On failure, undo the most recent placement that competes for the same
//!    faculty pool, room pool, or section, exclude its old choice, and retry.
//!    The undone requirement is re-queued next. Backtracks and candidate
//!    checks are both capped; past either cap requirements are left
//!    unassigned instead of searched.
//!
//! Every collection walked here is ordered, so identical input always
//! yields an identical result.
//!
//! # Complexity
//! O(r × s × f × c) per pass where r=requirements, s=slots, f=faculty,
//! c=classrooms, bounded overall by `max_placement_attempts`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bookings::{Bookings, Choice, Placement};
use super::requirement::Requirement;
use crate::config::SearchSettings;
use crate::models::{Catalog, Day, Schedule, ScheduleEntry};
use crate::slots::SlotGrid;

/// Counters describing one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Candidate (slot, faculty, room) combinations examined.
    pub attempts: usize,
    /// Placements undone to make room for a failing requirement.
    pub backtracks: usize,
    /// Whether the candidate-check ceiling was reached.
    pub attempts_exhausted: bool,
    /// Whether the backtrack budget was used up.
    pub backtracks_exhausted: bool,
}

/// Output of one scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Newly placed entries, canonical order. Fixed entries are not included.
    pub schedule: Schedule,
    /// Requirements that could not be placed, in (subject, section,
    /// occurrence) order.
    pub unassigned: Vec<Requirement>,
    pub stats: SearchStats,
}

impl SearchResult {
    /// Whether every requirement was placed.
    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }
}

/// Greedy timetable scheduler.
///
/// # Example
///
/// ```
/// use chrono::NaiveTime;
/// use u_timetable::models::{Catalog, Classroom, EntitySet, Faculty, Section, Subject};
/// use u_timetable::scheduler::{Scheduler, SessionPlan};
/// use u_timetable::slots::{generate_slots, WeeklyWindow};
///
/// let catalog = Catalog::new(
///     &EntitySet::new()
///         .with_faculty(Faculty::new("F1").with_subject("MATH"))
///         .with_subject(Subject::new("MATH", 2))
///         .with_classroom(Classroom::new("R1", 40))
///         .with_section(Section::new("S1", 30).with_subject("MATH")),
/// )
/// .unwrap();
/// let grid = generate_slots(&WeeklyWindow::weekdays(
///     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
///     NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
///     60,
/// ))
/// .unwrap();
/// let requirements = SessionPlan::from_catalog(&catalog).requirements();
///
/// let result = Scheduler::new().assign(&catalog, &grid, &requirements, &[]);
/// assert_eq!(result.schedule.len(), 2);
/// assert!(result.is_complete());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    settings: SearchSettings,
    budget_basis: Option<usize>,
}

/// Faculty and room pools a requirement draws from.
struct Pools {
    faculty: BTreeSet<String>,
    rooms: BTreeSet<String>,
}

/// Mutable search state for one run.
struct Search<'a> {
    catalog: &'a Catalog,
    grid: &'a SlotGrid,
    requirements: &'a [Requirement],
    pools: Vec<Pools>,
    exclusions: Vec<BTreeSet<Choice>>,
    bookings: Bookings,
    placed: Vec<Placement>,
    stats: SearchStats,
    attempt_limit: usize,
    backtrack_budget: usize,
    max_depth: usize,
    spread_days: bool,
    fixed_days: BTreeMap<(String, String), BTreeSet<Day>>,
}

impl Scheduler {
    /// Creates a scheduler with default search settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search settings.
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sizes the backtrack budget for `requirements` units of work instead
    /// of the number of requirements passed to [`assign`](Self::assign).
    ///
    /// A repair that places a handful of sessions around a kept timetable
    /// gets the budget of the whole timetable.
    pub fn with_budget_basis(mut self, requirements: usize) -> Self {
        self.budget_basis = Some(requirements);
        self
    }

    /// Places `requirements` on `grid`.
    ///
    /// `fixed` entries are treated as existing bookings: nothing new may
    /// overlap them on the same faculty, classroom, or section. They are not
    /// part of the returned schedule.
    pub fn assign(
        &self,
        catalog: &Catalog,
        grid: &SlotGrid,
        requirements: &[Requirement],
        fixed: &[ScheduleEntry],
    ) -> SearchResult {
        let mut search = Search {
            catalog,
            grid,
            requirements,
            pools: requirements.iter().map(|r| pools_for(catalog, r)).collect(),
            exclusions: vec![BTreeSet::new(); requirements.len()],
            bookings: Bookings::with_fixed(catalog, grid, fixed),
            placed: Vec::new(),
            stats: SearchStats::default(),
            attempt_limit: self.settings.max_placement_attempts,
            backtrack_budget: self
                .settings
                .backtrack_budget(self.budget_basis.unwrap_or(requirements.len())),
            max_depth: self.settings.max_backtrack_depth,
            spread_days: self.settings.spread_days,
            fixed_days: fixed_days(fixed),
        };

        let mut pending: VecDeque<usize> = search.constrainedness_order().into();
        let mut unassigned = Vec::new();

        while let Some(idx) = pending.pop_front() {
            if search.stats.attempts_exhausted {
                unassigned.push(idx);
                continue;
            }
            if let Some(p) = search.find_placement(idx) {
                search.commit(p);
                continue;
            }
            match search.backtrack(idx) {
                Some(requeued) => pending.push_front(requeued),
                None => unassigned.push(idx),
            }
        }

        if search.stats.attempts_exhausted {
            warn!(
                attempts = search.stats.attempts,
                "Placement attempt ceiling reached; remaining requirements left unassigned"
            );
        }
        if search.stats.backtracks_exhausted {
            warn!(backtracks = search.stats.backtracks, "Backtrack budget exhausted");
        }

        let entries = search
            .placed
            .iter()
            .filter_map(|p| search.to_entry(p))
            .collect();
        let mut unassigned: Vec<Requirement> =
            unassigned.into_iter().map(|i| requirements[i].clone()).collect();
        unassigned.sort();

        info!(
            placed = search.placed.len(),
            unassigned = unassigned.len(),
            backtracks = search.stats.backtracks,
            "Scheduler finished"
        );

        SearchResult {
            schedule: Schedule::from_entries(entries).into_canonical(),
            unassigned,
            stats: search.stats,
        }
    }
}

fn fixed_days(fixed: &[ScheduleEntry]) -> BTreeMap<(String, String), BTreeSet<Day>> {
    let mut days: BTreeMap<_, BTreeSet<Day>> = BTreeMap::new();
    for e in fixed {
        days.entry((e.subject_id.clone(), e.section_id.clone()))
            .or_default()
            .insert(e.day);
    }
    days
}

fn pools_for(catalog: &Catalog, req: &Requirement) -> Pools {
    let faculty = catalog
        .qualified_faculty(&req.subject_id)
        .into_iter()
        .filter(|f| req.allows_faculty(&f.id))
        .map(|f| f.id.clone())
        .collect();
    let rooms = match (catalog.subject(&req.subject_id), catalog.section(&req.section_id)) {
        (Some(subject), Some(section)) => catalog
            .fitting_rooms(subject, section)
            .into_iter()
            .filter(|c| req.allows_classroom(&c.id))
            .map(|c| c.id.clone())
            .collect(),
        _ => BTreeSet::new(),
    };
    Pools { faculty, rooms }
}

impl Search<'_> {
    /// Requirement indices, most constrained first.
    fn constrainedness_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.requirements.len()).collect();
        order.sort_by(|&a, &b| {
            let pa = &self.pools[a];
            let pb = &self.pools[b];
            let ka = pa.faculty.len() * pa.rooms.len();
            let kb = pb.faculty.len() * pb.rooms.len();
            ka.cmp(&kb)
                .then_with(|| self.requirements[a].tie_key().cmp(&self.requirements[b].tie_key()))
        });
        order
    }

    /// First feasible placement for a requirement, if any.
    ///
    /// With day spreading on, start slots on days the pair has not used yet
    /// come first; the remaining slots follow in grid order.
    fn find_placement(&mut self, idx: usize) -> Option<Placement> {
        let used = if self.spread_days {
            self.days_used(idx)
        } else {
            BTreeSet::new()
        };
        let (fresh, reused): (Vec<usize>, Vec<usize>) = (0..self.grid.len())
            .partition(|&i| self.grid.get(i).map_or(true, |slot| !used.contains(&slot.day)));

        for first in fresh.into_iter().chain(reused) {
            if self.stats.attempts_exhausted {
                return None;
            }
            if let Some(p) = self.try_start(idx, first) {
                return Some(p);
            }
        }
        None
    }

    /// Days already holding a session of the requirement's pair.
    fn days_used(&self, idx: usize) -> BTreeSet<Day> {
        let req = &self.requirements[idx];
        let key = (req.subject_id.clone(), req.section_id.clone());
        let mut days = self.fixed_days.get(&key).cloned().unwrap_or_default();
        for p in &self.placed {
            let other = &self.requirements[p.requirement];
            if other.subject_id == req.subject_id && other.section_id == req.section_id {
                if let Some(slot) = self.grid.get(p.span.start) {
                    days.insert(slot.day);
                }
            }
        }
        days
    }

    /// First feasible (faculty, room) for a span starting at `first`.
    fn try_start(&mut self, idx: usize, first: usize) -> Option<Placement> {
        let req = &self.requirements[idx];
        let subject = self.catalog.subject(&req.subject_id)?;
        let section_id = req.section_id.as_str();
        let span = self.grid.span(first, subject.span_slots(self.grid.slot_minutes()))?;
        let minutes = self.grid.span_slot(&span)?.duration_minutes();
        let pools = &self.pools[idx];

        if !self.bookings.section_free(section_id, &span) {
            return None;
        }
        for faculty_id in &pools.faculty {
            if !self.bookings.faculty_free(faculty_id, &span) {
                continue;
            }
            let cap = self
                .catalog
                .faculty(faculty_id)
                .and_then(|f| f.max_minutes_per_week());
            if cap.is_some_and(|cap| self.bookings.faculty_minutes(faculty_id) + minutes > cap) {
                continue;
            }
            for room_id in &pools.rooms {
                if self.stats.attempts >= self.attempt_limit {
                    self.stats.attempts_exhausted = true;
                    return None;
                }
                self.stats.attempts += 1;

                if !self.bookings.classroom_free(room_id, &span) {
                    continue;
                }
                let choice = (first, faculty_id.clone(), room_id.clone());
                if self.exclusions[idx].contains(&choice) {
                    continue;
                }
                return Some(Placement {
                    requirement: idx,
                    span,
                    faculty_id: faculty_id.clone(),
                    classroom_id: room_id.clone(),
                    section_id: section_id.to_string(),
                    minutes,
                });
            }
        }
        None
    }

    fn commit(&mut self, p: Placement) {
        self.bookings.book(&p);
        self.placed.push(p);
    }

    /// Whether two requirements draw on a common faculty member, room, or
    /// section.
    fn competes(&self, a: usize, b: usize) -> bool {
        let (pa, pb) = (&self.pools[a], &self.pools[b]);
        self.requirements[a].section_id == self.requirements[b].section_id
            || !pa.faculty.is_disjoint(&pb.faculty)
            || !pa.rooms.is_disjoint(&pb.rooms)
    }

    /// Frees room for `idx` by undoing a competing placement.
    ///
    /// On success `idx` is placed and the undone requirement is returned to
    /// be retried next. On failure every undo is reverted.
    fn backtrack(&mut self, idx: usize) -> Option<usize> {
        let candidates: Vec<usize> = (0..self.placed.len())
            .rev()
            .filter(|&pos| self.competes(idx, self.placed[pos].requirement))
            .take(self.max_depth)
            .collect();

        for pos in candidates {
            if self.stats.backtracks >= self.backtrack_budget {
                self.stats.backtracks_exhausted = true;
                return None;
            }
            if self.stats.attempts_exhausted {
                return None;
            }
            self.stats.backtracks += 1;

            let victim = self.placed.remove(pos);
            self.bookings.release(&victim);
            let choice = victim.choice();
            let newly_excluded = self.exclusions[victim.requirement].insert(choice.clone());

            if let Some(p) = self.find_placement(idx) {
                debug!(
                    placed = %self.requirements[idx],
                    undone = %self.requirements[victim.requirement],
                    "Backtracked to free a slot"
                );
                self.commit(p);
                return Some(victim.requirement);
            }

            if newly_excluded {
                self.exclusions[victim.requirement].remove(&choice);
            }
            self.bookings.book(&victim);
            self.placed.insert(pos, victim);
        }
        None
    }

    fn to_entry(&self, p: &Placement) -> Option<ScheduleEntry> {
        let req = &self.requirements[p.requirement];
        let slot = self.grid.span_slot(&p.span)?;
        Some(ScheduleEntry::new(
            slot,
            req.subject_id.clone(),
            p.faculty_id.clone(),
            p.classroom_id.clone(),
            req.section_id.clone(),
        ))
    }
}
