//! Slot occupancy ledger used during search.
//!
//! Tracks which grid slots each faculty member, classroom, and section
//! already holds, plus each faculty member's booked minutes. Fixed bookings
//! (entries kept from a prior schedule) and the catalog's unavailable
//! periods are loaded once and never released.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::models::{Catalog, ScheduleEntry};
use crate::slots::SlotGrid;

/// A tentative placement: one requirement on a span of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    /// Index into the scheduler's requirement list.
    pub requirement: usize,
    pub span: Range<usize>,
    pub faculty_id: String,
    pub classroom_id: String,
    pub section_id: String,
    pub minutes: u32,
}

impl Placement {
    /// Identity used to exclude this exact choice after a backtrack.
    pub fn choice(&self) -> Choice {
        (self.span.start, self.faculty_id.clone(), self.classroom_id.clone())
    }
}

/// (first slot, faculty, classroom).
pub(crate) type Choice = (usize, String, String);

#[derive(Debug, Default)]
pub(crate) struct Bookings {
    faculty: BTreeMap<String, BTreeSet<usize>>,
    classrooms: BTreeMap<String, BTreeSet<usize>>,
    sections: BTreeMap<String, BTreeSet<usize>>,
    faculty_minutes: BTreeMap<String, u32>,
}

impl Bookings {
    /// Ledger pre-filled with fixed entries and with every slot a faculty
    /// member or classroom is unavailable for.
    pub fn with_fixed(catalog: &Catalog, grid: &SlotGrid, fixed: &[ScheduleEntry]) -> Self {
        let mut ledger = Self::default();
        for f in catalog.all_faculty() {
            for period in &f.unavailable {
                ledger
                    .faculty
                    .entry(f.id.clone())
                    .or_default()
                    .extend(grid.overlapping_period(period));
            }
        }
        for room in catalog.classrooms() {
            for period in &room.unavailable {
                ledger
                    .classrooms
                    .entry(room.id.clone())
                    .or_default()
                    .extend(grid.overlapping_period(period));
            }
        }
        for entry in fixed {
            let occupied = grid.overlapping(entry);
            for (map, id) in [
                (&mut ledger.faculty, &entry.faculty_id),
                (&mut ledger.classrooms, &entry.classroom_id),
                (&mut ledger.sections, &entry.section_id),
            ] {
                map.entry(id.clone())
                    .or_default()
                    .extend(occupied.iter().copied());
            }
            *ledger
                .faculty_minutes
                .entry(entry.faculty_id.clone())
                .or_default() += entry.duration_minutes();
        }
        ledger
    }

    pub fn faculty_free(&self, id: &str, span: &Range<usize>) -> bool {
        is_free(&self.faculty, id, span)
    }

    pub fn classroom_free(&self, id: &str, span: &Range<usize>) -> bool {
        is_free(&self.classrooms, id, span)
    }

    pub fn section_free(&self, id: &str, span: &Range<usize>) -> bool {
        is_free(&self.sections, id, span)
    }

    /// Minutes already booked for a faculty member.
    pub fn faculty_minutes(&self, id: &str) -> u32 {
        self.faculty_minutes.get(id).copied().unwrap_or(0)
    }

    pub fn book(&mut self, p: &Placement) {
        for (map, id) in [
            (&mut self.faculty, &p.faculty_id),
            (&mut self.classrooms, &p.classroom_id),
            (&mut self.sections, &p.section_id),
        ] {
            map.entry(id.clone()).or_default().extend(p.span.clone());
        }
        *self.faculty_minutes.entry(p.faculty_id.clone()).or_default() += p.minutes;
    }

    pub fn release(&mut self, p: &Placement) {
        for (map, id) in [
            (&mut self.faculty, &p.faculty_id),
            (&mut self.classrooms, &p.classroom_id),
            (&mut self.sections, &p.section_id),
        ] {
            if let Some(held) = map.get_mut(id) {
                for slot in p.span.clone() {
                    held.remove(&slot);
                }
            }
        }
        if let Some(minutes) = self.faculty_minutes.get_mut(&p.faculty_id) {
            *minutes = minutes.saturating_sub(p.minutes);
        }
    }
}

fn is_free(map: &BTreeMap<String, BTreeSet<usize>>, id: &str, span: &Range<usize>) -> bool {
    map.get(id)
        .map_or(true, |held| held.range(span.clone()).next().is_none())
}
