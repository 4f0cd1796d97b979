//! Timetable quality metrics (KPIs).
//!
//! Computes summary indicators from a schedule, its catalog, and the
//! session plan it was built for.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Placement rate | Placed sessions / required sessions |
//! | Faculty hours | Teaching hours per faculty member |
//! | Room utilization | Occupied slot time / grid time, per room |
//! | Avg distinct days | Mean days used per (subject, section) pair |

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::SessionPlan;
use crate::models::{Catalog, Schedule};
use crate::slots::SlotGrid;

/// Timetable performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableKpi {
    /// Sessions required by the plan.
    pub required_sessions: u32,
    /// Entries in scope of the plan.
    pub placed_sessions: u32,
    /// Fraction of required sessions placed (0.0..=1.0).
    pub placement_rate: f64,
    /// Teaching hours per faculty member (every catalog member, zero if idle).
    pub faculty_hours: BTreeMap<String, f64>,
    /// Occupied fraction of the weekly grid per classroom.
    pub room_utilization: BTreeMap<String, f64>,
    /// Mean distinct days per (subject, section) pair that has sessions.
    pub avg_distinct_days: f64,
}

impl TimetableKpi {
    /// Computes KPIs.
    pub fn calculate(catalog: &Catalog, plan: &SessionPlan, grid: &SlotGrid, schedule: &Schedule) -> Self {
        let required_sessions = plan.total();
        let placed_sessions = plan
            .iter()
            .map(|(subj, sec, n)| (schedule.count_for_pair(subj, sec) as u32).min(n))
            .sum::<u32>();
        let placement_rate = if required_sessions == 0 {
            1.0
        } else {
            f64::from(placed_sessions) / f64::from(required_sessions)
        };

        let mut faculty_hours: BTreeMap<String, f64> =
            catalog.all_faculty().map(|f| (f.id.clone(), 0.0)).collect();
        for e in &schedule.entries {
            *faculty_hours.entry(e.faculty_id.clone()).or_insert(0.0) +=
                f64::from(e.duration_minutes()) / 60.0;
        }

        let grid_minutes = grid.len() as f64 * f64::from(grid.slot_minutes());
        let room_utilization = catalog
            .classrooms()
            .map(|room| {
                let busy: u32 = schedule
                    .entries_for_classroom(&room.id)
                    .iter()
                    .map(|e| e.duration_minutes())
                    .sum();
                let util = if grid_minutes > 0.0 {
                    f64::from(busy) / grid_minutes
                } else {
                    0.0
                };
                (room.id.clone(), util)
            })
            .collect();

        let mut days_per_pair: BTreeMap<(&str, &str), BTreeSet<_>> = BTreeMap::new();
        for e in &schedule.entries {
            days_per_pair
                .entry((e.subject_id.as_str(), e.section_id.as_str()))
                .or_default()
                .insert(e.day);
        }
        let avg_distinct_days = if days_per_pair.is_empty() {
            0.0
        } else {
            let total: usize = days_per_pair.values().map(BTreeSet::len).sum();
            total as f64 / days_per_pair.len() as f64
        };

        Self {
            required_sessions,
            placed_sessions,
            placement_rate,
            faculty_hours,
            room_utilization,
            avg_distinct_days,
        }
    }

    /// Whether the timetable meets the given thresholds.
    pub fn meets_thresholds(&self, min_placement_rate: f64, max_faculty_hours: f64) -> bool {
        self.placement_rate >= min_placement_rate
            && self.faculty_hours.values().all(|&h| h <= max_faculty_hours)
    }
}
