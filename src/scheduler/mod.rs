//! Session placement and schedule metrics.
//!
//! # Algorithm
//!
//! [`Scheduler`] is a deterministic greedy search over the slot grid with
//! bounded backtracking. It is not optimal; it aims for constraint
//! satisfaction with reproducible output.
//!
//! # KPI
//!
//! [`TimetableKpi`] summarises placement rate, faculty load, and room use.

mod bookings;
mod greedy;
mod kpi;
mod requirement;

pub use greedy::{Scheduler, SearchResult, SearchStats};
pub use kpi::TimetableKpi;
pub use requirement::{PairSessions, Requirement, ResourceRule, SessionPlan};
