//! Refinement: applying a change request to a prior timetable.
//!
//! Entries the change does not touch are kept as they are; only released
//! and newly required sessions are scheduled again, around the kept ones.
//! When that local repair cannot place everything the whole timetable is
//! regenerated.

mod delta;
mod engine;

pub use delta::Delta;
pub use engine::{RefinementEngine, Repair, RepairMode};
