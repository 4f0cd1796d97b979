//! Timetabling domain models.
//!
//! Provides the entity types of one generation request and the types that
//! describe a (possibly partial) weekly timetable and its validation.
//!
//! # Domain Mappings
//!
//! | u-timetable | University | School | Training center |
//! |-------------|-----------|--------|-----------------|
//! | Faculty | Lecturer | Teacher | Instructor |
//! | Subject | Course | Class subject | Module |
//! | Classroom | Lecture hall / lab | Room | Venue |
//! | Section | Batch | Form / grade group | Cohort |

pub(crate) mod calendar;
mod catalog;
mod classroom;
mod faculty;
mod schedule;
mod section;
mod subject;

pub use calendar::{Day, TimeSlot};
pub use catalog::{Catalog, EntitySet};
pub use classroom::Classroom;
pub use faculty::Faculty;
pub use schedule::{
    Schedule, ScheduleEntry, ValidationReport, Violation, ViolationKind, Warning, WarningKind,
};
pub use section::Section;
pub use subject::Subject;
