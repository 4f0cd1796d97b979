//! Weekly class timetabling engine.
//!
//! Assigns recurring class sessions (subject × section, N times per week) to
//! time slots, faculty, and classrooms without double-booking, checks any
//! timetable against the same hard constraints independently, and repairs a
//! prior timetable locally when the request changes.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Faculty`, `Subject`, `Classroom`, `Section`,
//!   `Catalog`, `Schedule`, `ValidationReport`
//! - **`validation`**: Catalog integrity checks (duplicate IDs, dangling references)
//! - **`slots`**: Slot grid generation from a weekly window
//! - **`scheduler`**: Requirements, greedy assignment with bounded backtracking, KPIs
//! - **`constraints`**: Independent constraint validator
//! - **`refinement`**: Change requests and local repair
//! - **`pipeline`**: Request types and the generate / refine controller
//! - **`dedup`**: Request fingerprints and in-flight coalescing
//! - **`intake`**: Boundary for request interpreters
//! - **`config`**, **`error`**, **`logging`**: Ambient support
//!
//! # Example
//!
//! ```
//! use chrono::NaiveTime;
//! use u_timetable::models::{Classroom, EntitySet, Faculty, Section, Subject};
//! use u_timetable::pipeline::{GenerationRequest, Pipeline};
//! use u_timetable::slots::WeeklyWindow;
//!
//! let request = GenerationRequest::new(
//!     EntitySet::new()
//!         .with_faculty(Faculty::new("F1").with_subject("MATH"))
//!         .with_subject(Subject::new("MATH", 3))
//!         .with_classroom(Classroom::new("R1", 60))
//!         .with_section(Section::new("S1", 45).with_subject("MATH")),
//!     WeeklyWindow::weekdays(
//!         NaiveTime::from_hms_opt(7, 50, 0).unwrap(),
//!         NaiveTime::from_hms_opt(11, 40, 0).unwrap(),
//!         50,
//!     ),
//! );
//!
//! let outcome = Pipeline::new().generate(&request).unwrap();
//! assert!(outcome.response.validation.satisfied);
//! assert_eq!(outcome.response.schedule.len(), 3);
//! ```

pub mod config;
pub mod constraints;
pub mod dedup;
pub mod error;
pub mod intake;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod refinement;
pub mod scheduler;
pub mod slots;
pub mod validation;

pub use config::EngineConfig;
pub use error::{ConfigError, EngineError, ParseError};
pub use pipeline::{GenerationRequest, Pipeline, RefinementRequest, Response};
