//! Error types for the timetable engine.
//!
//! Two tiers: configuration problems fail fast before any search begins,
//! infeasibility is never an error (it is reported through a
//! [`ValidationReport`](crate::models::ValidationReport)).

use chrono::NaiveTime;
use thiserror::Error;

use crate::validation::CatalogIssue;

/// Malformed input detected before scheduling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("working day list is empty")]
    EmptyDayList,

    #[error("working day listed more than once: {0}")]
    DuplicateDay(String),

    #[error("invalid daily window: start {start} is not before end {end}")]
    InvalidWindow { start: NaiveTime, end: NaiveTime },

    #[error("invalid break: start {start} is not before end {end}")]
    InvalidBreak { start: NaiveTime, end: NaiveTime },

    #[error("slot duration must be positive")]
    InvalidDuration,

    #[error("a {slot_minutes}-minute slot does not fit in the {window_minutes}-minute daily window")]
    SlotDoesNotFit {
        slot_minutes: u32,
        window_minutes: u32,
    },

    #[error("catalog is invalid: {}", format_issues(.0))]
    Catalog(Vec<CatalogIssue>),

    #[error("unknown {kind} reference: {id}")]
    UnknownReference { kind: &'static str, id: String },

    #[error("invalid engine settings: {0}")]
    InvalidSettings(String),
}

/// Failure to turn an external request into a structured one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported intent: {0}")]
    UnsupportedIntent(String),

    #[error("refinement requested without a prior schedule")]
    MissingPrior,
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn format_issues(issues: &[CatalogIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
