//! Input validation for entity catalogs.
//!
//! Checks structural integrity of faculty, subjects, classrooms, and sections
//! before any search begins. Detects:
//! - Duplicate or empty IDs
//! - References to subjects that don't exist
//! - Non-positive sizes, capacities, and durations
//! - Session lengths longer than a day
//!
//! Every issue is collected so callers see the whole picture at once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{Classroom, Faculty, Section, Subject};

/// Longest session a subject may ask for.
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Validation result.
pub type ValidationResult = Result<(), Vec<CatalogIssue>>;

/// A catalog integrity issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIssue {
    /// Issue category.
    pub kind: CatalogIssueKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of catalog issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogIssueKind {
    /// Two entities of the same type share an ID.
    DuplicateId,
    /// An entity has an empty ID.
    EmptyId,
    /// A subject reference points nowhere.
    UnknownReference,
    /// A size, capacity, or duration is zero.
    NonPositive,
    /// A value exceeds what any weekly window can hold.
    OutOfRange,
}

impl CatalogIssue {
    pub(crate) fn new(kind: CatalogIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the entities of one generation request.
///
/// Checks:
/// 1. No empty or duplicate IDs within each entity type
/// 2. Faculty qualifications and section requirements reference known subjects
/// 3. Sections list each subject at most once
/// 4. Capacities, section sizes, weekly session counts, and session lengths are positive
/// 5. Session lengths fit in one day
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(issues)` with all detected problems.
pub fn validate_catalog(
    faculty: &[Faculty],
    subjects: &[Subject],
    classrooms: &[Classroom],
    sections: &[Section],
) -> ValidationResult {
    let mut issues = Vec::new();

    let subject_ids = collect_ids("subject", subjects.iter().map(|s| s.id.as_str()), &mut issues);
    collect_ids("faculty", faculty.iter().map(|f| f.id.as_str()), &mut issues);
    collect_ids("classroom", classrooms.iter().map(|c| c.id.as_str()), &mut issues);
    collect_ids("section", sections.iter().map(|s| s.id.as_str()), &mut issues);

    for subject in subjects {
        if subject.sessions_per_week == 0 {
            issues.push(CatalogIssue::new(
                CatalogIssueKind::NonPositive,
                format!("Subject '{}' requires zero sessions per week", subject.id),
            ));
        }
        match subject.session_minutes {
            Some(0) => issues.push(CatalogIssue::new(
                CatalogIssueKind::NonPositive,
                format!("Subject '{}' has a zero-minute session length", subject.id),
            )),
            Some(m) if m > MINUTES_PER_DAY => issues.push(CatalogIssue::new(
                CatalogIssueKind::OutOfRange,
                format!(
                    "Subject '{}' has a {m}-minute session, longer than a day",
                    subject.id
                ),
            )),
            _ => {}
        }
    }

    for f in faculty {
        for subject_id in &f.qualified_subjects {
            if !subject_ids.contains(subject_id.as_str()) {
                issues.push(CatalogIssue::new(
                    CatalogIssueKind::UnknownReference,
                    format!("Faculty '{}' is qualified for unknown subject '{}'", f.id, subject_id),
                ));
            }
        }
    }

    for room in classrooms {
        if room.capacity == 0 {
            issues.push(CatalogIssue::new(
                CatalogIssueKind::NonPositive,
                format!("Classroom '{}' has zero capacity", room.id),
            ));
        }
    }

    for section in sections {
        if section.size == 0 {
            issues.push(CatalogIssue::new(
                CatalogIssueKind::NonPositive,
                format!("Section '{}' has zero enrolled students", section.id),
            ));
        }
        let mut seen = HashSet::new();
        for subject_id in &section.subjects {
            if !subject_ids.contains(subject_id.as_str()) {
                issues.push(CatalogIssue::new(
                    CatalogIssueKind::UnknownReference,
                    format!("Section '{}' requires unknown subject '{}'", section.id, subject_id),
                ));
            }
            if !seen.insert(subject_id.as_str()) {
                issues.push(CatalogIssue::new(
                    CatalogIssueKind::DuplicateId,
                    format!("Section '{}' lists subject '{}' twice", section.id, subject_id),
                ));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn collect_ids<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
    issues: &mut Vec<CatalogIssue>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            issues.push(CatalogIssue::new(
                CatalogIssueKind::EmptyId,
                format!("A {kind} has an empty ID"),
            ));
            continue;
        }
        if !seen.insert(id) {
            issues.push(CatalogIssue::new(
                CatalogIssueKind::DuplicateId,
                format!("Duplicate {kind} ID: {id}"),
            ));
        }
    }
    seen
}
