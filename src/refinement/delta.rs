//! Structured change requests against a prior timetable.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Day, Schedule, Section, Subject};
use crate::pipeline::GenerationRequest;
use crate::scheduler::{PairSessions, ResourceRule, SessionPlan};
use crate::slots::WeeklyWindow;

/// One requested change.
///
/// Serialized with an external `kind` tag, e.g.
/// `{"kind":"add_session","subject_id":"MATH","section_id":"S1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// One more weekly session for a pair already in scope.
    AddSession { subject_id: String, section_id: String },
    /// One fewer weekly session for a pair.
    RemoveSession { subject_id: String, section_id: String },
    /// New working days and daily window. Daily breaks are kept.
    ChangeWindow {
        working_days: Vec<Day>,
        day_start: NaiveTime,
        day_end: NaiveTime,
        slot_minutes: u32,
    },
    /// Move one entry to `faculty_id`, or to anyone else when `None`.
    ReplaceFaculty {
        entry: usize,
        #[serde(default)]
        faculty_id: Option<String>,
    },
    /// Move one entry to `classroom_id`, or to any other room when `None`.
    ReplaceClassroom {
        entry: usize,
        #[serde(default)]
        classroom_id: Option<String>,
    },
    /// Add a section or replace the one with the same ID.
    UpsertSection(Section),
    RemoveSection { section_id: String },
    /// Add a subject or replace the one with the same ID.
    UpsertSubject(Subject),
    RemoveSubject { subject_id: String },
}

/// A resource restriction carried by one released prior entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pin {
    /// Index of the released entry in the prior schedule.
    pub entry: usize,
    pub faculty_rule: Option<ResourceRule>,
    pub classroom_rule: Option<ResourceRule>,
}

impl Delta {
    /// The request that results from applying this delta.
    ///
    /// # Errors
    /// [`ConfigError::UnknownReference`] when the delta names an entry,
    /// entity, or pair that does not exist. Catalog integrity of the result is
    /// checked later, when the new catalog is built.
    pub fn apply(&self, request: &GenerationRequest, prior: &Schedule) -> Result<GenerationRequest, ConfigError> {
        let mut next = request.clone();

        match self {
            Delta::AddSession { subject_id, section_id } => {
                let required = current_count(request, subject_id, section_id)?;
                next.set_pair_sessions(subject_id, section_id, required + 1);
            }
            Delta::RemoveSession { subject_id, section_id } => {
                let required = current_count(request, subject_id, section_id)?;
                next.set_pair_sessions(subject_id, section_id, required.saturating_sub(1));
            }
            Delta::ChangeWindow {
                working_days,
                day_start,
                day_end,
                slot_minutes,
            } => {
                let breaks = std::mem::take(&mut next.window.breaks);
                next.window = WeeklyWindow::new(working_days.clone(), *day_start, *day_end, *slot_minutes);
                next.window.breaks = breaks;
            }
            Delta::ReplaceFaculty { entry, faculty_id } => {
                check_entry(prior, *entry)?;
                if let Some(id) = faculty_id {
                    if !request.entities.faculty.iter().any(|f| &f.id == id) {
                        return Err(unknown("faculty", id));
                    }
                }
            }
            Delta::ReplaceClassroom { entry, classroom_id } => {
                check_entry(prior, *entry)?;
                if let Some(id) = classroom_id {
                    if !request.entities.classrooms.iter().any(|c| &c.id == id) {
                        return Err(unknown("classroom", id));
                    }
                }
            }
            Delta::UpsertSection(section) => {
                upsert(&mut next.entities.sections, section.clone(), |s| &s.id);
                let section_id = section.id.as_str();
                next.pair_sessions
                    .retain(|p| p.section_id != section_id || section.requires(&p.subject_id));
            }
            Delta::RemoveSection { section_id } => {
                let before = next.entities.sections.len();
                next.entities.sections.retain(|s| &s.id != section_id);
                if next.entities.sections.len() == before {
                    return Err(unknown("section", section_id));
                }
                next.pair_sessions.retain(|p| &p.section_id != section_id);
            }
            Delta::UpsertSubject(subject) => {
                upsert(&mut next.entities.subjects, subject.clone(), |s| &s.id);
            }
            Delta::RemoveSubject { subject_id } => {
                let before = next.entities.subjects.len();
                next.entities.subjects.retain(|s| &s.id != subject_id);
                if next.entities.subjects.len() == before {
                    return Err(unknown("subject", subject_id));
                }
                for section in &mut next.entities.sections {
                    section.subjects.retain(|s| s != subject_id);
                }
                for faculty in &mut next.entities.faculty {
                    faculty.qualified_subjects.remove(subject_id);
                }
                next.sessions_per_week.remove(subject_id);
                next.pair_sessions.retain(|p| &p.subject_id != subject_id);
            }
        }

        Ok(next)
    }

    /// The prior entry this delta explicitly releases, with its restriction.
    pub(crate) fn pin(&self, prior: &Schedule) -> Option<Pin> {
        match self {
            Delta::ReplaceFaculty { entry, faculty_id } => {
                let old = prior.entries.get(*entry)?;
                Some(Pin {
                    entry: *entry,
                    faculty_rule: Some(replacement_rule(faculty_id, &old.faculty_id)),
                    classroom_rule: None,
                })
            }
            Delta::ReplaceClassroom { entry, classroom_id } => {
                let old = prior.entries.get(*entry)?;
                Some(Pin {
                    entry: *entry,
                    faculty_rule: None,
                    classroom_rule: Some(replacement_rule(classroom_id, &old.classroom_id)),
                })
            }
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Delta::AddSession { .. } => "add_session",
            Delta::RemoveSession { .. } => "remove_session",
            Delta::ChangeWindow { .. } => "change_window",
            Delta::ReplaceFaculty { .. } => "replace_faculty",
            Delta::ReplaceClassroom { .. } => "replace_classroom",
            Delta::UpsertSection(_) => "upsert_section",
            Delta::RemoveSection { .. } => "remove_section",
            Delta::UpsertSubject(_) => "upsert_subject",
            Delta::RemoveSubject { .. } => "remove_subject",
        }
    }
}

impl GenerationRequest {
    /// Sets the explicit weekly count for one pair, replacing any earlier one.
    fn set_pair_sessions(&mut self, subject_id: &str, section_id: &str, sessions: u32) {
        match self
            .pair_sessions
            .iter_mut()
            .find(|p| p.subject_id == subject_id && p.section_id == section_id)
        {
            Some(pair) => pair.sessions = sessions,
            None => self
                .pair_sessions
                .push(PairSessions::new(subject_id, section_id, sessions)),
        }
    }
}

fn replacement_rule(wanted: &Option<String>, old: &str) -> ResourceRule {
    match wanted {
        Some(id) => ResourceRule::Only(id.clone()),
        None => ResourceRule::Except(old.to_string()),
    }
}

fn current_count(request: &GenerationRequest, subject_id: &str, section_id: &str) -> Result<u32, ConfigError> {
    let catalog = request.catalog()?;
    let plan: SessionPlan = request.plan(&catalog)?;
    if !plan.contains(subject_id, section_id) {
        return Err(unknown("subject/section pair", &format!("{subject_id}/{section_id}")));
    }
    Ok(plan.required(subject_id, section_id))
}

fn check_entry(prior: &Schedule, entry: usize) -> Result<(), ConfigError> {
    if entry < prior.len() {
        Ok(())
    } else {
        Err(unknown("schedule entry", &entry.to_string()))
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

fn unknown(kind: &'static str, id: &str) -> ConfigError {
    ConfigError::UnknownReference {
        kind,
        id: id.to_string(),
    }
}
