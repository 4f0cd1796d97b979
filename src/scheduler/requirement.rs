//! Requirements: the units of work the scheduler places.
//!
//! One requirement per (subject, section, occurrence) up to the number of
//! weekly sessions the pair needs. Weekly counts come from the subject
//! default, optionally overridden per subject or per pair.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Catalog;

/// Restricts which faculty member or classroom a requirement may use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceRule {
    /// Only this ID.
    Only(String),
    /// Anything but this ID.
    Except(String),
}

impl ResourceRule {
    /// Whether `id` passes the rule.
    pub fn allows(&self, id: &str) -> bool {
        match self {
            ResourceRule::Only(only) => only == id,
            ResourceRule::Except(except) => except != id,
        }
    }
}

/// One session of a subject that a section must attend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub subject_id: String,
    pub section_id: String,
    /// Zero-based occurrence index within the pair's weekly sessions.
    pub occurrence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_rule: Option<ResourceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_rule: Option<ResourceRule>,
}

impl Requirement {
    /// Creates an unrestricted requirement.
    pub fn new(subject_id: impl Into<String>, section_id: impl Into<String>, occurrence: u32) -> Self {
        Self {
            subject_id: subject_id.into(),
            section_id: section_id.into(),
            occurrence,
            faculty_rule: None,
            classroom_rule: None,
        }
    }

    /// Restricts the faculty choice.
    pub fn with_faculty_rule(mut self, rule: ResourceRule) -> Self {
        self.faculty_rule = Some(rule);
        self
    }

    /// Restricts the classroom choice.
    pub fn with_classroom_rule(mut self, rule: ResourceRule) -> Self {
        self.classroom_rule = Some(rule);
        self
    }

    /// Whether the faculty member `id` may teach this session.
    pub fn allows_faculty(&self, id: &str) -> bool {
        self.faculty_rule.as_ref().map_or(true, |r| r.allows(id))
    }

    /// Whether the classroom `id` may host this session.
    pub fn allows_classroom(&self, id: &str) -> bool {
        self.classroom_rule.as_ref().map_or(true, |r| r.allows(id))
    }

    /// Sort key for reproducible tie-breaking.
    pub fn tie_key(&self) -> (&str, &str, u32) {
        (&self.subject_id, &self.section_id, self.occurrence)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for {} (session {})",
            self.subject_id,
            self.section_id,
            self.occurrence + 1
        )
    }
}

/// An explicit weekly session count for one (subject, section) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSessions {
    pub subject_id: String,
    pub section_id: String,
    pub sessions: u32,
}

impl PairSessions {
    pub fn new(subject_id: impl Into<String>, section_id: impl Into<String>, sessions: u32) -> Self {
        Self {
            subject_id: subject_id.into(),
            section_id: section_id.into(),
            sessions,
        }
    }
}

/// Required weekly sessions for every (subject, section) pair in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPlan {
    counts: BTreeMap<(String, String), u32>,
}

impl SessionPlan {
    /// Subject defaults only.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let counts = catalog
            .pairs()
            .into_iter()
            .map(|(subject, section)| {
                ((subject.id.clone(), section.id.clone()), subject.sessions_per_week)
            })
            .collect();
        Self { counts }
    }

    /// Subject defaults, then per-subject overrides, then per-pair overrides.
    ///
    /// # Errors
    /// [`ConfigError::UnknownReference`] if an override names a subject not in
    /// the catalog or a pair not in scope.
    pub fn new(
        catalog: &Catalog,
        subject_overrides: &BTreeMap<String, u32>,
        pair_overrides: &[PairSessions],
    ) -> Result<Self, ConfigError> {
        let mut plan = Self::from_catalog(catalog);

        for (subject_id, &sessions) in subject_overrides {
            if catalog.subject(subject_id).is_none() {
                return Err(ConfigError::UnknownReference {
                    kind: "subject",
                    id: subject_id.clone(),
                });
            }
            for ((subj, _), count) in plan.counts.iter_mut() {
                if subj == subject_id {
                    *count = sessions;
                }
            }
        }

        for pair in pair_overrides {
            match plan
                .counts
                .get_mut(&(pair.subject_id.clone(), pair.section_id.clone()))
            {
                Some(count) => *count = pair.sessions,
                None => {
                    return Err(ConfigError::UnknownReference {
                        kind: "subject/section pair",
                        id: format!("{}/{}", pair.subject_id, pair.section_id),
                    })
                }
            }
        }

        Ok(plan)
    }

    /// Required sessions for a pair; zero if the pair is not in scope.
    pub fn required(&self, subject_id: &str, section_id: &str) -> u32 {
        self.counts
            .get(&(subject_id.to_string(), section_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the pair is in scope.
    pub fn contains(&self, subject_id: &str, section_id: &str) -> bool {
        self.counts
            .contains_key(&(subject_id.to_string(), section_id.to_string()))
    }

    /// Pairs and their counts, ascending by (subject, section).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.counts
            .iter()
            .map(|((subj, sec), &n)| (subj.as_str(), sec.as_str(), n))
    }

    /// Total sessions required.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// One requirement per required session, in (subject, section,
    /// occurrence) order.
    pub fn requirements(&self) -> Vec<Requirement> {
        self.iter()
            .flat_map(|(subj, sec, n)| (0..n).map(move |k| Requirement::new(subj, sec, k)))
            .collect()
    }
}
