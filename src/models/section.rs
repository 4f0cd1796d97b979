//! Section (student group) model.

use serde::{Deserialize, Serialize};

/// A group of students attending the same subjects together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique section identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Enrolled students. Must be positive.
    pub size: u32,
    /// Subject IDs this section must attend, in declaration order.
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl Section {
    /// Creates a section with no subjects.
    pub fn new(id: impl Into<String>, size: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            size,
            subjects: Vec::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a required subject.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subjects.push(subject_id.into());
        self
    }

    /// Whether this section takes `subject_id`.
    pub fn requires(&self, subject_id: &str) -> bool {
        self.subjects.iter().any(|s| s == subject_id)
    }
}
