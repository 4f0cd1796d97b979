//! Subject (course) model.
//!
//! A subject is taught to every section that requires it, a fixed number of
//! sessions per week. A session may span more than one slot when its length
//! exceeds the slot duration.

use serde::{Deserialize, Serialize};

/// A course taught in recurring weekly sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Unique subject identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Catalog code (e.g. "CS201").
    #[serde(default)]
    pub code: String,
    /// Sessions required per week for each section taking this subject.
    pub sessions_per_week: u32,
    /// Length of one session in minutes. `None` = one slot.
    #[serde(default)]
    pub session_minutes: Option<u32>,
    /// Class type tag (e.g. "lecture", "lab").
    #[serde(default = "default_class_type")]
    pub class_type: String,
    /// Required classroom type. `None` = any room.
    #[serde(default)]
    pub room_type: Option<String>,
}

fn default_class_type() -> String {
    "lecture".to_string()
}

impl Subject {
    /// Creates a lecture subject with the given weekly session count.
    pub fn new(id: impl Into<String>, sessions_per_week: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            code: String::new(),
            sessions_per_week,
            session_minutes: None,
            class_type: default_class_type(),
            room_type: None,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the catalog code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets the session length in minutes.
    pub fn with_session_minutes(mut self, minutes: u32) -> Self {
        self.session_minutes = Some(minutes);
        self
    }

    /// Sets the class type tag.
    pub fn with_class_type(mut self, class_type: impl Into<String>) -> Self {
        self.class_type = class_type.into();
        self
    }

    /// Restricts sessions to rooms of the given type.
    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    /// Number of consecutive slots one session occupies.
    ///
    /// Always at least 1.
    pub fn span_slots(&self, slot_minutes: u32) -> usize {
        match self.session_minutes {
            Some(m) if slot_minutes > 0 => (m.div_ceil(slot_minutes)).max(1) as usize,
            _ => 1,
        }
    }

    /// Whether a room of `room_type` is acceptable for this subject.
    pub fn accepts_room_type(&self, room_type: &str) -> bool {
        self.room_type.as_deref().map_or(true, |t| t == room_type)
    }
}
