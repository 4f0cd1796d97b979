//! Classroom model.

use serde::{Deserialize, Serialize};

use super::calendar::TimeSlot;

/// A room that hosts one session at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    /// Unique classroom identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Seats available. Must be positive.
    pub capacity: u32,
    /// Room type tag (e.g. "lecture_hall", "lab").
    #[serde(default = "default_room_type")]
    pub room_type: String,
    /// Weekly periods the room cannot be booked.
    #[serde(default, alias = "unavailable_slots")]
    pub unavailable: Vec<TimeSlot>,
}

fn default_room_type() -> String {
    "lecture_hall".to_string()
}

impl Classroom {
    /// Creates a lecture hall with the given capacity.
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            capacity,
            room_type: default_room_type(),
            unavailable: Vec::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the room type.
    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = room_type.into();
        self
    }

    /// Blocks out a weekly period (maintenance, reserved events).
    pub fn with_unavailable(mut self, period: TimeSlot) -> Self {
        self.unavailable.push(period);
        self
    }

    pub fn is_available(&self, slot: &TimeSlot) -> bool {
        !self.unavailable.iter().any(|blocked| blocked.overlaps(slot))
    }

    /// Whether a group of `size` students fits.
    #[inline]
    pub fn fits(&self, size: u32) -> bool {
        self.capacity >= size
    }
}
