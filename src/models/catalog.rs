//! Entity catalog.
//!
//! An immutable, validated view over the faculty, subjects, classrooms, and
//! sections of one generation request. All lookups iterate in ascending ID
//! order so every consumer sees the same deterministic sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Classroom, Faculty, Section, Subject};
use crate::error::ConfigError;
use crate::validation::validate_catalog;

/// Raw entity lists as supplied by an external ingestion step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(default)]
    pub faculty: Vec<Faculty>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl EntitySet {
    /// Creates an empty entity set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a faculty member.
    pub fn with_faculty(mut self, faculty: Faculty) -> Self {
        self.faculty.push(faculty);
        self
    }

    /// Adds a subject.
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }

    /// Adds a classroom.
    pub fn with_classroom(mut self, classroom: Classroom) -> Self {
        self.classrooms.push(classroom);
        self
    }

    /// Adds a section.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// Validated, ID-indexed entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    faculty: BTreeMap<String, Faculty>,
    subjects: BTreeMap<String, Subject>,
    classrooms: BTreeMap<String, Classroom>,
    sections: BTreeMap<String, Section>,
}

impl Catalog {
    /// Validates `entities` and builds the catalog.
    ///
    /// # Errors
    /// [`ConfigError::Catalog`] listing every integrity issue found.
    pub fn new(entities: &EntitySet) -> Result<Self, ConfigError> {
        validate_catalog(
            &entities.faculty,
            &entities.subjects,
            &entities.classrooms,
            &entities.sections,
        )
        .map_err(ConfigError::Catalog)?;

        Ok(Self {
            faculty: index(&entities.faculty, |f| &f.id),
            subjects: index(&entities.subjects, |s| &s.id),
            classrooms: index(&entities.classrooms, |c| &c.id),
            sections: index(&entities.sections, |s| &s.id),
        })
    }

    /// Returns the entities back as lists, each in ascending ID order.
    pub fn to_entities(&self) -> EntitySet {
        EntitySet {
            faculty: self.faculty.values().cloned().collect(),
            subjects: self.subjects.values().cloned().collect(),
            classrooms: self.classrooms.values().cloned().collect(),
            sections: self.sections.values().cloned().collect(),
        }
    }

    pub fn faculty(&self, id: &str) -> Option<&Faculty> {
        self.faculty.get(id)
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.get(id)
    }

    pub fn classroom(&self, id: &str) -> Option<&Classroom> {
        self.classrooms.get(id)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.get(id)
    }

    /// All faculty in ascending ID order.
    pub fn all_faculty(&self) -> impl Iterator<Item = &Faculty> {
        self.faculty.values()
    }

    /// All subjects in ascending ID order.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// All classrooms in ascending ID order.
    pub fn classrooms(&self) -> impl Iterator<Item = &Classroom> {
        self.classrooms.values()
    }

    /// All sections in ascending ID order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Faculty qualified to teach `subject_id`, ascending by ID.
    pub fn qualified_faculty(&self, subject_id: &str) -> Vec<&Faculty> {
        self.faculty
            .values()
            .filter(|f| f.can_teach(subject_id))
            .collect()
    }

    /// Rooms large enough for `section` and of a type `subject` accepts,
    /// ascending by ID.
    pub fn fitting_rooms(&self, subject: &Subject, section: &Section) -> Vec<&Classroom> {
        self.classrooms
            .values()
            .filter(|c| c.fits(section.size) && subject.accepts_room_type(&c.room_type))
            .collect()
    }

    /// Every (subject, section) pair in scope, ordered by section ID and then
    /// by the section's subject list.
    pub fn pairs(&self) -> Vec<(&Subject, &Section)> {
        self.sections
            .values()
            .flat_map(|section| {
                section
                    .subjects
                    .iter()
                    .filter_map(|id| self.subjects.get(id))
                    .map(move |subject| (subject, section))
            })
            .collect()
    }
}

fn index<T: Clone>(items: &[T], key: impl Fn(&T) -> &String) -> BTreeMap<String, T> {
    items.iter().map(|i| (key(i).clone(), i.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities() -> EntitySet {
        EntitySet::new()
            .with_faculty(Faculty::new("F2").with_subject("MATH"))
            .with_faculty(Faculty::new("F1").with_subjects(["MATH", "LAB"]))
            .with_subject(Subject::new("MATH", 3))
            .with_subject(Subject::new("LAB", 1).with_room_type("lab"))
            .with_classroom(Classroom::new("R2", 80))
            .with_classroom(Classroom::new("R1", 30))
            .with_classroom(Classroom::new("L1", 70).with_room_type("lab"))
            .with_section(Section::new("S1", 60).with_subject("MATH").with_subject("LAB"))
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::new(&entities()).unwrap();
        assert!(catalog.faculty("F1").is_some());
        assert!(catalog.subject("LAB").is_some());
        assert!(catalog.classroom("R9").is_none());
    }

    #[test]
    fn test_qualified_faculty_sorted() {
        let catalog = Catalog::new(&entities()).unwrap();
        let ids: Vec<&str> = catalog
            .qualified_faculty("MATH")
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["F1", "F2"]);
    }

    #[test]
    fn test_fitting_rooms_respect_capacity_and_type() {
        let catalog = Catalog::new(&entities()).unwrap();
        let section = catalog.section("S1").unwrap();

        let math = catalog.subject("MATH").unwrap();
        let ids: Vec<&str> = catalog
            .fitting_rooms(math, section)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["R2"]);

        let lab = catalog.subject("LAB").unwrap();
        let ids: Vec<&str> = catalog
            .fitting_rooms(lab, section)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["L1"]);
    }

    #[test]
    fn test_pairs() {
        let catalog = Catalog::new(&entities()).unwrap();
        let pairs: Vec<(&str, &str)> = catalog
            .pairs()
            .iter()
            .map(|(subj, sec)| (subj.id.as_str(), sec.id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("MATH", "S1"), ("LAB", "S1")]);
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let bad = entities().with_section(Section::new("S1", 10));
        let err = Catalog::new(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::Catalog(_)));
    }

    #[test]
    fn test_to_entities_sorted() {
        let catalog = Catalog::new(&entities()).unwrap();
        let back = catalog.to_entities();
        let ids: Vec<&str> = back.faculty.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["F1", "F2"]);
    }
}
