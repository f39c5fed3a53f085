//! Persistence port and its adapters.
//!
//! The aggregate never talks to storage. Callers load a [`StudyDefinition`] through a
//! [`StudyDefinitionRepository`], run one lifecycle operation on it and hand it back to `save`.
//! Repositories keep their optimistic-concurrency token in the aggregate's repository closure.
//!
//! - [`file::FileStudyRepository`]: JSON records under sharded directories.
//! - [`memory::InMemoryStudyRepository`]: process-local map, for tests and dry runs.

pub mod file;
pub mod memory;
mod shared;

use crate::aggregate::StudyDefinition;
use crate::ports::{StudyNumberLookup, TitleFn, TitleLookup};
use crate::StudyResult;

/// Storage of study definitions.
pub trait StudyDefinitionRepository {
    /// Loads a study, or `None` if no study has this uid.
    fn find_by_uid(&self, uid: &str) -> StudyResult<Option<StudyDefinition>>;

    /// Loads every stored study, ordered by uid.
    fn find_all(&self) -> StudyResult<Vec<StudyDefinition>>;

    /// Stores `study` and updates its repository closure to the new revision.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConcurrentModification` if the stored revision is not the one
    /// `study` was loaded at, including a brand-new study whose uid is already stored.
    fn save(&self, study: &mut StudyDefinition) -> StudyResult<()>;

    /// A uid no stored study uses.
    fn generate_uid(&self) -> StudyResult<String>;

    /// Whether a study other than `uid` already uses `study_number`.
    fn study_number_exists(&self, study_number: &str, uid: Option<&str>) -> StudyResult<bool> {
        Ok(StudyIndex::from_studies(&self.find_all()?).is_taken(study_number, uid))
    }

    /// Whether a study with a different study number already uses `title`.
    fn study_title_exists(&self, title: &str, study_number: Option<&str>) -> StudyResult<bool> {
        Ok(StudyIndex::from_studies(&self.find_all()?).title_taken(title, study_number))
    }

    /// Whether a study with a different study number already uses `short_title`.
    fn study_short_title_exists(
        &self,
        short_title: &str,
        study_number: Option<&str>,
    ) -> StudyResult<bool> {
        Ok(StudyIndex::from_studies(&self.find_all()?).short_title_taken(short_title, study_number))
    }
}

#[derive(Clone, Debug)]
struct IndexEntry {
    uid: String,
    study_number: Option<String>,
    study_title: Option<String>,
    study_short_title: Option<String>,
    is_subpart: bool,
}

/// Snapshot of the numbers and titles in use, answering the uniqueness ports.
///
/// Built from the current metadata of every non-deleted study. Sub-parts share their parent's
/// number and are left out of the number index.
#[derive(Clone, Debug, Default)]
pub struct StudyIndex {
    entries: Vec<IndexEntry>,
}

impl StudyIndex {
    pub fn from_studies(studies: &[StudyDefinition]) -> Self {
        let entries = studies
            .iter()
            .filter(|study| !study.is_deleted())
            .map(|study| {
                let current = study.current_metadata();
                IndexEntry {
                    uid: study.uid().to_owned(),
                    study_number: current.identification().study_number().clone(),
                    study_title: current.description().study_title().clone(),
                    study_short_title: current.description().study_short_title().clone(),
                    is_subpart: study.is_subpart(),
                }
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn title_taken(&self, title: &str, study_number: Option<&str>) -> bool {
        self.entries.iter().any(|e| {
            e.study_title.as_deref() == Some(title) && e.study_number.as_deref() != study_number
        })
    }

    pub fn short_title_taken(&self, short_title: &str, study_number: Option<&str>) -> bool {
        self.entries.iter().any(|e| {
            e.study_short_title.as_deref() == Some(short_title)
                && e.study_number.as_deref() != study_number
        })
    }

    /// Port view of [`StudyIndex::title_taken`].
    pub fn title_lookup(&self) -> impl TitleLookup + '_ {
        TitleFn(move |title: &str, number: Option<&str>| self.title_taken(title, number))
    }

    /// Port view of [`StudyIndex::short_title_taken`].
    pub fn short_title_lookup(&self) -> impl TitleLookup + '_ {
        TitleFn(move |title: &str, number: Option<&str>| self.short_title_taken(title, number))
    }
}

impl StudyNumberLookup for StudyIndex {
    fn is_taken(&self, study_number: &str, uid: Option<&str>) -> bool {
        self.entries.iter().any(|e| {
            !e.is_subpart
                && e.study_number.as_deref() == Some(study_number)
                && Some(e.uid.as_str()) != uid
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::NewStudyValues;
    use crate::ports::ReferencePorts;
    use crate::value_objects::{StudyDescription, StudyIdentificationMetadata};

    fn study(uid: &str, number: &str, title: &str, parent: Option<&str>) -> StudyDefinition {
        let values = NewStudyValues {
            identification: StudyIdentificationMetadata::builder()
                .study_number(number)
                .project_number("P1")
                .build(),
            description: StudyDescription::builder()
                .study_title(title)
                .study_short_title(format!("{title} short"))
                .build(),
            study_parent_part_uid: parent.map(str::to_owned),
            ..Default::default()
        };
        let uid = uid.to_owned();
        StudyDefinition::from_initial_values(
            move || uid,
            values,
            &ReferencePorts::assume_valid(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_study_number_taken_by_other_study_only() {
        let index = StudyIndex::from_studies(&[study("a", "0001", "Alpha", None)]);

        assert!(index.is_taken("0001", Some("b")));
        assert!(index.is_taken("0001", None));
        assert!(!index.is_taken("0001", Some("a")));
        assert!(!index.is_taken("0002", None));
    }

    #[test]
    fn test_subparts_and_deleted_studies_are_not_indexed_for_numbers() {
        let mut deleted = study("d", "0003", "Gone", None);
        deleted.mark_deleted().unwrap();
        let index = StudyIndex::from_studies(&[study("s", "0001", "Sub", Some("a")), deleted]);

        assert_eq!(index.len(), 1);
        assert!(!index.is_taken("0001", None));
        assert!(!index.is_taken("0003", None));
    }

    #[test]
    fn test_titles_taken_by_study_with_other_number() {
        let index = StudyIndex::from_studies(&[study("a", "0001", "Alpha", None)]);
        let titles = index.title_lookup();
        let short_titles = index.short_title_lookup();

        assert!(titles.is_taken("Alpha", Some("0002")));
        assert!(!titles.is_taken("Alpha", Some("0001")));
        assert!(short_titles.is_taken("Alpha short", None));
        assert!(!short_titles.is_taken("Beta short", None));
    }
}
