//! In-memory study repository.
//!
//! Stores snapshots, not aggregates, so every load returns an independent copy exactly as a
//! persistent store would.

use super::StudyDefinitionRepository;
use crate::aggregate::StudyDefinition;
use crate::snapshot::StudyDefinitionSnapshot;
use crate::{StudyError, StudyResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use study_uuid::StudyUuid;

#[derive(Debug, Default)]
pub struct InMemoryStudyRepository {
    records: RefCell<BTreeMap<String, (u64, StudyDefinitionSnapshot)>>,
}

impl InMemoryStudyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    fn restore(revision: u64, snapshot: &StudyDefinitionSnapshot) -> StudyResult<StudyDefinition> {
        let mut study = StudyDefinition::from_snapshot(snapshot.clone())?;
        study.set_repository_closure(Some(revision));
        Ok(study)
    }
}

impl StudyDefinitionRepository for InMemoryStudyRepository {
    fn find_by_uid(&self, uid: &str) -> StudyResult<Option<StudyDefinition>> {
        self.records
            .borrow()
            .get(uid)
            .map(|(revision, snapshot)| Self::restore(*revision, snapshot))
            .transpose()
    }

    fn find_all(&self) -> StudyResult<Vec<StudyDefinition>> {
        self.records
            .borrow()
            .values()
            .map(|(revision, snapshot)| Self::restore(*revision, snapshot))
            .collect()
    }

    fn save(&self, study: &mut StudyDefinition) -> StudyResult<()> {
        let mut records = self.records.borrow_mut();
        let stored_revision = records.get(study.uid()).map(|(revision, _)| *revision);

        if stored_revision != study.repository_closure() {
            return Err(StudyError::ConcurrentModification {
                uid: study.uid().to_owned(),
                expected: study.repository_closure(),
                found: stored_revision,
            });
        }

        let revision = stored_revision.map_or(1, |r| r + 1);
        records.insert(study.uid().to_owned(), (revision, study.get_snapshot()));
        study.set_repository_closure(Some(revision));
        Ok(())
    }

    fn generate_uid(&self) -> StudyResult<String> {
        let records = self.records.borrow();
        loop {
            let uid = StudyUuid::new().to_string();
            if !records.contains_key(&uid) {
                return Ok(uid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::NewStudyValues;
    use crate::ports::ReferencePorts;
    use crate::value_objects::StudyIdentificationMetadata;

    fn new_study(repo: &InMemoryStudyRepository) -> StudyDefinition {
        let uid = repo.generate_uid().unwrap();
        let values = NewStudyValues {
            identification: StudyIdentificationMetadata::builder()
                .study_acronym("MEM")
                .project_number("P1")
                .build(),
            ..Default::default()
        };
        StudyDefinition::from_initial_values(
            move || uid,
            values,
            &ReferencePorts::assume_valid(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_loads_are_independent_copies() {
        let repo = InMemoryStudyRepository::new();
        let mut study = new_study(&repo);
        repo.save(&mut study).unwrap();

        let mut loaded = repo.find_by_uid(study.uid()).unwrap().unwrap();
        loaded.mark_deleted().unwrap();

        let again = repo.find_by_uid(study.uid()).unwrap().unwrap();
        assert!(!again.is_deleted());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_stale_and_duplicate_saves_are_rejected() {
        let repo = InMemoryStudyRepository::new();
        let mut study = new_study(&repo);
        repo.save(&mut study).unwrap();

        let mut stale = study.clone();
        repo.save(&mut study).unwrap();
        assert_eq!(study.repository_closure(), Some(2));

        let err = repo.save(&mut stale).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);

        let mut duplicate = study.clone();
        duplicate.set_repository_closure(None);
        assert!(repo.save(&mut duplicate).is_err());
    }

    #[test]
    fn test_find_all_in_uid_order() {
        let repo = InMemoryStudyRepository::new();
        for _ in 0..3 {
            let mut study = new_study(&repo);
            repo.save(&mut study).unwrap();
        }

        let uids: Vec<String> = repo
            .find_all()
            .unwrap()
            .iter()
            .map(|s| s.uid().to_owned())
            .collect();
        let mut sorted = uids.clone();
        sorted.sort();
        assert_eq!(uids, sorted);
        assert_eq!(uids.len(), 3);
    }
}
