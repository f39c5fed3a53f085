//! Application service driving study definitions through a repository.
//!
//! Every lifecycle call follows the same shape: load the aggregate, run one operation with the
//! configured ports, save. Uniqueness ports are answered from the studies stored at the time of
//! the call; code-existence ports from the reference catalogue.

use crate::aggregate::{MetadataChanges, NewStudyValues, StudyAction, StudyDefinition};
use crate::config::CoreConfig;
use crate::field_config::{FieldConfiguration, FieldGroup};
use crate::metadata::StudyMetadata;
use crate::reference_data::ReferenceCatalogue;
use crate::repositories::file::FileStudyRepository;
use crate::repositories::{StudyDefinitionRepository, StudyIndex};
use crate::snapshot::StudyMetadataSnapshot;
use crate::{StudyError, StudyResult};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Study lifecycle operations over a repository.
#[derive(Debug)]
pub struct StudyService<R> {
    repo: R,
    catalogue: ReferenceCatalogue,
    fields: FieldConfiguration,
}

impl StudyService<FileStudyRepository> {
    /// File-backed service for `cfg`, loading the configured reference data and field table.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured reference-data or field-configuration file cannot be
    /// read or parsed.
    pub fn from_config(cfg: Arc<CoreConfig>) -> StudyResult<Self> {
        let catalogue = match cfg.reference_data_file() {
            Some(path) => ReferenceCatalogue::load(path)?,
            None => ReferenceCatalogue::default(),
        };
        let fields = match cfg.field_config_file() {
            Some(path) => FieldConfiguration::load(path)?,
            None => FieldConfiguration::default(),
        };

        Ok(Self::new(FileStudyRepository::new(cfg), catalogue, fields))
    }
}

impl<R: StudyDefinitionRepository> StudyService<R> {
    pub fn new(repo: R, catalogue: ReferenceCatalogue, fields: FieldConfiguration) -> Self {
        Self {
            repo,
            catalogue,
            fields,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn field_configuration(&self) -> &FieldConfiguration {
        &self.fields
    }

    /// Creates and stores a new draft study.
    ///
    /// A sub-part study is recorded on its parent, which is saved before the new study.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::NotFound` if the requested parent study does not exist, and
    /// `StudyError::BusinessLogic` if it cannot take sub-parts.
    pub fn create(
        &self,
        values: NewStudyValues,
        author: Option<&str>,
    ) -> StudyResult<StudyDefinition> {
        let index = StudyIndex::from_studies(&self.repo.find_all()?);
        let titles = index.title_lookup();
        let short_titles = index.short_title_lookup();
        let ports = self
            .catalogue
            .ports()
            .study_number(&index)
            .study_title(&titles)
            .study_short_title(&short_titles);

        let mut parent = values
            .study_parent_part_uid
            .as_deref()
            .map(|parent_uid| self.get(parent_uid))
            .transpose()?;

        let uid = self.repo.generate_uid()?;
        let mut study =
            StudyDefinition::from_initial_values(move || uid, values, &ports, author)?;

        if let Some(parent) = parent.as_mut() {
            parent.add_study_subpart(study.uid())?;
            self.repo.save(parent)?;
        }
        self.repo.save(&mut study)?;

        let id = study.current_metadata().identification();
        tracing::info!(
            "created study {} ({})",
            study.uid(),
            id.study_id()
                .or_else(|| id.study_acronym().clone())
                .unwrap_or_else(|| "no study id".into())
        );
        Ok(study)
    }

    /// Loads a study.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::NotFound` if no study has this uid.
    pub fn get(&self, uid: &str) -> StudyResult<StudyDefinition> {
        self.repo
            .find_by_uid(uid)?
            .ok_or_else(|| StudyError::NotFound(uid.to_owned()))
    }

    pub fn list(&self) -> StudyResult<Vec<StudyDefinition>> {
        self.repo.find_all()
    }

    pub fn edit(
        &self,
        uid: &str,
        changes: MetadataChanges,
        author: Option<&str>,
    ) -> StudyResult<StudyDefinition> {
        // The study itself is in the index; the ports exclude it by uid and study number.
        let index = StudyIndex::from_studies(&self.repo.find_all()?);
        let titles = index.title_lookup();
        let short_titles = index.short_title_lookup();
        let ports = self
            .catalogue
            .ports()
            .study_number(&index)
            .study_title(&titles)
            .study_short_title(&short_titles);

        self.mutate(uid, "edited", |study| {
            study.edit_metadata(changes, &ports, author)
        })
    }

    /// Edits individual fields by their flat record name, e.g. `trial_phase_code`.
    ///
    /// Values are JSON; `null` clears a field. Only the value objects touched by `assignments`
    /// are replaced.
    pub fn edit_fields(
        &self,
        uid: &str,
        assignments: &Map<String, Value>,
        author: Option<&str>,
    ) -> StudyResult<StudyDefinition> {
        let study = self.get(uid)?;
        let changes = self.changes_from_fields(study.current_metadata(), assignments)?;
        self.edit(uid, changes, author)
    }

    /// Applies flat field assignments to `current` and keeps the parts that actually changed.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Validation` for a field missing from the field configuration, a
    /// version field, or a value of the wrong type.
    pub fn changes_from_fields(
        &self,
        current: &StudyMetadata,
        assignments: &Map<String, Value>,
    ) -> StudyResult<MetadataChanges> {
        for name in assignments.keys() {
            let item = self
                .fields
                .items()
                .iter()
                .find(|item| item.study_field_name() == name)
                .ok_or_else(|| StudyError::Validation(format!("Unknown study field ({name}).")))?;
            if item.study_field_grouping() == "version" {
                return Err(StudyError::Validation(format!(
                    "Field {name} is maintained by the study lifecycle and cannot be edited."
                )));
            }
        }

        let record = StudyMetadataSnapshot::from_metadata(current);
        let mut value = serde_json::to_value(record).map_err(StudyError::Serialization)?;
        if let Value::Object(fields) = &mut value {
            fields.extend(assignments.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let record: StudyMetadataSnapshot =
            serde_path_to_error::deserialize(value).map_err(|e| {
                StudyError::Validation(format!("Invalid value for {}: {}", e.path(), e.inner()))
            })?;
        let edited = record.into_metadata(current.version().status())?;

        fn changed<T: Clone + PartialEq>(old: &T, new: &T) -> Option<T> {
            (old != new).then(|| new.clone())
        }

        Ok(MetadataChanges {
            identification: changed(current.identification(), edited.identification()),
            design: changed(current.design(), edited.design()),
            population: changed(current.population(), edited.population()),
            intervention: changed(current.intervention(), edited.intervention()),
            description: changed(current.description(), edited.description()),
        })
    }

    pub fn release(
        &self,
        uid: &str,
        change_description: Option<&str>,
        author: Option<&str>,
    ) -> StudyResult<StudyDefinition> {
        self.mutate(uid, "released", |study| {
            study.release(change_description, author)
        })
    }

    pub fn lock(
        &self,
        uid: &str,
        change_description: &str,
        author: &str,
    ) -> StudyResult<StudyDefinition> {
        self.mutate(uid, "locked", |study| study.lock(change_description, author))
    }

    pub fn unlock(&self, uid: &str, author: Option<&str>) -> StudyResult<StudyDefinition> {
        self.mutate(uid, "unlocked", |study| study.unlock(author))
    }

    /// Deletes a study. A deleted sub-part is dropped from its parent's sub-part list.
    pub fn delete(&self, uid: &str) -> StudyResult<StudyDefinition> {
        let study = self.mutate(uid, "deleted", StudyDefinition::mark_deleted)?;

        if let Some(parent_uid) = study.study_parent_part_uid() {
            match self.repo.find_by_uid(parent_uid)? {
                Some(mut parent) => {
                    if parent.remove_study_subpart(uid) {
                        self.repo.save(&mut parent)?;
                    }
                }
                None => tracing::warn!("parent study {} of {} is missing", parent_uid, uid),
            }
        }
        Ok(study)
    }

    pub fn possible_actions(&self, uid: &str) -> StudyResult<BTreeSet<StudyAction>> {
        Ok(self.get(uid)?.get_possible_actions())
    }

    /// The locked version numbered `version` (1-based).
    pub fn locked_version(&self, uid: &str, version: usize) -> StudyResult<StudyMetadata> {
        let study = self.get(uid)?;
        study.get_specific_locked_metadata_version(version).cloned()
    }

    /// Flat field view of a study's current metadata, grouped by value object.
    pub fn field_view(&self, uid: &str) -> StudyResult<Vec<FieldGroup>> {
        let study = self.get(uid)?;
        let record = StudyMetadataSnapshot::from_metadata(study.current_metadata());
        self.fields.flatten_record(&record)
    }

    fn mutate(
        &self,
        uid: &str,
        action: &str,
        op: impl FnOnce(&mut StudyDefinition) -> StudyResult<()>,
    ) -> StudyResult<StudyDefinition> {
        let mut study = self.get(uid)?;
        op(&mut study)?;
        self.repo.save(&mut study)?;

        tracing::info!("{} study {} (now {})", action, uid, study.study_status());
        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Fallback;
    use crate::repositories::memory::InMemoryStudyRepository;
    use crate::value_objects::{
        HighLevelStudyDesign, StudyDescription, StudyIdentificationMetadata, StudyStatus,
    };
    use tempfile::TempDir;

    fn service() -> StudyService<InMemoryStudyRepository> {
        StudyService::new(
            InMemoryStudyRepository::new(),
            ReferenceCatalogue::default(),
            FieldConfiguration::default(),
        )
    }

    fn values(number: &str, title: &str) -> NewStudyValues {
        NewStudyValues {
            identification: StudyIdentificationMetadata::builder()
                .study_number(number)
                .study_acronym("A1")
                .project_number("P1")
                .build(),
            description: StudyDescription::builder().study_title(title).build(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let service = service();
        let study = service.create(values("0000", "First"), Some("auth0")).unwrap();
        let uid = study.uid().to_owned();

        service.release(&uid, Some("r1"), Some("auth1")).unwrap();
        let locked = service.lock(&uid, "first lock", "auth1").unwrap();
        assert_eq!(locked.study_status(), StudyStatus::Locked);

        let unlocked = service.unlock(&uid, Some("auth2")).unwrap();
        assert_eq!(unlocked.study_status(), StudyStatus::Draft);

        let v1 = service.locked_version(&uid, 1).unwrap();
        assert_eq!(v1.version().description(), Some("first lock"));
        assert!(service.locked_version(&uid, 2).is_err());

        let err = service.delete(&uid).unwrap_err();
        assert!(err.is_business_rule());
    }

    #[test]
    fn test_create_rejects_taken_study_number() {
        let service = service();
        service.create(values("0001", "First"), None).unwrap();

        let err = service.create(values("0001", "Second"), None).unwrap_err();
        assert!(matches!(err, StudyError::BusinessLogic(msg)
            if msg == "The following study number already exists in the database (0001)"));
        assert_eq!(service.repository().len(), 1);
    }

    #[test]
    fn test_create_rejects_taken_title() {
        let service = service();
        service.create(values("0001", "Shared title"), None).unwrap();

        let err = service
            .create(values("0002", "Shared title"), None)
            .unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("Study title already exists")));
    }

    #[test]
    fn test_edit_does_not_collide_with_itself() {
        let service = service();
        let study = service.create(values("0001", "First"), None).unwrap();

        let changes = MetadataChanges {
            identification: Some(
                study
                    .current_metadata()
                    .identification()
                    .fix_some_values(|b| b.study_acronym("A2")),
            ),
            ..Default::default()
        };
        let edited = service.edit(study.uid(), changes, Some("auth1")).unwrap();
        assert_eq!(
            edited
                .current_metadata()
                .identification()
                .study_acronym()
                .as_deref(),
            Some("A2")
        );
    }

    #[test]
    fn test_edit_fields_replaces_touched_parts_only() {
        let service = service();
        let study = service.create(values("0001", "First"), None).unwrap();

        let mut assignments = Map::new();
        assignments.insert("trial_phase_code".into(), serde_json::json!("C15600"));
        assignments.insert("is_extension_trial".into(), serde_json::json!(false));
        let changes = service
            .changes_from_fields(study.current_metadata(), &assignments)
            .unwrap();
        assert!(changes.design.is_some());
        assert!(changes.identification.is_none());
        assert!(changes.description.is_none());

        let edited = service.edit_fields(study.uid(), &assignments, None).unwrap();
        let design = edited.current_metadata().design();
        assert_eq!(design.trial_phase_code().as_deref(), Some("C15600"));
        assert_eq!(design.is_extension_trial(), &Some(false));
    }

    #[test]
    fn test_edit_fields_rejects_bad_assignments() {
        let service = service();
        let study = service.create(values("0001", "First"), None).unwrap();
        let current = study.current_metadata();

        let mut unknown = Map::new();
        unknown.insert("colour".into(), serde_json::json!("blue"));
        let err = service.changes_from_fields(current, &unknown).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg == "Unknown study field (colour)."));

        let mut version = Map::new();
        version.insert("version_author".into(), serde_json::json!("someone"));
        assert!(service.changes_from_fields(current, &version).unwrap_err().is_validation());

        let mut wrong_type = Map::new();
        wrong_type.insert("is_extension_trial".into(), serde_json::json!("yes"));
        let err = service.changes_from_fields(current, &wrong_type).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("is_extension_trial")));

        let mut same = Map::new();
        same.insert("study_title".into(), serde_json::json!("First"));
        let err = service.edit_fields(study.uid(), &same, None).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg == "No data to patch was provided."));
    }

    #[test]
    fn test_catalogue_codes_are_enforced() {
        let catalogue = ReferenceCatalogue::parse("project: [P1]\ntrial_phase: [C15600]\n").unwrap();
        assert_eq!(catalogue.unlisted(), Fallback::Reject);
        let service = StudyService::new(
            InMemoryStudyRepository::new(),
            catalogue,
            FieldConfiguration::default(),
        );
        let study = service.create(values("0001", "First"), None).unwrap();

        let changes = MetadataChanges {
            design: Some(HighLevelStudyDesign::builder().trial_phase_code("C15601").build()),
            ..Default::default()
        };
        let err = service.edit(study.uid(), changes, None).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("trial phase code provided (C15601)")));
    }

    #[test]
    fn test_missing_study_is_not_found() {
        let service = service();
        let err = service.release("nope", None, None).unwrap_err();
        assert!(matches!(err, StudyError::NotFound(uid) if uid == "nope"));
    }

    fn subpart_of(parent: &StudyDefinition, title: &str) -> NewStudyValues {
        NewStudyValues {
            study_parent_part_uid: Some(parent.uid().to_owned()),
            ..values("0001", title)
        }
    }

    #[test]
    fn test_parent_with_subpart_cannot_be_deleted() {
        let service = service();
        let parent = service.create(values("0001", "Parent"), None).unwrap();
        let child = service.create(subpart_of(&parent, "Child"), None).unwrap();

        let stored_parent = service.get(parent.uid()).unwrap();
        assert_eq!(stored_parent.study_subpart_uids(), &[child.uid().to_owned()]);

        let err = service.delete(parent.uid()).unwrap_err();
        assert!(matches!(err, StudyError::BusinessLogic(msg) if msg.contains(child.uid())));
        assert!(!service.get(parent.uid()).unwrap().is_deleted());
    }

    #[test]
    fn test_deleting_subpart_releases_parent() {
        let service = service();
        let parent = service.create(values("0001", "Parent"), None).unwrap();
        let child = service.create(subpart_of(&parent, "Child"), None).unwrap();

        service.delete(child.uid()).unwrap();
        assert!(service.get(parent.uid()).unwrap().study_subpart_uids().is_empty());

        let deleted = service.delete(parent.uid()).unwrap();
        assert!(deleted.is_deleted());
    }

    #[test]
    fn test_subpart_needs_existing_live_parent() {
        let service = service();
        let missing = NewStudyValues {
            study_parent_part_uid: Some("550e8400e29b41d4a716446655440000".into()),
            ..values("0001", "Orphan")
        };
        let err = service.create(missing, None).unwrap_err();
        assert!(matches!(err, StudyError::NotFound(uid) if uid == "550e8400e29b41d4a716446655440000"));
        assert!(service.repository().is_empty());

        let parent = service.create(values("0002", "Parent"), None).unwrap();
        service.delete(parent.uid()).unwrap();
        let err = service.create(subpart_of(&parent, "Late child"), None).unwrap_err();
        assert!(err.is_business_rule());
        assert_eq!(service.repository().len(), 1);
    }

    #[test]
    fn test_subpart_link_survives_file_storage() {
        let tmp = TempDir::new().unwrap();
        let cfg = Arc::new(CoreConfig::new(tmp.path().to_path_buf(), None, None).unwrap());
        let service = StudyService::from_config(cfg).unwrap();

        let parent = service.create(values("0001", "Parent"), None).unwrap();
        let child = service.create(subpart_of(&parent, "Child"), None).unwrap();

        let stored = service.get(parent.uid()).unwrap();
        assert_eq!(stored.study_subpart_uids(), &[child.uid().to_owned()]);
        assert_eq!(stored.repository_closure(), Some(2));
        assert!(service.delete(parent.uid()).unwrap_err().is_business_rule());
    }

    #[test]
    fn test_deleted_study_offers_no_actions() {
        let service = service();
        let study = service.create(values("0001", "First"), None).unwrap();

        service.delete(study.uid()).unwrap();
        assert!(service.possible_actions(study.uid()).unwrap().is_empty());
        assert_eq!(
            service.get(study.uid()).unwrap().study_status(),
            StudyStatus::Deleted
        );
    }

    #[test]
    fn test_field_view_of_current_metadata() {
        let service = service();
        let study = service.create(values("0001", "First"), None).unwrap();

        let groups = service.field_view(study.uid()).unwrap();
        let description = groups.iter().find(|g| g.grouping == "description").unwrap();
        assert_eq!(description.fields[0].1, serde_json::json!("First"));
    }

    #[test]
    fn test_from_config_uses_file_repository() {
        let tmp = TempDir::new().unwrap();
        let cfg = Arc::new(CoreConfig::new(tmp.path().to_path_buf(), None, None).unwrap());
        let service = StudyService::from_config(cfg.clone()).unwrap();

        let study = service.create(values("0001", "First"), None).unwrap();
        assert!(cfg.studies_dir().is_dir());
        assert_eq!(service.list().unwrap(), vec![study]);
    }
}
