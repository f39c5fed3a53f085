//! The study definition aggregate.
//!
//! A [`StudyDefinition`] owns every version slot of one study and is the only way to change
//! them:
//!
//! - one **draft** slot, the editable working copy,
//! - at most one **released** slot, the latest published snapshot,
//! - an ordered list of **locked** slots (index 0 is version 1), never altered once written,
//! - a terminal **deleted** flag.
//!
//! The study's status is not stored. It is derived from whichever slot is authoritative
//! ([`StudyDefinition::current_metadata`]): the draft if it is newer than the latest locked
//! version, otherwise that locked version.
//!
//! ```text
//!            release (stays DRAFT)
//!              +----+
//!              v    |
//!   create -> DRAFT ----- lock -----> LOCKED
//!              |  ^                     |
//!              |  +------ unlock -------+
//!              |
//!              +-- mark_deleted (no locks, no sub-parts) --> DELETED
//! ```

use crate::metadata::StudyMetadata;
use crate::ports::ReferencePorts;
use crate::value_objects::{
    HighLevelStudyDesign, IdentificationCheck, StudyDescription, StudyIdentificationMetadata,
    StudyIntervention, StudyPopulation, StudyStatus, StudyVersionMetadata, VersionNumber,
};
use crate::{StudyError, StudyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use study_uuid::VersionClock;

// ============================================================================
// Actions and requests
// ============================================================================

/// Lifecycle operation a caller may offer for a study in its current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyAction {
    Lock,
    Release,
    Unlock,
    Delete,
}

impl fmt::Display for StudyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StudyAction::Lock => "lock",
            StudyAction::Release => "release",
            StudyAction::Unlock => "unlock",
            StudyAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Content of a study being created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewStudyValues {
    pub identification: StudyIdentificationMetadata,
    pub design: HighLevelStudyDesign,
    pub population: StudyPopulation,
    pub intervention: StudyIntervention,
    pub description: StudyDescription,
    /// Set when the new study is a sub-part of another study.
    pub study_parent_part_uid: Option<String>,
}

/// Parts of the draft to replace in [`StudyDefinition::edit_metadata`]; `None` keeps a part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataChanges {
    pub identification: Option<StudyIdentificationMetadata>,
    pub design: Option<HighLevelStudyDesign>,
    pub population: Option<StudyPopulation>,
    pub intervention: Option<StudyIntervention>,
    pub description: Option<StudyDescription>,
}

impl MetadataChanges {
    pub fn is_empty(&self) -> bool {
        self.identification.is_none()
            && self.design.is_none()
            && self.population.is_none()
            && self.intervention.is_none()
            && self.description.is_none()
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// A study and all its metadata versions.
#[derive(Clone, Debug)]
pub struct StudyDefinition {
    pub(crate) uid: String,
    pub(crate) study_parent_part_uid: Option<String>,
    pub(crate) study_subpart_uids: Vec<String>,
    pub(crate) draft: Option<StudyMetadata>,
    pub(crate) released: Option<StudyMetadata>,
    pub(crate) locked: Vec<StudyMetadata>,
    pub(crate) deleted: bool,
    /// Opaque token owned by the repository. Not part of equality or snapshots.
    pub(crate) repository_closure: Option<u64>,
}

impl PartialEq for StudyDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.study_parent_part_uid == other.study_parent_part_uid
            && self.study_subpart_uids == other.study_subpart_uids
            && self.draft == other.draft
            && self.released == other.released
            && self.locked == other.locked
            && self.deleted == other.deleted
    }
}

impl Eq for StudyDefinition {}

impl StudyDefinition {
    /// Creates a new draft study.
    ///
    /// The id prefix is forced to the project number. The whole draft is validated before
    /// `generate_uid` is called, so a rejected study never consumes an identifier.
    ///
    /// # Arguments
    ///
    /// * `generate_uid` - Supplies the identifier of the new study.
    /// * `values` - Initial content.
    /// * `ports` - Existence checks for coded values.
    /// * `author` - Author recorded on the draft version.
    ///
    /// # Errors
    ///
    /// Returns the first validation or business-rule error raised by the initial content.
    pub fn from_initial_values(
        generate_uid: impl FnOnce() -> String,
        values: NewStudyValues,
        ports: &ReferencePorts<'_>,
        author: Option<&str>,
    ) -> StudyResult<Self> {
        let identification = values
            .identification
            .fix_some_values(|b| b.study_id_prefix(values.identification.project_number().clone()));

        let draft = StudyMetadata::new(
            identification,
            StudyVersionMetadata::draft(VersionClock::next_after(None), author),
            values.design,
            values.population,
            values.intervention,
            values.description,
        );

        let check = IdentificationCheck {
            uid: None,
            previous_project_number: None,
            is_subpart: values.study_parent_part_uid.is_some(),
        };
        draft.validate(ports, check)?;

        Ok(Self {
            uid: generate_uid(),
            study_parent_part_uid: values.study_parent_part_uid,
            study_subpart_uids: Vec::new(),
            draft: Some(draft),
            released: None,
            locked: Vec::new(),
            deleted: false,
            repository_closure: None,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn study_parent_part_uid(&self) -> Option<&str> {
        self.study_parent_part_uid.as_deref()
    }

    pub fn study_subpart_uids(&self) -> &[String] {
        &self.study_subpart_uids
    }

    pub fn is_subpart(&self) -> bool {
        self.study_parent_part_uid.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn repository_closure(&self) -> Option<u64> {
        self.repository_closure
    }

    pub fn set_repository_closure(&mut self, closure: Option<u64>) {
        self.repository_closure = closure;
    }

    pub fn draft_metadata(&self) -> Option<&StudyMetadata> {
        self.draft.as_ref()
    }

    pub fn released_metadata(&self) -> Option<&StudyMetadata> {
        self.released.as_ref()
    }

    pub fn latest_locked_metadata(&self) -> Option<&StudyMetadata> {
        self.locked.last()
    }

    /// Copy of the locked history, version 1 first.
    pub fn get_all_locked_versions(&self) -> Vec<StudyMetadata> {
        self.locked.clone()
    }

    /// The locked version numbered `version` (1-based).
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Validation` if no such locked version exists.
    pub fn get_specific_locked_metadata_version(
        &self,
        version: usize,
    ) -> StudyResult<&StudyMetadata> {
        version
            .checked_sub(1)
            .and_then(|index| self.locked.get(index))
            .ok_or_else(|| {
                StudyError::Validation(format!(
                    "Study with UID '{}' has no locked version with number '{}'.",
                    self.uid, version
                ))
            })
    }

    /// The authoritative "as of now" metadata.
    ///
    /// With locked history, the draft wins only if it is newer than the latest locked version.
    /// Without it, the draft wins over the released slot.
    pub fn current_metadata(&self) -> &StudyMetadata {
        if let Some(locked) = self.locked.last() {
            return match &self.draft {
                Some(draft) if draft.version.timestamp() > locked.version.timestamp() => draft,
                _ => locked,
            };
        }

        // SAFETY: construction (factory or snapshot restore) guarantees at least one slot
        self.draft
            .as_ref()
            .or(self.released.as_ref())
            .expect("study definition always holds a draft, released or locked slot")
    }

    /// Whichever of the released slot and the latest locked version is newer; locked wins ties.
    pub fn latest_released_or_locked_metadata(&self) -> Option<&StudyMetadata> {
        match (&self.released, self.locked.last()) {
            (None, locked) => locked,
            (Some(released), None) => Some(released),
            (Some(released), Some(locked)) => {
                if locked.version.timestamp() >= released.version.timestamp() {
                    Some(locked)
                } else {
                    Some(released)
                }
            }
        }
    }

    pub fn study_status(&self) -> StudyStatus {
        if self.deleted {
            return StudyStatus::Deleted;
        }
        self.current_metadata().version.status()
    }

    /// Actions a caller may offer next.
    ///
    /// Sub-parts can only be deleted, and only while they are a never-locked draft.
    pub fn get_possible_actions(&self) -> BTreeSet<StudyAction> {
        use StudyAction::*;

        let actions: &[StudyAction] = match (self.study_status(), self.is_subpart()) {
            (StudyStatus::Draft, true) if self.locked.is_empty() => &[Delete],
            (StudyStatus::Draft, false) if self.locked.is_empty() => &[Lock, Release, Delete],
            (StudyStatus::Draft | StudyStatus::Released, false) => &[Lock, Release],
            (StudyStatus::Locked, false) => &[Unlock],
            _ => &[],
        };

        actions.iter().copied().collect()
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Replaces parts of the draft.
    ///
    /// Only parts that differ from the current metadata count as changes. All changed parts are
    /// validated before any is applied, so a failed call leaves the study untouched. When
    /// something changed, the draft gets a fresh timestamp and `author`.
    ///
    /// Identification rules:
    /// - before the first lock, the id prefix follows the (new) project number;
    /// - after it, the id prefix is frozen and a top-level study keeps its study number; asking
    ///   for a different number is rejected;
    /// - a project number different from the current one must be known to the project port.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Validation` if the study is not a draft, if `changes` is empty, or if a
    /// changed part fails validation. A study number already in use is a
    /// `StudyError::BusinessLogic`.
    pub fn edit_metadata(
        &mut self,
        changes: MetadataChanges,
        ports: &ReferencePorts<'_>,
        author: Option<&str>,
    ) -> StudyResult<()> {
        if self.study_status() != StudyStatus::Draft {
            return Err(StudyError::Validation(self.not_in_state("DRAFT")));
        }

        if changes.is_empty() {
            return Err(StudyError::Validation(
                "No data to patch was provided.".into(),
            ));
        }

        let current = self.current_metadata();
        let mut next = current.clone();
        let mut changed = false;

        if let Some(identification) = changes.identification {
            let identification = self.carry_over_identification(identification)?;
            if identification != current.identification {
                let check = IdentificationCheck {
                    uid: Some(&self.uid),
                    previous_project_number: current.identification.project_number().as_deref(),
                    is_subpart: self.is_subpart(),
                };
                identification.validate(ports, check)?;
                next.identification = identification;
                changed = true;
            }
        }

        if let Some(design) = changes.design.filter(|d| *d != current.design) {
            design.validate(ports)?;
            next.design = design;
            changed = true;
        }

        if let Some(population) = changes.population.filter(|p| *p != current.population) {
            population.validate(ports)?;
            next.population = population;
            changed = true;
        }

        if let Some(intervention) = changes.intervention.filter(|i| *i != current.intervention) {
            intervention.validate(ports)?;
            next.intervention = intervention;
            changed = true;
        }

        if let Some(description) = changes.description.filter(|d| *d != current.description) {
            description.validate(ports, next.identification.study_number().as_deref())?;
            next.description = description;
            changed = true;
        }

        if changed {
            let version = StudyVersionMetadata::draft(self.next_timestamp(), author);
            self.draft = Some(next.with_version(version));
        }

        Ok(())
    }

    /// Publishes the current metadata as the released version.
    ///
    /// The draft keeps its content and gets a fresh timestamp; the released slot is replaced by
    /// a copy carrying the same timestamp and the next release number (previous + 0.1).
    ///
    /// # Errors
    ///
    /// Returns `StudyError::BusinessLogic` if the study is not a draft.
    pub fn release(
        &mut self,
        change_description: Option<&str>,
        author: Option<&str>,
    ) -> StudyResult<()> {
        if self.study_status() != StudyStatus::Draft {
            return Err(StudyError::BusinessLogic(self.not_in_state("DRAFT")));
        }

        let current = self.current_metadata().clone();
        let timestamp = self.next_timestamp();
        let number = VersionNumber::next_release(
            self.released
                .as_ref()
                .and_then(|released| released.version.version_number()),
        );

        let released = StudyVersionMetadata::builder(StudyStatus::Released, timestamp)
            .author(author.map(str::to_owned))
            .description(change_description.map(str::to_owned))
            .version_number(number)
            .build();

        self.draft = Some(current.with_version(StudyVersionMetadata::draft(timestamp, author)));
        self.released = Some(current.with_version(released));
        Ok(())
    }

    /// Locks the current metadata as the next whole version.
    ///
    /// Version number is `locked versions + 1`. The released slot is replaced by the same
    /// content under the same number and timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::BusinessLogic` if the study is not a draft, or if a top-level study
    /// lacks a study number or title. Returns `StudyError::Validation` if `change_description` or
    /// `author` is blank.
    pub fn lock(&mut self, change_description: &str, author: &str) -> StudyResult<()> {
        if self.study_status() != StudyStatus::Draft {
            return Err(StudyError::BusinessLogic(self.not_in_state("DRAFT")));
        }

        let current = self.current_metadata().clone();
        if !self.is_subpart()
            && (current.identification.study_number().is_none()
                || current.description.study_title().is_none())
        {
            return Err(StudyError::BusinessLogic(
                "Both study number and study title must be set before locking.".into(),
            ));
        }

        let next_version = u32::try_from(self.locked.len() + 1).map_err(|_| {
            StudyError::BusinessLogic(format!("Study {}: too many locked versions", self.uid))
        })?;

        let locked = StudyVersionMetadata::builder(StudyStatus::Locked, self.next_timestamp())
            .author(author)
            .description(change_description)
            .version_number(VersionNumber::whole(next_version))
            .build();
        locked.validate()?;

        let released = locked.fix_some_values(|b| b.status(StudyStatus::Released));
        self.released = Some(current.with_version(released));
        self.locked.push(current.with_version(locked));
        Ok(())
    }

    /// Opens a new draft copied from the latest locked version.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::BusinessLogic` if the study is not locked.
    pub fn unlock(&mut self, author: Option<&str>) -> StudyResult<()> {
        if self.study_status() != StudyStatus::Locked {
            return Err(StudyError::BusinessLogic(self.not_in_state("LOCKED")));
        }

        let current = self.current_metadata().clone();
        let version = StudyVersionMetadata::draft(self.next_timestamp(), author);
        self.draft = Some(current.with_version(version));
        Ok(())
    }

    /// Marks the study deleted. Deletion is terminal.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::BusinessLogic` if the study is already deleted, has locked versions,
    /// or has sub-part studies.
    pub fn mark_deleted(&mut self) -> StudyResult<()> {
        if self.deleted {
            return Err(StudyError::BusinessLogic(format!(
                "Study {}: already deleted.",
                self.uid
            )));
        }

        if !self.locked.is_empty() {
            return Err(StudyError::BusinessLogic(format!(
                "Study {}: cannot delete a StudyDefinition having some locked versions.",
                self.uid
            )));
        }

        if !self.study_subpart_uids.is_empty() {
            return Err(StudyError::BusinessLogic(format!(
                "Study {}: cannot delete a Study having Study Subparts: [{}].",
                self.uid,
                self.study_subpart_uids.join(", ")
            )));
        }

        self.deleted = true;
        if let Some(draft) = self.draft.take() {
            let version = draft
                .version
                .fix_some_values(|b| b.status(StudyStatus::Deleted));
            self.draft = Some(draft.with_version(version));
        }
        Ok(())
    }

    /// Records `subpart_uid` as a sub-part study of this one.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::BusinessLogic` if this study is deleted or is itself a sub-part.
    pub fn add_study_subpart(&mut self, subpart_uid: &str) -> StudyResult<()> {
        if self.deleted {
            return Err(StudyError::BusinessLogic(format!(
                "Study {}: cannot add a Study Subpart to a deleted study.",
                self.uid
            )));
        }

        if self.is_subpart() {
            return Err(StudyError::BusinessLogic(format!(
                "Study {}: a Study Subpart cannot have Study Subparts of its own.",
                self.uid
            )));
        }

        if !self.study_subpart_uids.iter().any(|uid| uid == subpart_uid) {
            self.study_subpart_uids.push(subpart_uid.to_owned());
        }
        Ok(())
    }

    /// Forgets a sub-part study; returns whether it was recorded.
    pub fn remove_study_subpart(&mut self, subpart_uid: &str) -> bool {
        let before = self.study_subpart_uids.len();
        self.study_subpart_uids.retain(|uid| uid != subpart_uid);
        self.study_subpart_uids.len() != before
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn not_in_state(&self, state: &str) -> String {
        format!("Study with UID '{}' isn't in {} state.", self.uid, state)
    }

    fn slots(&self) -> impl Iterator<Item = &StudyMetadata> {
        self.draft
            .iter()
            .chain(self.released.iter())
            .chain(self.locked.iter())
    }

    /// A timestamp newer than every slot this study holds.
    fn next_timestamp(&self) -> DateTime<Utc> {
        VersionClock::next_after_all(self.slots().map(|slot| slot.version.timestamp()))
    }

    /// Applies id-prefix and study-number carry-over to a requested identification.
    fn carry_over_identification(
        &self,
        requested: StudyIdentificationMetadata,
    ) -> StudyResult<StudyIdentificationMetadata> {
        if self.locked.is_empty() {
            let prefix = requested.project_number().clone();
            return Ok(requested.fix_some_values(|b| b.study_id_prefix(prefix)));
        }

        let current = &self.current_metadata().identification;
        let prefix = current.study_id_prefix().clone();

        if self.is_subpart() {
            return Ok(requested.fix_some_values(|b| b.study_id_prefix(prefix)));
        }

        if let Some(number) = requested.study_number() {
            if Some(number) != current.study_number().as_ref() {
                return Err(StudyError::Validation(format!(
                    "Study number of a locked study cannot be changed ({number})."
                )));
            }
        }

        let number = current.study_number().clone();
        Ok(requested.fix_some_values(|b| b.study_id_prefix(prefix).study_number(number)))
    }
}
