//! File-backed study repository.
//!
//! Each study lives in its own sharded directory:
//!
//! ```text
//! <study_data_dir>/studies/<s1>/<s2>/<uid>/study.json
//! ```
//!
//! where `s1`/`s2` are the first four hex characters of the uid. `study.json` wraps the snapshot
//! with the uid and a revision counter; the revision travels in the aggregate's repository
//! closure and must match on save.

use super::shared::{allocate_uid, create_study_dir, write_atomically};
use super::StudyDefinitionRepository;
use crate::aggregate::StudyDefinition;
use crate::config::CoreConfig;
use crate::constants::STUDY_JSON_FILENAME;
use crate::snapshot::StudyDefinitionSnapshot;
use crate::{StudyError, StudyResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_uuid::StudyUuid;

/// On-disk form of one study.
#[derive(Debug, Serialize, Deserialize)]
struct StoredStudy {
    uid: StudyUuid,
    revision: u64,
    snapshot: StudyDefinitionSnapshot,
}

/// Repository storing one JSON record per study under the configured data directory.
#[derive(Clone, Debug)]
pub struct FileStudyRepository {
    cfg: Arc<CoreConfig>,
}

impl FileStudyRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn studies_dir(&self) -> PathBuf {
        self.cfg.studies_dir()
    }

    fn record_path(&self, uid: &StudyUuid) -> PathBuf {
        uid.sharded_dir(&self.studies_dir()).join(STUDY_JSON_FILENAME)
    }

    fn read_record(path: &Path) -> StudyResult<StoredStudy> {
        let contents = fs::read_to_string(path).map_err(StudyError::FileRead)?;
        serde_json::from_str(&contents).map_err(StudyError::Deserialization)
    }

    fn load_record(path: &Path, uid: &StudyUuid) -> StudyResult<StudyDefinition> {
        let record = Self::read_record(path)?;
        if &record.uid != uid || record.snapshot.uid != uid.to_string() {
            return Err(StudyError::InvalidSnapshot(format!(
                "{} holds study {} (snapshot uid {})",
                path.display(),
                record.uid,
                record.snapshot.uid
            )));
        }

        let mut study = StudyDefinition::from_snapshot(record.snapshot)?;
        study.set_repository_closure(Some(record.revision));
        Ok(study)
    }

    /// Paths of every `study.json` under the shard tree.
    fn record_paths(&self) -> Vec<(StudyUuid, PathBuf)> {
        let mut paths = Vec::new();

        let s1_iter = match fs::read_dir(self.studies_dir()) {
            Ok(it) => it,
            Err(_) => return paths,
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let id_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };

                for id_ent in id_iter.flatten() {
                    let id_path = id_ent.path();
                    let record_path = id_path.join(STUDY_JSON_FILENAME);
                    if !record_path.is_file() {
                        continue;
                    }

                    let name = id_ent.file_name();
                    match StudyUuid::parse(&name.to_string_lossy()) {
                        Ok(uid) => paths.push((uid, record_path)),
                        Err(e) => {
                            tracing::warn!(
                                "skipping study directory with invalid uid: {} - {}",
                                id_path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        paths
    }
}

impl StudyDefinitionRepository for FileStudyRepository {
    fn find_by_uid(&self, uid: &str) -> StudyResult<Option<StudyDefinition>> {
        let uid = StudyUuid::parse(uid)?;
        let path = self.record_path(&uid);
        if !path.is_file() {
            return Ok(None);
        }

        tracing::debug!("loading study {} from {}", uid, path.display());
        Self::load_record(&path, &uid).map(Some)
    }

    /// Unreadable records are logged and skipped.
    fn find_all(&self) -> StudyResult<Vec<StudyDefinition>> {
        let mut studies = Vec::new();

        for (uid, path) in self.record_paths() {
            match Self::load_record(&path, &uid) {
                Ok(study) => studies.push(study),
                Err(e) => {
                    tracing::warn!("failed to load study record: {} - {}", path.display(), e);
                }
            }
        }

        studies.sort_by(|a, b| a.uid().cmp(b.uid()));
        Ok(studies)
    }

    fn save(&self, study: &mut StudyDefinition) -> StudyResult<()> {
        let uid = StudyUuid::parse(study.uid())?;
        let dir = uid.sharded_dir(&self.studies_dir());
        let path = dir.join(STUDY_JSON_FILENAME);

        let stored_revision = if path.is_file() {
            Some(Self::read_record(&path)?.revision)
        } else {
            None
        };

        if stored_revision != study.repository_closure() {
            return Err(StudyError::ConcurrentModification {
                uid: uid.to_string(),
                expected: study.repository_closure(),
                found: stored_revision,
            });
        }

        if stored_revision.is_none() {
            create_study_dir(&dir)?;
        }

        let revision = stored_revision.map_or(1, |r| r + 1);
        let record = StoredStudy {
            uid: uid.clone(),
            revision,
            snapshot: study.get_snapshot(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(StudyError::Serialization)?;
        write_atomically(&path, &json)?;

        study.set_repository_closure(Some(revision));
        tracing::debug!("saved study {} at revision {}", uid, revision);
        Ok(())
    }

    fn generate_uid(&self) -> StudyResult<String> {
        allocate_uid(&self.studies_dir(), StudyUuid::new).map(|uid| uid.to_string())
    }
}
