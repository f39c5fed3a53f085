//! File system helpers shared by the file-backed repository.

use crate::{StudyError, StudyResult};
use crate::constants::UID_ALLOCATION_ATTEMPTS;
use std::{
    fs,
    io::{self, ErrorKind},
    path::Path,
};
use study_uuid::StudyUuid;

/// Draws uids from `uid_source` until one has no sharded directory under `base_dir`.
///
/// Nothing is created; the directory is made when the study is first saved.
///
/// # Errors
///
/// Returns `StudyError::StudyDirCreation` if every attempt hits an existing directory.
pub(crate) fn allocate_uid(
    base_dir: &Path,
    mut uid_source: impl FnMut() -> StudyUuid,
) -> StudyResult<StudyUuid> {
    for _attempt in 0..UID_ALLOCATION_ATTEMPTS {
        let uid = uid_source();
        if !uid.sharded_dir(base_dir).exists() {
            return Ok(uid);
        }
    }

    Err(StudyError::StudyDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "failed to allocate a unique study directory after {UID_ALLOCATION_ATTEMPTS} attempts"
        ),
    )))
}

/// Creates a study directory and its shard parents. An existing directory is fine.
pub(crate) fn create_study_dir(dir: &Path) -> StudyResult<()> {
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(StudyError::StorageDirCreation)?;
    }

    match fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(StudyError::StudyDirCreation(e)),
    }
}

/// Writes `contents` next to `path` and renames it into place, so readers never see a partial
/// record.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> StudyResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(StudyError::FileWrite)?;
    fs::rename(&tmp, path).map_err(StudyError::FileWrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_uid_skips_existing_directories() {
        let tmp = TempDir::new().unwrap();
        let taken = StudyUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let free = StudyUuid::parse("660e8400e29b41d4a716446655440000").unwrap();
        fs::create_dir_all(taken.sharded_dir(tmp.path())).unwrap();

        let mut candidates = vec![free.clone(), taken].into_iter().rev();
        let uid = allocate_uid(tmp.path(), || candidates.next().unwrap()).unwrap();

        assert_eq!(uid, free);
        assert!(!uid.sharded_dir(tmp.path()).exists());
    }

    #[test]
    fn test_allocate_uid_gives_up() {
        let tmp = TempDir::new().unwrap();
        let taken = StudyUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        fs::create_dir_all(taken.sharded_dir(tmp.path())).unwrap();

        let mut calls = 0;
        let err = allocate_uid(tmp.path(), || {
            calls += 1;
            taken.clone()
        })
        .unwrap_err();

        assert!(matches!(err, StudyError::StudyDirCreation(_)));
        assert_eq!(calls, UID_ALLOCATION_ATTEMPTS);
    }

    #[test]
    fn test_create_study_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("55").join("0e").join("study");

        create_study_dir(&dir).unwrap();
        create_study_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_write_atomically_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("study.json");

        write_atomically(&path, "{\"a\":1}").unwrap();
        write_atomically(&path, "{\"a\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
