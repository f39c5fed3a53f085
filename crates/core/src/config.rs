//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. The
//! libraries never read environment variables themselves; the binary does that and hands the
//! resolved values to [`CoreConfig::new`].

use crate::constants::{DEFAULT_STUDY_DATA_DIR, STUDIES_DIR_NAME};
use crate::{StudyError, StudyResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    study_data_dir: PathBuf,
    reference_data_file: Option<PathBuf>,
    field_config_file: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidConfig` if the data directory is empty, or if an optional file
    /// is given but does not exist.
    pub fn new(
        study_data_dir: PathBuf,
        reference_data_file: Option<PathBuf>,
        field_config_file: Option<PathBuf>,
    ) -> StudyResult<Self> {
        if study_data_dir.as_os_str().is_empty() {
            return Err(StudyError::InvalidConfig(
                "study_data_dir cannot be empty".into(),
            ));
        }

        for file in [&reference_data_file, &field_config_file].into_iter().flatten() {
            if !file.is_file() {
                return Err(StudyError::InvalidConfig(format!(
                    "configured file does not exist: {}",
                    file.display()
                )));
            }
        }

        Ok(Self {
            study_data_dir,
            reference_data_file,
            field_config_file,
        })
    }

    pub fn study_data_dir(&self) -> &Path {
        &self.study_data_dir
    }

    pub fn studies_dir(&self) -> PathBuf {
        self.study_data_dir.join(STUDIES_DIR_NAME)
    }

    pub fn reference_data_file(&self) -> Option<&Path> {
        self.reference_data_file.as_deref()
    }

    pub fn field_config_file(&self) -> Option<&Path> {
        self.field_config_file.as_deref()
    }
}

/// Resolve the study data directory from an optional raw value.
///
/// If `value` is `None` or blank, returns [`DEFAULT_STUDY_DATA_DIR`].
pub fn study_data_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STUDY_DATA_DIR))
}

/// Resolve an optional file path from a raw value; blank values count as unset.
pub fn optional_path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
