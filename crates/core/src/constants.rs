//! Constants used throughout the study core crate.

/// Default directory for study data storage when no explicit directory is configured.
pub const DEFAULT_STUDY_DATA_DIR: &str = "study_data";

/// Directory name (under the data directory) holding the sharded study definitions.
pub const STUDIES_DIR_NAME: &str = "studies";

/// Filename for the stored study definition record.
pub const STUDY_JSON_FILENAME: &str = "study.json";

/// Number of uid allocations tried before giving up on a free study directory.
pub const UID_ALLOCATION_ATTEMPTS: usize = 5;

/// Maximum number of digits in a study number.
pub const STUDY_NUMBER_MAX_DIGITS: usize = 4;
