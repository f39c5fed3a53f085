#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("business rule violated: {0}")]
    BusinessLogic(String),
    #[error("study not found: {0}")]
    NotFound(String),
    #[error(
        "study {uid} was modified concurrently (expected revision {expected:?}, found {found:?})"
    )]
    ConcurrentModification {
        uid: String,
        expected: Option<u64>,
        found: Option<u64>,
    },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create study directory: {0}")]
    StudyDirCreation(std::io::Error),
    #[error("failed to write study file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read study file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize study: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize study: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),

    #[error("invalid study uid: {0}")]
    Uid(#[from] study_uuid::UuidError),
}

/// Caller-side classification of a [`StudyError`].
///
/// The aggregate behaves the same for every kind; the split only exists so outer layers can map
/// errors to responses (rejected request, conflicting state, missing record, broken storage).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    NotFound,
    Conflict,
    Infrastructure,
}

impl StudyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudyError::Validation(_) | StudyError::Uid(_) => ErrorKind::Validation,
            StudyError::BusinessLogic(_) => ErrorKind::BusinessRule,
            StudyError::NotFound(_) => ErrorKind::NotFound,
            StudyError::ConcurrentModification { .. } => ErrorKind::Conflict,
            StudyError::InvalidSnapshot(_)
            | StudyError::InvalidConfig(_)
            | StudyError::StorageDirCreation(_)
            | StudyError::StudyDirCreation(_)
            | StudyError::FileWrite(_)
            | StudyError::FileRead(_)
            | StudyError::Serialization(_)
            | StudyError::Deserialization(_)
            | StudyError::YamlSerialization(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_business_rule(&self) -> bool {
        self.kind() == ErrorKind::BusinessRule
    }
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(StudyError::Validation("x".into()).is_validation());
        assert!(StudyError::BusinessLogic("x".into()).is_business_rule());
        assert_eq!(StudyError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            StudyError::ConcurrentModification {
                uid: "x".into(),
                expected: Some(1),
                found: Some(2),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            StudyError::InvalidSnapshot("x".into()).kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn test_messages_carry_detail() {
        let err = StudyError::Validation("No data to patch was provided.".into());
        assert_eq!(
            err.to_string(),
            "validation error: No data to patch was provided."
        );
    }
}
