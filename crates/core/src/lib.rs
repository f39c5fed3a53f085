//! # Study Core
//!
//! Core business logic for study definitions.
//!
//! This crate holds the study definition aggregate and everything it needs to run:
//! - Immutable value objects for each part of a study's metadata, with their validation rules
//! - The [`StudyDefinition`] aggregate and its lifecycle (draft, release, lock, unlock, delete)
//! - Snapshots for persistence, and repositories storing them as sharded JSON files or in memory
//! - Reference-data catalogues and the field configuration table
//! - [`StudyService`], which wires repositories, ports and the aggregate together
//!
//! **No process concerns**: environment variables, logging setup and output formatting belong in
//! the `study` binary.

mod error;

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod field_config;
pub mod metadata;
pub mod ports;
pub mod reference_data;
pub mod repositories;
pub mod service;
pub mod snapshot;
pub(crate) mod validation;
pub mod value_objects;

pub use aggregate::{MetadataChanges, NewStudyValues, StudyAction, StudyDefinition};
pub use config::CoreConfig;
pub use error::{ErrorKind, StudyError, StudyResult};
pub use field_config::{FieldConfigItem, FieldConfiguration, FieldGroup};
pub use metadata::StudyMetadata;
pub use reference_data::ReferenceCatalogue;
pub use repositories::file::FileStudyRepository;
pub use repositories::memory::InMemoryStudyRepository;
pub use repositories::{StudyDefinitionRepository, StudyIndex};
pub use service::StudyService;
pub use snapshot::{StudyDefinitionSnapshot, StudyMetadataSnapshot};
