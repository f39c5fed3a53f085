//! All metadata of a study at one version.

use crate::ports::ReferencePorts;
use crate::value_objects::{
    HighLevelStudyDesign, IdentificationCheck, StudyDescription, StudyIdentificationMetadata,
    StudyIntervention, StudyPopulation, StudyVersionMetadata,
};
use crate::StudyResult;

/// One version slot of a study: identification, version info, design, population,
/// intervention and description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudyMetadata {
    pub(crate) identification: StudyIdentificationMetadata,
    pub(crate) version: StudyVersionMetadata,
    pub(crate) design: HighLevelStudyDesign,
    pub(crate) population: StudyPopulation,
    pub(crate) intervention: StudyIntervention,
    pub(crate) description: StudyDescription,
}

impl StudyMetadata {
    pub fn new(
        identification: StudyIdentificationMetadata,
        version: StudyVersionMetadata,
        design: HighLevelStudyDesign,
        population: StudyPopulation,
        intervention: StudyIntervention,
        description: StudyDescription,
    ) -> Self {
        Self {
            identification,
            version,
            design,
            population,
            intervention,
            description,
        }
    }

    pub fn identification(&self) -> &StudyIdentificationMetadata {
        &self.identification
    }

    pub fn version(&self) -> &StudyVersionMetadata {
        &self.version
    }

    pub fn design(&self) -> &HighLevelStudyDesign {
        &self.design
    }

    pub fn population(&self) -> &StudyPopulation {
        &self.population
    }

    pub fn intervention(&self) -> &StudyIntervention {
        &self.intervention
    }

    pub fn description(&self) -> &StudyDescription {
        &self.description
    }

    /// Same content, different version metadata.
    pub(crate) fn with_version(&self, version: StudyVersionMetadata) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Validates every part, failing on the first error.
    ///
    /// Order: identification, version, description, design, population, intervention.
    pub fn validate(
        &self,
        ports: &ReferencePorts<'_>,
        check: IdentificationCheck<'_>,
    ) -> StudyResult<()> {
        self.identification.validate(ports, check)?;
        self.version.validate()?;
        self.description
            .validate(ports, self.identification.study_number().as_deref())?;
        self.design.validate(ports)?;
        self.population.validate(ports)?;
        self.intervention.validate(ports)
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>, check: IdentificationCheck<'_>) -> bool {
        self.validate(ports, check).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::KnownCodes;
    use crate::value_objects::{StudyStatus, VersionNumber};
    use crate::StudyError;
    use chrono::Utc;

    fn metadata() -> StudyMetadata {
        StudyMetadata::new(
            StudyIdentificationMetadata::builder()
                .project_number("P1")
                .study_number("0001")
                .build(),
            StudyVersionMetadata::draft(Utc::now(), Some("auth1")),
            HighLevelStudyDesign::builder().trial_phase_code("C15600").build(),
            StudyPopulation::default(),
            StudyIntervention::default(),
            StudyDescription::builder().study_title("Title").build(),
        )
    }

    #[test]
    fn test_valid_metadata() {
        assert!(metadata().is_valid(&ReferencePorts::assume_valid(), IdentificationCheck::default()));
    }

    #[test]
    fn test_identification_checked_before_version() {
        let bad_version = StudyVersionMetadata::builder(StudyStatus::Draft, Utc::now())
            .version_number(VersionNumber::whole(1))
            .build();
        let broken = StudyMetadata {
            identification: StudyIdentificationMetadata::default(),
            version: bad_version.clone(),
            ..metadata()
        };

        let err = broken
            .validate(&ReferencePorts::assume_valid(), IdentificationCheck::default())
            .unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("Either study number")));

        let only_version = metadata().with_version(bad_version);
        let err = only_version
            .validate(&ReferencePorts::assume_valid(), IdentificationCheck::default())
            .unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("Non-LOCKED")));
    }

    #[test]
    fn test_design_failure_surfaces() {
        let phases = KnownCodes::new(["C15601"]);
        let ports = ReferencePorts::assume_valid().trial_phase(&phases);

        let err = metadata()
            .validate(&ports, IdentificationCheck::default())
            .unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("(C15600)")));
    }
}
