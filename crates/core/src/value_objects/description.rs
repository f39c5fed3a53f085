use crate::ports::{ReferencePorts, TitleLookup};
use crate::{StudyError, StudyResult};

value_object! {
    /// Title and short title of a study.
    pub struct StudyDescription builds StudyDescriptionBuilder {
        study_title: Option<String>,
        study_short_title: Option<String>,
    }
}

impl StudyDescription {
    /// Titles must not already belong to a study with a different study number.
    ///
    /// # Arguments
    ///
    /// * `ports` - Supplies the title and short-title lookups.
    /// * `study_number` - Study number of the study owning this description.
    pub fn validate(
        &self,
        ports: &ReferencePorts<'_>,
        study_number: Option<&str>,
    ) -> StudyResult<()> {
        if let Some(title) = self.study_title.as_deref() {
            if ports.study_title.is_taken(title, study_number) {
                return Err(StudyError::Validation(format!(
                    "Study title already exists ({title})"
                )));
            }
        }

        if let Some(short_title) = self.study_short_title.as_deref() {
            if ports.study_short_title.is_taken(short_title, study_number) {
                return Err(StudyError::Validation(format!(
                    "Study short title already exists ({short_title})"
                )));
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>, study_number: Option<&str>) -> bool {
        self.validate(ports, study_number).is_ok()
    }
}
