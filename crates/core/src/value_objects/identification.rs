use super::Normalize;
use crate::ports::{CodeLookup, ReferencePorts, StudyNumberLookup};
use crate::validation::{check_null_pairs, is_valid_study_number, NullPair};
use crate::{StudyError, StudyResult};

value_object! {
    /// Identifiers of a study in external trial registries.
    ///
    /// Every identifier may be replaced by a null-value code explaining why it is missing.
    pub struct RegistryIdentifiers builds RegistryIdentifiersBuilder {
        ct_gov_id: Option<String>,
        ct_gov_id_null_value_code: Option<String>,
        eudract_id: Option<String>,
        eudract_id_null_value_code: Option<String>,
        universal_trial_number_utn: Option<String>,
        universal_trial_number_utn_null_value_code: Option<String>,
        japanese_trial_registry_id_japic: Option<String>,
        japanese_trial_registry_id_japic_null_value_code: Option<String>,
        investigational_new_drug_application_number_ind: Option<String>,
        investigational_new_drug_application_number_ind_null_value_code: Option<String>,
        eu_trial_number: Option<String>,
        eu_trial_number_null_value_code: Option<String>,
        civ_id_sin_number: Option<String>,
        civ_id_sin_number_null_value_code: Option<String>,
        national_clinical_trial_number: Option<String>,
        national_clinical_trial_number_null_value_code: Option<String>,
        japanese_trial_registry_number_jrct: Option<String>,
        japanese_trial_registry_number_jrct_null_value_code: Option<String>,
        national_medical_products_administration_nmpa_number: Option<String>,
        national_medical_products_administration_nmpa_number_null_value_code: Option<String>,
        eudamed_srn_number: Option<String>,
        eudamed_srn_number_null_value_code: Option<String>,
        investigational_device_exemption_ide_number: Option<String>,
        investigational_device_exemption_ide_number_null_value_code: Option<String>,
    }
}

impl Normalize for RegistryIdentifiers {
    fn normalize(self) -> Self {
        self
    }
}

impl RegistryIdentifiers {
    fn null_pairs(&self) -> [NullPair<'_>; 12] {
        [
            NullPair::new("ct_gov_id", &self.ct_gov_id, &self.ct_gov_id_null_value_code),
            NullPair::new("eudract_id", &self.eudract_id, &self.eudract_id_null_value_code),
            NullPair::new(
                "universal_trial_number_utn",
                &self.universal_trial_number_utn,
                &self.universal_trial_number_utn_null_value_code,
            ),
            NullPair::new(
                "japanese_trial_registry_id_japic",
                &self.japanese_trial_registry_id_japic,
                &self.japanese_trial_registry_id_japic_null_value_code,
            ),
            NullPair::new(
                "investigational_new_drug_application_number_ind",
                &self.investigational_new_drug_application_number_ind,
                &self.investigational_new_drug_application_number_ind_null_value_code,
            ),
            NullPair::new(
                "eu_trial_number",
                &self.eu_trial_number,
                &self.eu_trial_number_null_value_code,
            ),
            NullPair::new(
                "civ_id_sin_number",
                &self.civ_id_sin_number,
                &self.civ_id_sin_number_null_value_code,
            ),
            NullPair::new(
                "national_clinical_trial_number",
                &self.national_clinical_trial_number,
                &self.national_clinical_trial_number_null_value_code,
            ),
            NullPair::new(
                "japanese_trial_registry_number_jrct",
                &self.japanese_trial_registry_number_jrct,
                &self.japanese_trial_registry_number_jrct_null_value_code,
            ),
            NullPair::new(
                "national_medical_products_administration_nmpa_number",
                &self.national_medical_products_administration_nmpa_number,
                &self.national_medical_products_administration_nmpa_number_null_value_code,
            ),
            NullPair::new(
                "eudamed_srn_number",
                &self.eudamed_srn_number,
                &self.eudamed_srn_number_null_value_code,
            ),
            NullPair::new(
                "investigational_device_exemption_ide_number",
                &self.investigational_device_exemption_ide_number,
                &self.investigational_device_exemption_ide_number_null_value_code,
            ),
        ]
    }

    pub fn validate(&self, ports: &ReferencePorts<'_>) -> StudyResult<()> {
        check_null_pairs(&self.null_pairs(), ports.null_value)
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>) -> bool {
        self.validate(ports).is_ok()
    }
}

value_object! {
    /// How a study is identified: its project, number, acronyms and registry identifiers.
    ///
    /// `study_id_prefix` is owned by the aggregate, which forces it to the project number until
    /// the study is first locked and freezes it afterwards.
    pub struct StudyIdentificationMetadata builds StudyIdentificationMetadataBuilder {
        project_number: Option<String>,
        study_number: Option<String>,
        subpart_id: Option<String>,
        study_acronym: Option<String>,
        study_subpart_acronym: Option<String>,
        description: Option<String>,
        study_id_prefix: Option<String>,
        registry_identifiers: RegistryIdentifiers,
    }
}

/// Context the identification rules need beyond the object itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentificationCheck<'c> {
    /// Uid of the study being validated, if it already has one.
    pub uid: Option<&'c str>,
    /// Project number currently stored for the study; `None` for new studies.
    pub previous_project_number: Option<&'c str>,
    /// Sub-part studies share their parent's study number.
    pub is_subpart: bool,
}

impl StudyIdentificationMetadata {
    /// `"{study_id_prefix}-{study_number}"`, when both parts are set.
    pub fn study_id(&self) -> Option<String> {
        match (&self.study_id_prefix, &self.study_number) {
            (Some(prefix), Some(number)) => Some(format!("{prefix}-{number}")),
            _ => None,
        }
    }

    /// Validates identification rules.
    ///
    /// Checked in order: registry null-value pairs, presence of a study number or acronym, the
    /// study number format, existence of a new or changed project number, and uniqueness of the
    /// study number (skipped for sub-parts).
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Validation` for the first violated rule, except a study number already
    /// used by another study, which is a `StudyError::BusinessLogic`.
    pub fn validate(
        &self,
        ports: &ReferencePorts<'_>,
        check: IdentificationCheck<'_>,
    ) -> StudyResult<()> {
        self.registry_identifiers.validate(ports)?;

        if self.study_number.is_none() && self.study_acronym.is_none() {
            return Err(StudyError::Validation(
                "Either study number or study acronym must be given in study metadata.".into(),
            ));
        }

        if let Some(number) = self.study_number.as_deref() {
            if !is_valid_study_number(number) {
                return Err(StudyError::Validation(format!(
                    "Provided study number can only be up to 4 digits string ({number})."
                )));
            }
        }

        if let Some(project) = self.project_number.as_deref() {
            let changed = check.previous_project_number != Some(project);
            if changed && !ports.project.exists(project) {
                return Err(StudyError::Validation(format!(
                    "There is no project identified by provided project_number ({project})"
                )));
            }
        }

        if let Some(number) = self.study_number.as_deref() {
            if !check.is_subpart && ports.study_number.is_taken(number, check.uid) {
                return Err(StudyError::BusinessLogic(format!(
                    "The following study number already exists in the database ({number})"
                )));
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>, check: IdentificationCheck<'_>) -> bool {
        self.validate(ports, check).is_ok()
    }
}
