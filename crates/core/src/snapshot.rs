//! Snapshot (memento) form of a study definition.
//!
//! Repositories never see the aggregate's internals. They store a [`StudyDefinitionSnapshot`]:
//! plain data with one flat [`StudyMetadataSnapshot`] per version slot, plus the current
//! metadata and the derived status for readers that do not want to rebuild the aggregate.
//!
//! The flat field layout is described declaratively by
//! [`FieldConfiguration`](crate::field_config::FieldConfiguration); the conversions below are
//! written out per field and checked against that table in tests.

use crate::aggregate::StudyDefinition;
use crate::metadata::StudyMetadata;
use crate::value_objects::{
    HighLevelStudyDesign, RegistryIdentifiers, StudyDescription, StudyIdentificationMetadata,
    StudyIntervention, StudyPopulation, StudyStatus, StudyVersionMetadata, VersionNumber,
};
use crate::{StudyError, StudyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored form of a whole study definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyDefinitionSnapshot {
    pub uid: String,
    #[serde(default)]
    pub study_parent_part_uid: Option<String>,
    #[serde(default)]
    pub study_subpart_uids: Vec<String>,
    /// Copy of whichever slot is authoritative; redundant with the slots below.
    #[serde(default)]
    pub current_metadata: Option<StudyMetadataSnapshot>,
    #[serde(default)]
    pub draft_metadata: Option<StudyMetadataSnapshot>,
    #[serde(default)]
    pub released_metadata: Option<StudyMetadataSnapshot>,
    /// Version 1 first.
    #[serde(default)]
    pub locked_metadata_versions: Vec<StudyMetadataSnapshot>,
    #[serde(default)]
    pub study_status: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// One version slot, flattened to a single record.
///
/// Slot status is not stored here; it follows from which slot the record sits in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyMetadataSnapshot {
    // identification
    pub study_number: Option<String>,
    pub subpart_id: Option<String>,
    pub study_acronym: Option<String>,
    pub study_subpart_acronym: Option<String>,
    pub study_id_prefix: Option<String>,
    pub project_number: Option<String>,
    pub description: Option<String>,

    // identification.registry_identifiers
    pub ct_gov_id: Option<String>,
    pub ct_gov_id_null_value_code: Option<String>,
    pub eudract_id: Option<String>,
    pub eudract_id_null_value_code: Option<String>,
    pub universal_trial_number_utn: Option<String>,
    pub universal_trial_number_utn_null_value_code: Option<String>,
    pub japanese_trial_registry_id_japic: Option<String>,
    pub japanese_trial_registry_id_japic_null_value_code: Option<String>,
    pub investigational_new_drug_application_number_ind: Option<String>,
    pub investigational_new_drug_application_number_ind_null_value_code: Option<String>,
    pub eu_trial_number: Option<String>,
    pub eu_trial_number_null_value_code: Option<String>,
    pub civ_id_sin_number: Option<String>,
    pub civ_id_sin_number_null_value_code: Option<String>,
    pub national_clinical_trial_number: Option<String>,
    pub national_clinical_trial_number_null_value_code: Option<String>,
    pub japanese_trial_registry_number_jrct: Option<String>,
    pub japanese_trial_registry_number_jrct_null_value_code: Option<String>,
    pub national_medical_products_administration_nmpa_number: Option<String>,
    pub national_medical_products_administration_nmpa_number_null_value_code: Option<String>,
    pub eudamed_srn_number: Option<String>,
    pub eudamed_srn_number_null_value_code: Option<String>,
    pub investigational_device_exemption_ide_number: Option<String>,
    pub investigational_device_exemption_ide_number_null_value_code: Option<String>,

    // version
    pub version_timestamp: Option<DateTime<Utc>>,
    pub version_author: Option<String>,
    pub version_description: Option<String>,
    pub version_number: Option<VersionNumber>,

    // design
    pub study_type_code: Option<String>,
    pub study_type_null_value_code: Option<String>,
    pub trial_type_codes: Vec<String>,
    pub trial_type_null_value_code: Option<String>,
    pub trial_phase_code: Option<String>,
    pub trial_phase_null_value_code: Option<String>,
    pub is_extension_trial: Option<bool>,
    pub is_extension_trial_null_value_code: Option<String>,
    pub is_adaptive_design: Option<bool>,
    pub is_adaptive_design_null_value_code: Option<String>,
    pub study_stop_rules: Option<String>,
    pub study_stop_rules_null_value_code: Option<String>,
    pub confirmed_response_minimum_duration: Option<String>,
    pub confirmed_response_minimum_duration_null_value_code: Option<String>,
    pub post_auth_indicator: Option<bool>,
    pub post_auth_indicator_null_value_code: Option<String>,

    // population
    pub therapeutic_area_codes: Vec<String>,
    pub therapeutic_area_null_value_code: Option<String>,
    pub disease_condition_or_indication_codes: Vec<String>,
    pub disease_condition_or_indication_null_value_code: Option<String>,
    pub diagnosis_group_codes: Vec<String>,
    pub diagnosis_group_null_value_code: Option<String>,
    pub sex_of_participants_code: Option<String>,
    pub sex_of_participants_null_value_code: Option<String>,
    pub rare_disease_indicator: Option<bool>,
    pub rare_disease_indicator_null_value_code: Option<String>,
    pub healthy_subject_indicator: Option<bool>,
    pub healthy_subject_indicator_null_value_code: Option<String>,
    pub planned_minimum_age_of_subjects: Option<String>,
    pub planned_minimum_age_of_subjects_null_value_code: Option<String>,
    pub planned_maximum_age_of_subjects: Option<String>,
    pub planned_maximum_age_of_subjects_null_value_code: Option<String>,
    pub stable_disease_minimum_duration: Option<String>,
    pub stable_disease_minimum_duration_null_value_code: Option<String>,
    pub pediatric_study_indicator: Option<bool>,
    pub pediatric_study_indicator_null_value_code: Option<String>,
    pub pediatric_postmarket_study_indicator: Option<bool>,
    pub pediatric_postmarket_study_indicator_null_value_code: Option<String>,
    pub pediatric_investigation_plan_indicator: Option<bool>,
    pub pediatric_investigation_plan_indicator_null_value_code: Option<String>,
    pub relapse_criteria: Option<String>,
    pub relapse_criteria_null_value_code: Option<String>,
    pub number_of_expected_subjects: Option<u32>,
    pub number_of_expected_subjects_null_value_code: Option<String>,

    // intervention
    pub intervention_type_code: Option<String>,
    pub intervention_type_null_value_code: Option<String>,
    pub add_on_to_existing_treatments: Option<bool>,
    pub add_on_to_existing_treatments_null_value_code: Option<String>,
    pub control_type_code: Option<String>,
    pub control_type_null_value_code: Option<String>,
    pub intervention_model_code: Option<String>,
    pub intervention_model_null_value_code: Option<String>,
    pub trial_intent_types_codes: Vec<String>,
    pub trial_intent_type_null_value_code: Option<String>,
    pub is_trial_randomised: Option<bool>,
    pub is_trial_randomised_null_value_code: Option<String>,
    pub stratification_factor: Option<String>,
    pub stratification_factor_null_value_code: Option<String>,
    pub trial_blinding_schema_code: Option<String>,
    pub trial_blinding_schema_null_value_code: Option<String>,
    pub planned_study_length: Option<String>,
    pub planned_study_length_null_value_code: Option<String>,

    // description
    pub study_title: Option<String>,
    pub study_short_title: Option<String>,
}

impl StudyMetadataSnapshot {
    /// Flattens one version slot.
    pub fn from_metadata(metadata: &StudyMetadata) -> Self {
        let id = &metadata.identification;
        let reg = id.registry_identifiers();
        let ver = &metadata.version;
        let design = &metadata.design;
        let pop = &metadata.population;
        let int = &metadata.intervention;
        let desc = &metadata.description;

        Self {
            study_number: id.study_number().clone(),
            subpart_id: id.subpart_id().clone(),
            study_acronym: id.study_acronym().clone(),
            study_subpart_acronym: id.study_subpart_acronym().clone(),
            study_id_prefix: id.study_id_prefix().clone(),
            project_number: id.project_number().clone(),
            description: id.description().clone(),

            ct_gov_id: reg.ct_gov_id().clone(),
            ct_gov_id_null_value_code: reg.ct_gov_id_null_value_code().clone(),
            eudract_id: reg.eudract_id().clone(),
            eudract_id_null_value_code: reg.eudract_id_null_value_code().clone(),
            universal_trial_number_utn: reg.universal_trial_number_utn().clone(),
            universal_trial_number_utn_null_value_code: reg
                .universal_trial_number_utn_null_value_code()
                .clone(),
            japanese_trial_registry_id_japic: reg.japanese_trial_registry_id_japic().clone(),
            japanese_trial_registry_id_japic_null_value_code: reg
                .japanese_trial_registry_id_japic_null_value_code()
                .clone(),
            investigational_new_drug_application_number_ind: reg
                .investigational_new_drug_application_number_ind()
                .clone(),
            investigational_new_drug_application_number_ind_null_value_code: reg
                .investigational_new_drug_application_number_ind_null_value_code()
                .clone(),
            eu_trial_number: reg.eu_trial_number().clone(),
            eu_trial_number_null_value_code: reg.eu_trial_number_null_value_code().clone(),
            civ_id_sin_number: reg.civ_id_sin_number().clone(),
            civ_id_sin_number_null_value_code: reg.civ_id_sin_number_null_value_code().clone(),
            national_clinical_trial_number: reg.national_clinical_trial_number().clone(),
            national_clinical_trial_number_null_value_code: reg
                .national_clinical_trial_number_null_value_code()
                .clone(),
            japanese_trial_registry_number_jrct: reg.japanese_trial_registry_number_jrct().clone(),
            japanese_trial_registry_number_jrct_null_value_code: reg
                .japanese_trial_registry_number_jrct_null_value_code()
                .clone(),
            national_medical_products_administration_nmpa_number: reg
                .national_medical_products_administration_nmpa_number()
                .clone(),
            national_medical_products_administration_nmpa_number_null_value_code: reg
                .national_medical_products_administration_nmpa_number_null_value_code()
                .clone(),
            eudamed_srn_number: reg.eudamed_srn_number().clone(),
            eudamed_srn_number_null_value_code: reg.eudamed_srn_number_null_value_code().clone(),
            investigational_device_exemption_ide_number: reg
                .investigational_device_exemption_ide_number()
                .clone(),
            investigational_device_exemption_ide_number_null_value_code: reg
                .investigational_device_exemption_ide_number_null_value_code()
                .clone(),

            version_timestamp: Some(ver.timestamp()),
            version_author: ver.author().map(str::to_owned),
            version_description: ver.description().map(str::to_owned),
            version_number: ver.version_number(),

            study_type_code: design.study_type_code().clone(),
            study_type_null_value_code: design.study_type_null_value_code().clone(),
            trial_type_codes: design.trial_type_codes().clone(),
            trial_type_null_value_code: design.trial_type_null_value_code().clone(),
            trial_phase_code: design.trial_phase_code().clone(),
            trial_phase_null_value_code: design.trial_phase_null_value_code().clone(),
            is_extension_trial: *design.is_extension_trial(),
            is_extension_trial_null_value_code: design.is_extension_trial_null_value_code().clone(),
            is_adaptive_design: *design.is_adaptive_design(),
            is_adaptive_design_null_value_code: design.is_adaptive_design_null_value_code().clone(),
            study_stop_rules: design.study_stop_rules().clone(),
            study_stop_rules_null_value_code: design.study_stop_rules_null_value_code().clone(),
            confirmed_response_minimum_duration: design
                .confirmed_response_minimum_duration()
                .clone(),
            confirmed_response_minimum_duration_null_value_code: design
                .confirmed_response_minimum_duration_null_value_code()
                .clone(),
            post_auth_indicator: *design.post_auth_indicator(),
            post_auth_indicator_null_value_code: design
                .post_auth_indicator_null_value_code()
                .clone(),

            therapeutic_area_codes: pop.therapeutic_area_codes().clone(),
            therapeutic_area_null_value_code: pop.therapeutic_area_null_value_code().clone(),
            disease_condition_or_indication_codes: pop
                .disease_condition_or_indication_codes()
                .clone(),
            disease_condition_or_indication_null_value_code: pop
                .disease_condition_or_indication_null_value_code()
                .clone(),
            diagnosis_group_codes: pop.diagnosis_group_codes().clone(),
            diagnosis_group_null_value_code: pop.diagnosis_group_null_value_code().clone(),
            sex_of_participants_code: pop.sex_of_participants_code().clone(),
            sex_of_participants_null_value_code: pop.sex_of_participants_null_value_code().clone(),
            rare_disease_indicator: *pop.rare_disease_indicator(),
            rare_disease_indicator_null_value_code: pop
                .rare_disease_indicator_null_value_code()
                .clone(),
            healthy_subject_indicator: *pop.healthy_subject_indicator(),
            healthy_subject_indicator_null_value_code: pop
                .healthy_subject_indicator_null_value_code()
                .clone(),
            planned_minimum_age_of_subjects: pop.planned_minimum_age_of_subjects().clone(),
            planned_minimum_age_of_subjects_null_value_code: pop
                .planned_minimum_age_of_subjects_null_value_code()
                .clone(),
            planned_maximum_age_of_subjects: pop.planned_maximum_age_of_subjects().clone(),
            planned_maximum_age_of_subjects_null_value_code: pop
                .planned_maximum_age_of_subjects_null_value_code()
                .clone(),
            stable_disease_minimum_duration: pop.stable_disease_minimum_duration().clone(),
            stable_disease_minimum_duration_null_value_code: pop
                .stable_disease_minimum_duration_null_value_code()
                .clone(),
            pediatric_study_indicator: *pop.pediatric_study_indicator(),
            pediatric_study_indicator_null_value_code: pop
                .pediatric_study_indicator_null_value_code()
                .clone(),
            pediatric_postmarket_study_indicator: *pop.pediatric_postmarket_study_indicator(),
            pediatric_postmarket_study_indicator_null_value_code: pop
                .pediatric_postmarket_study_indicator_null_value_code()
                .clone(),
            pediatric_investigation_plan_indicator: *pop.pediatric_investigation_plan_indicator(),
            pediatric_investigation_plan_indicator_null_value_code: pop
                .pediatric_investigation_plan_indicator_null_value_code()
                .clone(),
            relapse_criteria: pop.relapse_criteria().clone(),
            relapse_criteria_null_value_code: pop.relapse_criteria_null_value_code().clone(),
            number_of_expected_subjects: *pop.number_of_expected_subjects(),
            number_of_expected_subjects_null_value_code: pop
                .number_of_expected_subjects_null_value_code()
                .clone(),

            intervention_type_code: int.intervention_type_code().clone(),
            intervention_type_null_value_code: int.intervention_type_null_value_code().clone(),
            add_on_to_existing_treatments: *int.add_on_to_existing_treatments(),
            add_on_to_existing_treatments_null_value_code: int
                .add_on_to_existing_treatments_null_value_code()
                .clone(),
            control_type_code: int.control_type_code().clone(),
            control_type_null_value_code: int.control_type_null_value_code().clone(),
            intervention_model_code: int.intervention_model_code().clone(),
            intervention_model_null_value_code: int.intervention_model_null_value_code().clone(),
            trial_intent_types_codes: int.trial_intent_types_codes().clone(),
            trial_intent_type_null_value_code: int.trial_intent_type_null_value_code().clone(),
            is_trial_randomised: *int.is_trial_randomised(),
            is_trial_randomised_null_value_code: int.is_trial_randomised_null_value_code().clone(),
            stratification_factor: int.stratification_factor().clone(),
            stratification_factor_null_value_code: int
                .stratification_factor_null_value_code()
                .clone(),
            trial_blinding_schema_code: int.trial_blinding_schema_code().clone(),
            trial_blinding_schema_null_value_code: int
                .trial_blinding_schema_null_value_code()
                .clone(),
            planned_study_length: int.planned_study_length().clone(),
            planned_study_length_null_value_code: int
                .planned_study_length_null_value_code()
                .clone(),

            study_title: desc.study_title().clone(),
            study_short_title: desc.study_short_title().clone(),
        }
    }

    /// Rebuilds one version slot, giving its version metadata `status`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidSnapshot` if the record has no version timestamp.
    pub fn into_metadata(self, status: StudyStatus) -> StudyResult<StudyMetadata> {
        let timestamp = self.version_timestamp.ok_or_else(|| {
            StudyError::InvalidSnapshot(format!("{status} record has no version_timestamp"))
        })?;

        let registry_identifiers = RegistryIdentifiers::builder()
            .ct_gov_id(self.ct_gov_id)
            .ct_gov_id_null_value_code(self.ct_gov_id_null_value_code)
            .eudract_id(self.eudract_id)
            .eudract_id_null_value_code(self.eudract_id_null_value_code)
            .universal_trial_number_utn(self.universal_trial_number_utn)
            .universal_trial_number_utn_null_value_code(
                self.universal_trial_number_utn_null_value_code,
            )
            .japanese_trial_registry_id_japic(self.japanese_trial_registry_id_japic)
            .japanese_trial_registry_id_japic_null_value_code(
                self.japanese_trial_registry_id_japic_null_value_code,
            )
            .investigational_new_drug_application_number_ind(
                self.investigational_new_drug_application_number_ind,
            )
            .investigational_new_drug_application_number_ind_null_value_code(
                self.investigational_new_drug_application_number_ind_null_value_code,
            )
            .eu_trial_number(self.eu_trial_number)
            .eu_trial_number_null_value_code(self.eu_trial_number_null_value_code)
            .civ_id_sin_number(self.civ_id_sin_number)
            .civ_id_sin_number_null_value_code(self.civ_id_sin_number_null_value_code)
            .national_clinical_trial_number(self.national_clinical_trial_number)
            .national_clinical_trial_number_null_value_code(
                self.national_clinical_trial_number_null_value_code,
            )
            .japanese_trial_registry_number_jrct(self.japanese_trial_registry_number_jrct)
            .japanese_trial_registry_number_jrct_null_value_code(
                self.japanese_trial_registry_number_jrct_null_value_code,
            )
            .national_medical_products_administration_nmpa_number(
                self.national_medical_products_administration_nmpa_number,
            )
            .national_medical_products_administration_nmpa_number_null_value_code(
                self.national_medical_products_administration_nmpa_number_null_value_code,
            )
            .eudamed_srn_number(self.eudamed_srn_number)
            .eudamed_srn_number_null_value_code(self.eudamed_srn_number_null_value_code)
            .investigational_device_exemption_ide_number(
                self.investigational_device_exemption_ide_number,
            )
            .investigational_device_exemption_ide_number_null_value_code(
                self.investigational_device_exemption_ide_number_null_value_code,
            )
            .build();

        let identification = StudyIdentificationMetadata::builder()
            .study_number(self.study_number)
            .subpart_id(self.subpart_id)
            .study_acronym(self.study_acronym)
            .study_subpart_acronym(self.study_subpart_acronym)
            .study_id_prefix(self.study_id_prefix)
            .project_number(self.project_number)
            .description(self.description)
            .registry_identifiers(registry_identifiers)
            .build();

        let version = StudyVersionMetadata::builder(status, timestamp)
            .author(self.version_author)
            .description(self.version_description)
            .version_number(self.version_number)
            .build();

        let design = HighLevelStudyDesign::builder()
            .study_type_code(self.study_type_code)
            .study_type_null_value_code(self.study_type_null_value_code)
            .trial_type_codes(self.trial_type_codes)
            .trial_type_null_value_code(self.trial_type_null_value_code)
            .trial_phase_code(self.trial_phase_code)
            .trial_phase_null_value_code(self.trial_phase_null_value_code)
            .is_extension_trial(self.is_extension_trial)
            .is_extension_trial_null_value_code(self.is_extension_trial_null_value_code)
            .is_adaptive_design(self.is_adaptive_design)
            .is_adaptive_design_null_value_code(self.is_adaptive_design_null_value_code)
            .study_stop_rules(self.study_stop_rules)
            .study_stop_rules_null_value_code(self.study_stop_rules_null_value_code)
            .confirmed_response_minimum_duration(self.confirmed_response_minimum_duration)
            .confirmed_response_minimum_duration_null_value_code(
                self.confirmed_response_minimum_duration_null_value_code,
            )
            .post_auth_indicator(self.post_auth_indicator)
            .post_auth_indicator_null_value_code(self.post_auth_indicator_null_value_code)
            .build();

        let population = StudyPopulation::builder()
            .therapeutic_area_codes(self.therapeutic_area_codes)
            .therapeutic_area_null_value_code(self.therapeutic_area_null_value_code)
            .disease_condition_or_indication_codes(self.disease_condition_or_indication_codes)
            .disease_condition_or_indication_null_value_code(
                self.disease_condition_or_indication_null_value_code,
            )
            .diagnosis_group_codes(self.diagnosis_group_codes)
            .diagnosis_group_null_value_code(self.diagnosis_group_null_value_code)
            .sex_of_participants_code(self.sex_of_participants_code)
            .sex_of_participants_null_value_code(self.sex_of_participants_null_value_code)
            .rare_disease_indicator(self.rare_disease_indicator)
            .rare_disease_indicator_null_value_code(self.rare_disease_indicator_null_value_code)
            .healthy_subject_indicator(self.healthy_subject_indicator)
            .healthy_subject_indicator_null_value_code(
                self.healthy_subject_indicator_null_value_code,
            )
            .planned_minimum_age_of_subjects(self.planned_minimum_age_of_subjects)
            .planned_minimum_age_of_subjects_null_value_code(
                self.planned_minimum_age_of_subjects_null_value_code,
            )
            .planned_maximum_age_of_subjects(self.planned_maximum_age_of_subjects)
            .planned_maximum_age_of_subjects_null_value_code(
                self.planned_maximum_age_of_subjects_null_value_code,
            )
            .stable_disease_minimum_duration(self.stable_disease_minimum_duration)
            .stable_disease_minimum_duration_null_value_code(
                self.stable_disease_minimum_duration_null_value_code,
            )
            .pediatric_study_indicator(self.pediatric_study_indicator)
            .pediatric_study_indicator_null_value_code(
                self.pediatric_study_indicator_null_value_code,
            )
            .pediatric_postmarket_study_indicator(self.pediatric_postmarket_study_indicator)
            .pediatric_postmarket_study_indicator_null_value_code(
                self.pediatric_postmarket_study_indicator_null_value_code,
            )
            .pediatric_investigation_plan_indicator(self.pediatric_investigation_plan_indicator)
            .pediatric_investigation_plan_indicator_null_value_code(
                self.pediatric_investigation_plan_indicator_null_value_code,
            )
            .relapse_criteria(self.relapse_criteria)
            .relapse_criteria_null_value_code(self.relapse_criteria_null_value_code)
            .number_of_expected_subjects(self.number_of_expected_subjects)
            .number_of_expected_subjects_null_value_code(
                self.number_of_expected_subjects_null_value_code,
            )
            .build();

        let intervention = StudyIntervention::builder()
            .intervention_type_code(self.intervention_type_code)
            .intervention_type_null_value_code(self.intervention_type_null_value_code)
            .add_on_to_existing_treatments(self.add_on_to_existing_treatments)
            .add_on_to_existing_treatments_null_value_code(
                self.add_on_to_existing_treatments_null_value_code,
            )
            .control_type_code(self.control_type_code)
            .control_type_null_value_code(self.control_type_null_value_code)
            .intervention_model_code(self.intervention_model_code)
            .intervention_model_null_value_code(self.intervention_model_null_value_code)
            .trial_intent_types_codes(self.trial_intent_types_codes)
            .trial_intent_type_null_value_code(self.trial_intent_type_null_value_code)
            .is_trial_randomised(self.is_trial_randomised)
            .is_trial_randomised_null_value_code(self.is_trial_randomised_null_value_code)
            .stratification_factor(self.stratification_factor)
            .stratification_factor_null_value_code(self.stratification_factor_null_value_code)
            .trial_blinding_schema_code(self.trial_blinding_schema_code)
            .trial_blinding_schema_null_value_code(self.trial_blinding_schema_null_value_code)
            .planned_study_length(self.planned_study_length)
            .planned_study_length_null_value_code(self.planned_study_length_null_value_code)
            .build();

        let description = StudyDescription::builder()
            .study_title(self.study_title)
            .study_short_title(self.study_short_title)
            .build();

        Ok(StudyMetadata::new(
            identification,
            version,
            design,
            population,
            intervention,
            description,
        ))
    }
}

impl StudyDefinition {
    /// Captures the full state of the aggregate. The repository closure is not included.
    pub fn get_snapshot(&self) -> StudyDefinitionSnapshot {
        StudyDefinitionSnapshot {
            uid: self.uid.clone(),
            study_parent_part_uid: self.study_parent_part_uid.clone(),
            study_subpart_uids: self.study_subpart_uids.clone(),
            current_metadata: Some(StudyMetadataSnapshot::from_metadata(
                self.current_metadata(),
            )),
            draft_metadata: self.draft.as_ref().map(StudyMetadataSnapshot::from_metadata),
            released_metadata: self
                .released
                .as_ref()
                .map(StudyMetadataSnapshot::from_metadata),
            locked_metadata_versions: self
                .locked
                .iter()
                .map(StudyMetadataSnapshot::from_metadata)
                .collect(),
            study_status: Some(self.study_status().to_string()),
            deleted: self.deleted,
        }
    }

    /// Rebuilds an aggregate from a snapshot.
    ///
    /// Slot statuses are re-derived from slot position: the draft becomes `DRAFT` (`DELETED` for
    /// a deleted study), the released slot `RELEASED`, locked slots `LOCKED`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidSnapshot` if the snapshot is inconsistent: empty uid, missing
    /// or unknown status, no metadata slot, no current metadata, a `LOCKED` status whose last
    /// locked record differs from the current record, a deletion flag that disagrees with the
    /// status, a record without timestamp, or slots implying a different status.
    pub fn from_snapshot(snapshot: StudyDefinitionSnapshot) -> StudyResult<Self> {
        let invalid = |msg: String| StudyError::InvalidSnapshot(format!("{}: {msg}", snapshot.uid));

        if snapshot.uid.trim().is_empty() {
            return Err(StudyError::InvalidSnapshot("study uid is empty".into()));
        }

        let status: StudyStatus = snapshot
            .study_status
            .as_deref()
            .ok_or_else(|| invalid("study_status is missing".into()))?
            .parse()
            .map_err(|_| invalid("study_status is not a known status".into()))?;

        if snapshot.deleted != (status == StudyStatus::Deleted) {
            return Err(invalid(format!(
                "deleted flag {} contradicts status {status}",
                snapshot.deleted
            )));
        }

        let current = snapshot
            .current_metadata
            .as_ref()
            .ok_or_else(|| invalid("current_metadata is missing".into()))?;

        if status == StudyStatus::Locked && snapshot.locked_metadata_versions.last() != Some(current)
        {
            return Err(invalid(
                "LOCKED study's latest locked version differs from current_metadata".into(),
            ));
        }

        if snapshot.draft_metadata.is_none()
            && snapshot.released_metadata.is_none()
            && snapshot.locked_metadata_versions.is_empty()
        {
            return Err(invalid("snapshot holds no metadata slot".into()));
        }

        let draft_status = if snapshot.deleted {
            StudyStatus::Deleted
        } else {
            StudyStatus::Draft
        };

        let draft = snapshot
            .draft_metadata
            .map(|record| record.into_metadata(draft_status))
            .transpose()?;
        let released = snapshot
            .released_metadata
            .map(|record| record.into_metadata(StudyStatus::Released))
            .transpose()?;
        let locked = snapshot
            .locked_metadata_versions
            .into_iter()
            .map(|record| record.into_metadata(StudyStatus::Locked))
            .collect::<StudyResult<Vec<_>>>()?;

        let study = Self {
            uid: snapshot.uid,
            study_parent_part_uid: snapshot.study_parent_part_uid,
            study_subpart_uids: snapshot.study_subpart_uids,
            draft,
            released,
            locked,
            deleted: snapshot.deleted,
            repository_closure: None,
        };

        let derived = study.study_status();
        if derived != status {
            return Err(StudyError::InvalidSnapshot(format!(
                "{}: stored status {status} but slots imply {derived}",
                study.uid
            )));
        }

        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{MetadataChanges, NewStudyValues};
    use crate::ports::ReferencePorts;

    fn create() -> StudyDefinition {
        let values = NewStudyValues {
            identification: StudyIdentificationMetadata::builder()
                .study_number("0000")
                .study_acronym("A1")
                .project_number("P1")
                .registry_identifiers(
                    RegistryIdentifiers::builder()
                        .ct_gov_id("NCT00000001")
                        .eudract_id_null_value_code("C48660")
                        .build(),
                )
                .build(),
            design: HighLevelStudyDesign::builder()
                .trial_phase_code("C15600")
                .trial_type_codes(["C49666", "C49667"])
                .is_extension_trial(false)
                .build(),
            population: StudyPopulation::builder()
                .therapeutic_area_codes(["C1"])
                .number_of_expected_subjects(120u32)
                .build(),
            intervention: StudyIntervention::builder()
                .planned_study_length("P52W")
                .is_trial_randomised(true)
                .build(),
            description: StudyDescription::builder()
                .study_title("Round trip study")
                .study_short_title("RTS")
                .build(),
            ..Default::default()
        };

        StudyDefinition::from_initial_values(
            || "study-1".to_string(),
            values,
            &ReferencePorts::assume_valid(),
            Some("auth0"),
        )
        .unwrap()
    }

    fn round_trip(study: &StudyDefinition) -> StudyDefinition {
        let json = serde_json::to_string(&study.get_snapshot()).unwrap();
        let snapshot: StudyDefinitionSnapshot = serde_json::from_str(&json).unwrap();
        StudyDefinition::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn test_round_trip_through_lifecycle() {
        let mut study = create();
        assert_eq!(round_trip(&study), study);

        study.release(Some("first release"), Some("auth1")).unwrap();
        assert_eq!(round_trip(&study), study);

        study.lock("first lock", "auth1").unwrap();
        assert_eq!(round_trip(&study), study);

        study.unlock(Some("auth2")).unwrap();
        let changes = MetadataChanges {
            description: Some(
                StudyDescription::builder()
                    .study_title("Round trip study v2")
                    .build(),
            ),
            ..Default::default()
        };
        study
            .edit_metadata(changes, &ReferencePorts::assume_valid(), Some("auth2"))
            .unwrap();
        assert_eq!(round_trip(&study), study);

        study.lock("second lock", "auth2").unwrap();
        let restored = round_trip(&study);
        assert_eq!(restored, study);
        assert_eq!(restored.study_status(), StudyStatus::Locked);
        assert_eq!(restored.get_all_locked_versions().len(), 2);
    }

    #[test]
    fn test_round_trip_deleted_study() {
        let mut study = create();
        study.mark_deleted().unwrap();

        let snapshot = study.get_snapshot();
        assert!(snapshot.deleted);
        assert_eq!(snapshot.study_status.as_deref(), Some("DELETED"));

        let restored = StudyDefinition::from_snapshot(snapshot).unwrap();
        assert_eq!(restored, study);
        assert_eq!(
            restored.draft_metadata().unwrap().version().status(),
            StudyStatus::Deleted
        );
    }

    #[test]
    fn test_snapshot_excludes_repository_closure() {
        let mut study = create();
        study.set_repository_closure(Some(3));
        let restored = StudyDefinition::from_snapshot(study.get_snapshot()).unwrap();

        assert_eq!(restored.repository_closure(), None);
    }

    #[test]
    fn test_current_metadata_matches_authoritative_slot() {
        let mut study = create();
        study.lock("first lock", "auth1").unwrap();
        let snapshot = study.get_snapshot();

        assert_eq!(
            snapshot.current_metadata.as_ref(),
            snapshot.locked_metadata_versions.last()
        );
        assert_eq!(snapshot.study_status.as_deref(), Some("LOCKED"));
        assert_eq!(
            snapshot.locked_metadata_versions[0].version_number,
            Some(VersionNumber::whole(1))
        );
    }

    #[test]
    fn test_rejects_empty_uid() {
        let mut snapshot = create().get_snapshot();
        snapshot.uid = " ".into();

        let err = StudyDefinition::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, StudyError::InvalidSnapshot(msg) if msg.contains("uid is empty")));
    }

    #[test]
    fn test_rejects_locked_status_with_diverging_current() {
        let mut study = create();
        study.lock("first lock", "auth1").unwrap();
        let mut snapshot = study.get_snapshot();
        snapshot.current_metadata = snapshot.draft_metadata.clone();

        let err = StudyDefinition::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, StudyError::InvalidSnapshot(msg) if msg.contains("differs from current_metadata")));
    }

    #[test]
    fn test_rejects_missing_slots_and_status() {
        let mut snapshot = create().get_snapshot();
        snapshot.draft_metadata = None;
        assert!(StudyDefinition::from_snapshot(snapshot).is_err());

        let mut snapshot = create().get_snapshot();
        snapshot.study_status = Some("draft".into());
        assert!(StudyDefinition::from_snapshot(snapshot).is_err());

        let mut snapshot = create().get_snapshot();
        snapshot.study_status = Some("RELEASED".into());
        let err = StudyDefinition::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, StudyError::InvalidSnapshot(msg) if msg.contains("slots imply")));
    }

    #[test]
    fn test_rejects_record_without_timestamp() {
        let mut snapshot = create().get_snapshot();
        if let Some(draft) = snapshot.draft_metadata.as_mut() {
            draft.version_timestamp = None;
        }

        let err = StudyDefinition::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, StudyError::InvalidSnapshot(msg) if msg.contains("version_timestamp")));
    }

    #[test]
    fn test_flat_record_carries_nested_values() {
        let snapshot = create().get_snapshot();
        let draft = snapshot.draft_metadata.unwrap();

        assert_eq!(draft.ct_gov_id.as_deref(), Some("NCT00000001"));
        assert_eq!(draft.eudract_id_null_value_code.as_deref(), Some("C48660"));
        assert_eq!(draft.study_id_prefix.as_deref(), Some("P1"));
        assert_eq!(draft.trial_type_codes, vec!["C49666", "C49667"]);
        assert_eq!(draft.number_of_expected_subjects, Some(120));
        assert_eq!(draft.version_author.as_deref(), Some("auth0"));
        assert_eq!(draft.version_number, None);
    }
}
