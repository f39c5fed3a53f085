use crate::ports::ReferencePorts;
use crate::validation::{check_code, check_codes, check_null_pairs, NullPair};
use crate::StudyResult;

value_object! {
    /// Who takes part in a study.
    pub struct StudyPopulation builds StudyPopulationBuilder {
        therapeutic_area_codes: Vec<String>,
        therapeutic_area_null_value_code: Option<String>,
        disease_condition_or_indication_codes: Vec<String>,
        disease_condition_or_indication_null_value_code: Option<String>,
        diagnosis_group_codes: Vec<String>,
        diagnosis_group_null_value_code: Option<String>,
        sex_of_participants_code: Option<String>,
        sex_of_participants_null_value_code: Option<String>,
        rare_disease_indicator: Option<bool>,
        rare_disease_indicator_null_value_code: Option<String>,
        healthy_subject_indicator: Option<bool>,
        healthy_subject_indicator_null_value_code: Option<String>,
        /// ISO 8601 duration, e.g. `P18Y`.
        planned_minimum_age_of_subjects: Option<String>,
        planned_minimum_age_of_subjects_null_value_code: Option<String>,
        /// ISO 8601 duration, e.g. `P65Y`.
        planned_maximum_age_of_subjects: Option<String>,
        planned_maximum_age_of_subjects_null_value_code: Option<String>,
        stable_disease_minimum_duration: Option<String>,
        stable_disease_minimum_duration_null_value_code: Option<String>,
        pediatric_study_indicator: Option<bool>,
        pediatric_study_indicator_null_value_code: Option<String>,
        pediatric_postmarket_study_indicator: Option<bool>,
        pediatric_postmarket_study_indicator_null_value_code: Option<String>,
        pediatric_investigation_plan_indicator: Option<bool>,
        pediatric_investigation_plan_indicator_null_value_code: Option<String>,
        relapse_criteria: Option<String>,
        relapse_criteria_null_value_code: Option<String>,
        number_of_expected_subjects: Option<u32>,
        number_of_expected_subjects_null_value_code: Option<String>,
    }
}

impl StudyPopulation {
    fn null_pairs(&self) -> [NullPair<'_>; 14] {
        [
            NullPair::new(
                "therapeutic_area_code",
                &self.therapeutic_area_codes,
                &self.therapeutic_area_null_value_code,
            ),
            NullPair::new(
                "diagnosis_group_code",
                &self.diagnosis_group_codes,
                &self.diagnosis_group_null_value_code,
            ),
            NullPair::new(
                "disease_condition_or_indication_code",
                &self.disease_condition_or_indication_codes,
                &self.disease_condition_or_indication_null_value_code,
            ),
            NullPair::new(
                "sex_of_participants_code",
                &self.sex_of_participants_code,
                &self.sex_of_participants_null_value_code,
            ),
            NullPair::new(
                "healthy_subject_indicator",
                &self.healthy_subject_indicator,
                &self.healthy_subject_indicator_null_value_code,
            ),
            NullPair::new(
                "rare_disease_indicator",
                &self.rare_disease_indicator,
                &self.rare_disease_indicator_null_value_code,
            ),
            NullPair::new(
                "planned_minimum_age_of_subjects",
                &self.planned_minimum_age_of_subjects,
                &self.planned_minimum_age_of_subjects_null_value_code,
            ),
            NullPair::new(
                "planned_maximum_age_of_subjects",
                &self.planned_maximum_age_of_subjects,
                &self.planned_maximum_age_of_subjects_null_value_code,
            ),
            NullPair::new(
                "stable_disease_minimum_duration",
                &self.stable_disease_minimum_duration,
                &self.stable_disease_minimum_duration_null_value_code,
            ),
            NullPair::new(
                "pediatric_study_indicator",
                &self.pediatric_study_indicator,
                &self.pediatric_study_indicator_null_value_code,
            ),
            NullPair::new(
                "pediatric_postmarket_study_indicator",
                &self.pediatric_postmarket_study_indicator,
                &self.pediatric_postmarket_study_indicator_null_value_code,
            ),
            NullPair::new(
                "pediatric_investigation_plan_indicator",
                &self.pediatric_investigation_plan_indicator,
                &self.pediatric_investigation_plan_indicator_null_value_code,
            ),
            NullPair::new(
                "relapse_criteria",
                &self.relapse_criteria,
                &self.relapse_criteria_null_value_code,
            ),
            NullPair::new(
                "number_of_expected_subjects",
                &self.number_of_expected_subjects,
                &self.number_of_expected_subjects_null_value_code,
            ),
        ]
    }

    pub fn validate(&self, ports: &ReferencePorts<'_>) -> StudyResult<()> {
        check_null_pairs(&self.null_pairs(), ports.null_value)?;

        check_codes(ports.therapeutic_area, &self.therapeutic_area_codes, |c| {
            format!("Unknown therapeutic area code ({c})")
        })?;
        check_codes(ports.diagnosis_group, &self.diagnosis_group_codes, |c| {
            format!("Unknown diagnosis group code ({c})")
        })?;
        check_codes(
            ports.disease_condition_or_indication,
            &self.disease_condition_or_indication_codes,
            |c| format!("Unknown disease condition or indication code ({c})"),
        )?;
        check_code(
            ports.sex_of_participants,
            self.sex_of_participants_code.as_deref(),
            |c| format!("Unknown sex of participants code ({c})"),
        )
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>) -> bool {
        self.validate(ports).is_ok()
    }
}
