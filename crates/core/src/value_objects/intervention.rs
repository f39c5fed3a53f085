use crate::ports::ReferencePorts;
use crate::validation::{check_code, check_codes, check_null_pairs, NullPair};
use crate::StudyResult;

value_object! {
    /// How the study intervenes: intervention type and model, control, blinding, randomisation.
    pub struct StudyIntervention builds StudyInterventionBuilder {
        intervention_type_code: Option<String>,
        intervention_type_null_value_code: Option<String>,
        add_on_to_existing_treatments: Option<bool>,
        add_on_to_existing_treatments_null_value_code: Option<String>,
        control_type_code: Option<String>,
        control_type_null_value_code: Option<String>,
        intervention_model_code: Option<String>,
        intervention_model_null_value_code: Option<String>,
        trial_intent_types_codes: Vec<String>,
        trial_intent_type_null_value_code: Option<String>,
        is_trial_randomised: Option<bool>,
        is_trial_randomised_null_value_code: Option<String>,
        stratification_factor: Option<String>,
        stratification_factor_null_value_code: Option<String>,
        trial_blinding_schema_code: Option<String>,
        trial_blinding_schema_null_value_code: Option<String>,
        /// ISO 8601 duration, e.g. `P52W`.
        planned_study_length: Option<String>,
        planned_study_length_null_value_code: Option<String>,
    }
}

impl StudyIntervention {
    fn null_pairs(&self) -> [NullPair<'_>; 9] {
        [
            NullPair::new(
                "intervention_type",
                &self.intervention_type_code,
                &self.intervention_type_null_value_code,
            ),
            NullPair::new(
                "add_on_to_existing_treatments",
                &self.add_on_to_existing_treatments,
                &self.add_on_to_existing_treatments_null_value_code,
            ),
            NullPair::new(
                "control_type",
                &self.control_type_code,
                &self.control_type_null_value_code,
            ),
            NullPair::new(
                "trial_intent_types_codes",
                &self.trial_intent_types_codes,
                &self.trial_intent_type_null_value_code,
            ),
            NullPair::new(
                "intervention_model",
                &self.intervention_model_code,
                &self.intervention_model_null_value_code,
            ),
            NullPair::new(
                "is_trial_randomised",
                &self.is_trial_randomised,
                &self.is_trial_randomised_null_value_code,
            ),
            NullPair::new(
                "stratification_factor",
                &self.stratification_factor,
                &self.stratification_factor_null_value_code,
            ),
            NullPair::new(
                "trial_blinding_schema",
                &self.trial_blinding_schema_code,
                &self.trial_blinding_schema_null_value_code,
            ),
            NullPair::new(
                "planned_study_length",
                &self.planned_study_length,
                &self.planned_study_length_null_value_code,
            ),
        ]
    }

    pub fn validate(&self, ports: &ReferencePorts<'_>) -> StudyResult<()> {
        check_null_pairs(&self.null_pairs(), ports.null_value)?;

        check_code(
            ports.intervention_type,
            self.intervention_type_code.as_deref(),
            |c| format!("Unknown intervention type code ({c})"),
        )?;
        check_code(ports.control_type, self.control_type_code.as_deref(), |c| {
            format!("Unknown control type code ({c})")
        })?;
        check_code(
            ports.intervention_model,
            self.intervention_model_code.as_deref(),
            |c| format!("Unknown intervention model code ({c})"),
        )?;
        check_code(
            ports.trial_blinding_schema,
            self.trial_blinding_schema_code.as_deref(),
            |c| format!("Unknown trial blinding schema code ({c})"),
        )?;
        check_codes(ports.trial_intent_type, &self.trial_intent_types_codes, |c| {
            format!("Unknown trial intent type code ({c})")
        })
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>) -> bool {
        self.validate(ports).is_ok()
    }
}
