use crate::ports::ReferencePorts;
use crate::validation::{check_code, check_codes, check_null_pairs, NullPair};
use crate::StudyResult;

value_object! {
    /// High-level design of a study: type, phase and trial characteristics.
    pub struct HighLevelStudyDesign builds HighLevelStudyDesignBuilder {
        study_type_code: Option<String>,
        study_type_null_value_code: Option<String>,
        trial_type_codes: Vec<String>,
        trial_type_null_value_code: Option<String>,
        trial_phase_code: Option<String>,
        trial_phase_null_value_code: Option<String>,
        is_extension_trial: Option<bool>,
        is_extension_trial_null_value_code: Option<String>,
        is_adaptive_design: Option<bool>,
        is_adaptive_design_null_value_code: Option<String>,
        study_stop_rules: Option<String>,
        study_stop_rules_null_value_code: Option<String>,
        confirmed_response_minimum_duration: Option<String>,
        confirmed_response_minimum_duration_null_value_code: Option<String>,
        post_auth_indicator: Option<bool>,
        post_auth_indicator_null_value_code: Option<String>,
    }
}

impl HighLevelStudyDesign {
    fn null_pairs(&self) -> [NullPair<'_>; 8] {
        [
            NullPair::new(
                "study_type_code",
                &self.study_type_code,
                &self.study_type_null_value_code,
            ),
            NullPair::new(
                "trial_type_codes",
                &self.trial_type_codes,
                &self.trial_type_null_value_code,
            ),
            NullPair::new(
                "trial_phase_code",
                &self.trial_phase_code,
                &self.trial_phase_null_value_code,
            ),
            NullPair::new(
                "is_extension_trial",
                &self.is_extension_trial,
                &self.is_extension_trial_null_value_code,
            ),
            NullPair::new(
                "is_adaptive_design",
                &self.is_adaptive_design,
                &self.is_adaptive_design_null_value_code,
            ),
            NullPair::new(
                "study_stop_rules",
                &self.study_stop_rules,
                &self.study_stop_rules_null_value_code,
            ),
            NullPair::new(
                "confirmed_response_minimum_duration",
                &self.confirmed_response_minimum_duration,
                &self.confirmed_response_minimum_duration_null_value_code,
            ),
            NullPair::new(
                "post_auth_indicator",
                &self.post_auth_indicator,
                &self.post_auth_indicator_null_value_code,
            ),
        ]
    }

    pub fn validate(&self, ports: &ReferencePorts<'_>) -> StudyResult<()> {
        check_null_pairs(&self.null_pairs(), ports.null_value)?;

        check_code(ports.trial_phase, self.trial_phase_code.as_deref(), |c| {
            format!("Non-existing trial phase code provided ({c})")
        })?;
        check_code(ports.study_type, self.study_type_code.as_deref(), |c| {
            format!("Non-existing study type code provided ({c})")
        })?;
        check_codes(ports.trial_type, &self.trial_type_codes, |c| {
            format!("Non-existing trial type code provided ({c})")
        })
    }

    pub fn is_valid(&self, ports: &ReferencePorts<'_>) -> bool {
        self.validate(ports).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::KnownCodes;
    use crate::StudyError;

    #[test]
    fn test_trial_type_codes_are_normalised() {
        let design = HighLevelStudyDesign::builder()
            .trial_type_codes(["C1 ", "", "C2", "C1"])
            .build();

        assert_eq!(design.trial_type_codes(), &vec!["C1".to_string(), "C2".to_string()]);
    }

    #[test]
    fn test_value_with_null_code_fails() {
        let design = HighLevelStudyDesign::builder()
            .is_extension_trial(false)
            .is_extension_trial_null_value_code("C48660")
            .build();

        let err = design
            .validate(&ReferencePorts::assume_valid())
            .unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg)
            if msg == "is_extension_trial and associated null value code cannot be both provided."));
    }

    #[test]
    fn test_unknown_codes_in_order() {
        let phases = KnownCodes::new(["C15600"]);
        let types = KnownCodes::new(["C98388"]);
        let ports = ReferencePorts::assume_valid()
            .trial_phase(&phases)
            .trial_type(&types);

        let bad_phase = HighLevelStudyDesign::builder()
            .trial_phase_code("C0")
            .trial_type_codes(["C1"])
            .build();
        let err = bad_phase.validate(&ports).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("trial phase code provided (C0)")));

        let bad_type = bad_phase.fix_some_values(|b| b.trial_phase_code("C15600"));
        let err = bad_type.validate(&ports).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg.contains("trial type code provided (C1)")));

        let good = bad_type.fix_some_values(|b| b.trial_type_codes(["C98388"]));
        assert!(good.is_valid(&ports));
    }

    #[test]
    fn test_null_code_alone_is_valid() {
        let design = HighLevelStudyDesign::builder()
            .trial_type_null_value_code("C48660")
            .build();

        assert!(design.is_valid(&ReferencePorts::assume_valid()));
        assert!(!design.is_valid(&ReferencePorts::reject_unverified()));
    }
}
