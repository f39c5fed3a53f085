//! Validation helpers shared by the value objects.
//!
//! Value objects describe *what* to check (which field pairs with which null-value code, which
//! port answers for which coded field); the functions here do the checking and produce the
//! error messages.

use crate::constants::STUDY_NUMBER_MAX_DIGITS;
use crate::ports::CodeLookup;
use crate::{StudyError, StudyResult};

/// Something a null-value code can be paired with.
pub(crate) trait IsPresent {
    fn is_present(&self) -> bool;
}

impl<T> IsPresent for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T> IsPresent for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// A value field and the null-value code that may stand in for it.
pub(crate) struct NullPair<'v> {
    name: &'static str,
    present: bool,
    null_code: Option<&'v str>,
}

impl<'v> NullPair<'v> {
    pub(crate) fn new<T: IsPresent>(
        name: &'static str,
        value: &T,
        null_code: &'v Option<String>,
    ) -> Self {
        Self {
            name,
            present: value.is_present(),
            null_code: null_code.as_deref(),
        }
    }
}

/// Checks every pair in order, failing on the first violation.
///
/// A pair is invalid when both the value and its null-value code are given, or when the
/// null-value code is not known to `null_values`.
///
/// # Errors
///
/// Returns `StudyError::Validation` naming the offending field.
pub(crate) fn check_null_pairs(
    pairs: &[NullPair<'_>],
    null_values: &dyn CodeLookup,
) -> StudyResult<()> {
    for pair in pairs {
        let Some(code) = pair.null_code else {
            continue;
        };

        if pair.present {
            return Err(StudyError::Validation(format!(
                "{} and associated null value code cannot be both provided.",
                pair.name
            )));
        }

        if !null_values.exists(code) {
            return Err(StudyError::Validation(format!(
                "Unknown null value code (reason for missing) provided for {}",
                pair.name
            )));
        }
    }

    Ok(())
}

/// Checks that an optional code is known; `describe` builds the message for an unknown code.
pub(crate) fn check_code(
    lookup: &dyn CodeLookup,
    code: Option<&str>,
    describe: impl Fn(&str) -> String,
) -> StudyResult<()> {
    match code {
        Some(code) if !lookup.exists(code) => Err(StudyError::Validation(describe(code))),
        _ => Ok(()),
    }
}

/// Checks every code of a list, failing on the first unknown one.
pub(crate) fn check_codes(
    lookup: &dyn CodeLookup,
    codes: &[String],
    describe: impl Fn(&str) -> String,
) -> StudyResult<()> {
    codes
        .iter()
        .try_for_each(|code| check_code(lookup, Some(code.as_str()), &describe))
}

/// Returns true if `study_number` is one to four ASCII digits.
pub(crate) fn is_valid_study_number(study_number: &str) -> bool {
    !study_number.is_empty()
        && study_number.len() <= STUDY_NUMBER_MAX_DIGITS
        && study_number.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Fallback, KnownCodes};

    #[test]
    fn test_null_pair_rejects_value_and_code() {
        let value = Some("NCT0001".to_string());
        let code = Some("C48660".to_string());
        let pairs = [NullPair::new("ct_gov_id", &value, &code)];

        let err = check_null_pairs(&pairs, &Fallback::AssumeValid).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg)
            if msg == "ct_gov_id and associated null value code cannot be both provided."));
    }

    #[test]
    fn test_null_pair_treats_empty_list_as_absent() {
        let value: Vec<String> = Vec::new();
        let code = Some("C48660".to_string());
        let pairs = [NullPair::new("trial_type_codes", &value, &code)];

        assert!(check_null_pairs(&pairs, &Fallback::AssumeValid).is_ok());
    }

    #[test]
    fn test_null_pair_checks_code_existence() {
        let value: Option<bool> = None;
        let code = Some("BOGUS".to_string());
        let pairs = [NullPair::new("is_extension_trial", &value, &code)];
        let known = KnownCodes::new(["C48660"]);

        let err = check_null_pairs(&pairs, &known).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg)
            if msg.contains("Unknown null value code") && msg.contains("is_extension_trial")));
    }

    #[test]
    fn test_check_codes_reports_first_unknown() {
        let known = KnownCodes::new(["C1", "C2"]);
        let codes = vec!["C1".to_string(), "C9".to_string(), "C8".to_string()];

        let err = check_codes(&known, &codes, |c| format!("Unknown code ({c})")).unwrap_err();
        assert!(matches!(err, StudyError::Validation(msg) if msg == "Unknown code (C9)"));
        assert!(check_code(&known, None, |c| c.to_string()).is_ok());
    }

    #[test]
    fn test_is_valid_study_number() {
        assert!(is_valid_study_number("0"));
        assert!(is_valid_study_number("0000"));
        assert!(is_valid_study_number("1234"));
        assert!(!is_valid_study_number(""));
        assert!(!is_valid_study_number("12345"));
        assert!(!is_valid_study_number("12a"));
        assert!(!is_valid_study_number(" 12"));
    }
}
