//! Declarative layout of the flat snapshot record.
//!
//! Each entry names one field of [`StudyMetadataSnapshot`], the dotted path of the value object it
//! belongs to inside a version slot, and that value object's type. The layout is data: a
//! deployment may ship its own table as YAML, for example to reorder fields for display, but the
//! table must still describe exactly the record the conversions in [`crate::snapshot`] produce.
//!
//! ```yaml
//! - study_field_name: study_number
//!   study_field_grouping: identification
//!   study_value_object_class: StudyIdentificationMetadata
//! ```

use crate::snapshot::StudyMetadataSnapshot;
use crate::{StudyError, StudyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use study_types::NonEmptyText;

/// A value object inside a version slot: dotted path and type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Grouping {
    path: &'static str,
    class: &'static str,
}

const IDENTIFICATION: Grouping = Grouping {
    path: "identification",
    class: "StudyIdentificationMetadata",
};
const REGISTRY: Grouping = Grouping {
    path: "identification.registry_identifiers",
    class: "RegistryIdentifiers",
};
const VERSION: Grouping = Grouping {
    path: "version",
    class: "StudyVersionMetadata",
};
const DESIGN: Grouping = Grouping {
    path: "design",
    class: "HighLevelStudyDesign",
};
const POPULATION: Grouping = Grouping {
    path: "population",
    class: "StudyPopulation",
};
const INTERVENTION: Grouping = Grouping {
    path: "intervention",
    class: "StudyIntervention",
};
const DESCRIPTION: Grouping = Grouping {
    path: "description",
    class: "StudyDescription",
};

/// Every field of the flat record, in record order.
const STUDY_FIELDS: &[(&str, Grouping)] = &[
    ("study_number", IDENTIFICATION),
    ("subpart_id", IDENTIFICATION),
    ("study_acronym", IDENTIFICATION),
    ("study_subpart_acronym", IDENTIFICATION),
    ("study_id_prefix", IDENTIFICATION),
    ("project_number", IDENTIFICATION),
    ("description", IDENTIFICATION),

    ("ct_gov_id", REGISTRY),
    ("ct_gov_id_null_value_code", REGISTRY),
    ("eudract_id", REGISTRY),
    ("eudract_id_null_value_code", REGISTRY),
    ("universal_trial_number_utn", REGISTRY),
    ("universal_trial_number_utn_null_value_code", REGISTRY),
    ("japanese_trial_registry_id_japic", REGISTRY),
    ("japanese_trial_registry_id_japic_null_value_code", REGISTRY),
    ("investigational_new_drug_application_number_ind", REGISTRY),
    ("investigational_new_drug_application_number_ind_null_value_code", REGISTRY),
    ("eu_trial_number", REGISTRY),
    ("eu_trial_number_null_value_code", REGISTRY),
    ("civ_id_sin_number", REGISTRY),
    ("civ_id_sin_number_null_value_code", REGISTRY),
    ("national_clinical_trial_number", REGISTRY),
    ("national_clinical_trial_number_null_value_code", REGISTRY),
    ("japanese_trial_registry_number_jrct", REGISTRY),
    ("japanese_trial_registry_number_jrct_null_value_code", REGISTRY),
    ("national_medical_products_administration_nmpa_number", REGISTRY),
    ("national_medical_products_administration_nmpa_number_null_value_code", REGISTRY),
    ("eudamed_srn_number", REGISTRY),
    ("eudamed_srn_number_null_value_code", REGISTRY),
    ("investigational_device_exemption_ide_number", REGISTRY),
    ("investigational_device_exemption_ide_number_null_value_code", REGISTRY),

    ("version_timestamp", VERSION),
    ("version_author", VERSION),
    ("version_description", VERSION),
    ("version_number", VERSION),

    ("study_type_code", DESIGN),
    ("study_type_null_value_code", DESIGN),
    ("trial_type_codes", DESIGN),
    ("trial_type_null_value_code", DESIGN),
    ("trial_phase_code", DESIGN),
    ("trial_phase_null_value_code", DESIGN),
    ("is_extension_trial", DESIGN),
    ("is_extension_trial_null_value_code", DESIGN),
    ("is_adaptive_design", DESIGN),
    ("is_adaptive_design_null_value_code", DESIGN),
    ("study_stop_rules", DESIGN),
    ("study_stop_rules_null_value_code", DESIGN),
    ("confirmed_response_minimum_duration", DESIGN),
    ("confirmed_response_minimum_duration_null_value_code", DESIGN),
    ("post_auth_indicator", DESIGN),
    ("post_auth_indicator_null_value_code", DESIGN),

    ("therapeutic_area_codes", POPULATION),
    ("therapeutic_area_null_value_code", POPULATION),
    ("disease_condition_or_indication_codes", POPULATION),
    ("disease_condition_or_indication_null_value_code", POPULATION),
    ("diagnosis_group_codes", POPULATION),
    ("diagnosis_group_null_value_code", POPULATION),
    ("sex_of_participants_code", POPULATION),
    ("sex_of_participants_null_value_code", POPULATION),
    ("rare_disease_indicator", POPULATION),
    ("rare_disease_indicator_null_value_code", POPULATION),
    ("healthy_subject_indicator", POPULATION),
    ("healthy_subject_indicator_null_value_code", POPULATION),
    ("planned_minimum_age_of_subjects", POPULATION),
    ("planned_minimum_age_of_subjects_null_value_code", POPULATION),
    ("planned_maximum_age_of_subjects", POPULATION),
    ("planned_maximum_age_of_subjects_null_value_code", POPULATION),
    ("stable_disease_minimum_duration", POPULATION),
    ("stable_disease_minimum_duration_null_value_code", POPULATION),
    ("pediatric_study_indicator", POPULATION),
    ("pediatric_study_indicator_null_value_code", POPULATION),
    ("pediatric_postmarket_study_indicator", POPULATION),
    ("pediatric_postmarket_study_indicator_null_value_code", POPULATION),
    ("pediatric_investigation_plan_indicator", POPULATION),
    ("pediatric_investigation_plan_indicator_null_value_code", POPULATION),
    ("relapse_criteria", POPULATION),
    ("relapse_criteria_null_value_code", POPULATION),
    ("number_of_expected_subjects", POPULATION),
    ("number_of_expected_subjects_null_value_code", POPULATION),

    ("intervention_type_code", INTERVENTION),
    ("intervention_type_null_value_code", INTERVENTION),
    ("add_on_to_existing_treatments", INTERVENTION),
    ("add_on_to_existing_treatments_null_value_code", INTERVENTION),
    ("control_type_code", INTERVENTION),
    ("control_type_null_value_code", INTERVENTION),
    ("intervention_model_code", INTERVENTION),
    ("intervention_model_null_value_code", INTERVENTION),
    ("trial_intent_types_codes", INTERVENTION),
    ("trial_intent_type_null_value_code", INTERVENTION),
    ("is_trial_randomised", INTERVENTION),
    ("is_trial_randomised_null_value_code", INTERVENTION),
    ("stratification_factor", INTERVENTION),
    ("stratification_factor_null_value_code", INTERVENTION),
    ("trial_blinding_schema_code", INTERVENTION),
    ("trial_blinding_schema_null_value_code", INTERVENTION),
    ("planned_study_length", INTERVENTION),
    ("planned_study_length_null_value_code", INTERVENTION),

    ("study_title", DESCRIPTION),
    ("study_short_title", DESCRIPTION),
];

fn known_grouping(name: &str) -> Option<Grouping> {
    STUDY_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, grouping)| *grouping)
}

/// One entry of the field configuration table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldConfigItem {
    study_field_name: String,
    study_field_grouping: String,
    study_value_object_class: String,
}

impl FieldConfigItem {
    pub fn new(
        study_field_name: impl Into<String>,
        study_field_grouping: impl Into<String>,
        study_value_object_class: impl Into<String>,
    ) -> Self {
        Self {
            study_field_name: study_field_name.into(),
            study_field_grouping: study_field_grouping.into(),
            study_value_object_class: study_value_object_class.into(),
        }
    }

    pub fn study_field_name(&self) -> &str {
        &self.study_field_name
    }

    pub fn study_field_grouping(&self) -> &str {
        &self.study_field_grouping
    }

    pub fn study_value_object_class(&self) -> &str {
        &self.study_value_object_class
    }
}

/// Wire form of one YAML entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldConfigItemWire {
    study_field_name: NonEmptyText,
    study_field_grouping: NonEmptyText,
    study_value_object_class: NonEmptyText,
}

/// Fields of one value object, in configured order.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldGroup {
    pub grouping: String,
    pub value_object_class: String,
    pub fields: Vec<(String, serde_json::Value)>,
}

/// Ordered, validated field configuration table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldConfiguration {
    items: Vec<FieldConfigItem>,
}

impl Default for FieldConfiguration {
    fn default() -> Self {
        Self {
            items: STUDY_FIELDS
                .iter()
                .map(|(name, grouping)| FieldConfigItem::new(*name, grouping.path, grouping.class))
                .collect(),
        }
    }
}

impl FieldConfiguration {
    /// Builds a table from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidConfig` if the entries do not describe the flat record exactly.
    pub fn new(items: Vec<FieldConfigItem>) -> StudyResult<Self> {
        let config = Self { items };
        config.validate()?;
        Ok(config)
    }

    /// Parses a table from YAML text (a sequence of entries).
    ///
    /// Uses `serde_path_to_error` so schema errors name the failing entry, e.g. `[3].study_field_name`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidConfig` if the YAML does not match the entry schema or the
    /// entries fail [`FieldConfiguration::validate`].
    pub fn parse(yaml_text: &str) -> StudyResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, Vec<FieldConfigItemWire>>(deserializer)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(StudyError::InvalidConfig(format!(
                    "field configuration schema mismatch at {path}: {source}"
                )));
            }
        };

        let items = wire
            .into_iter()
            .map(|item| {
                FieldConfigItem::new(
                    item.study_field_name.into_string(),
                    item.study_field_grouping.into_string(),
                    item.study_value_object_class.into_string(),
                )
            })
            .collect();

        Self::new(items)
    }

    /// Reads and parses a YAML table from disk.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::FileRead` if the file cannot be read, otherwise as
    /// [`FieldConfiguration::parse`].
    pub fn load(path: &Path) -> StudyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(StudyError::FileRead)?;
        Self::parse(&text)
    }

    /// Renders the table as YAML, in the form [`FieldConfiguration::parse`] accepts.
    pub fn render(&self) -> StudyResult<String> {
        serde_yaml::to_string(&self.items).map_err(StudyError::YamlSerialization)
    }

    pub fn items(&self) -> &[FieldConfigItem] {
        &self.items
    }

    /// Checks the table against the flat record layout.
    ///
    /// Every record field must appear exactly once, under its own grouping and value object
    /// class. Order is free.
    pub fn validate(&self) -> StudyResult<()> {
        let mut seen = HashSet::new();

        for item in &self.items {
            let name = item.study_field_name();
            let Some(expected) = known_grouping(name) else {
                return Err(StudyError::InvalidConfig(format!(
                    "unknown study field '{name}'"
                )));
            };

            if item.study_field_grouping() != expected.path
                || item.study_value_object_class() != expected.class
            {
                return Err(StudyError::InvalidConfig(format!(
                    "study field '{name}' belongs to {} ({}), not {} ({})",
                    expected.path,
                    expected.class,
                    item.study_field_grouping(),
                    item.study_value_object_class()
                )));
            }

            if !seen.insert(name) {
                return Err(StudyError::InvalidConfig(format!(
                    "study field '{name}' is configured more than once"
                )));
            }
        }

        if let Some((missing, _)) = STUDY_FIELDS.iter().find(|(name, _)| !seen.contains(name)) {
            return Err(StudyError::InvalidConfig(format!(
                "study field '{missing}' is missing from the field configuration"
            )));
        }

        Ok(())
    }

    /// Flat name/value view of one record, grouped by value object.
    ///
    /// Groups appear in the order their first field appears in the table.
    pub fn flatten_record(&self, record: &StudyMetadataSnapshot) -> StudyResult<Vec<FieldGroup>> {
        let value = serde_json::to_value(record).map_err(StudyError::Serialization)?;
        let serde_json::Value::Object(values) = value else {
            return Err(StudyError::InvalidSnapshot(
                "study metadata record did not serialise to an object".into(),
            ));
        };

        let mut groups: Vec<FieldGroup> = Vec::new();
        for item in &self.items {
            let field_value = values
                .get(item.study_field_name())
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            let position = groups
                .iter()
                .position(|g| g.grouping == item.study_field_grouping());
            let group = match position {
                Some(index) => &mut groups[index],
                None => {
                    groups.push(FieldGroup {
                        grouping: item.study_field_grouping().to_owned(),
                        value_object_class: item.study_value_object_class().to_owned(),
                        fields: Vec::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };
            group
                .fields
                .push((item.study_field_name().to_owned(), field_value));
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn test_default_table_matches_record_keys() {
        let value = serde_json::to_value(StudyMetadataSnapshot::default()).unwrap();
        let keys: BTreeSet<String> = value.as_object().unwrap().keys().cloned().collect();

        let config = FieldConfiguration::default();
        let names: BTreeSet<String> = config
            .items()
            .iter()
            .map(|item| item.study_field_name().to_owned())
            .collect();

        assert_eq!(names, keys);
        assert_eq!(config.items().len(), keys.len());
        config.validate().unwrap();
    }

    #[test]
    fn test_render_then_parse() {
        let config = FieldConfiguration::default();
        let yaml = config.render().unwrap();

        assert!(yaml.contains("study_field_grouping: identification.registry_identifiers"));
        assert_eq!(FieldConfiguration::parse(&yaml).unwrap(), config);
    }

    #[test]
    fn test_reordered_table_is_accepted() {
        let mut items = FieldConfiguration::default().items().to_vec();
        items.reverse();

        let config = FieldConfiguration::new(items).unwrap();
        assert_eq!(config.items()[0].study_field_name(), "study_short_title");
    }

    #[test]
    fn test_rejects_unknown_field() {
        let mut items = FieldConfiguration::default().items().to_vec();
        items.push(FieldConfigItem::new("study_colour", "design", "HighLevelStudyDesign"));

        let err = FieldConfiguration::new(items).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("unknown study field 'study_colour'")));
    }

    #[test]
    fn test_rejects_wrong_grouping() {
        let mut items = FieldConfiguration::default().items().to_vec();
        items[0] = FieldConfigItem::new("study_number", "design", "HighLevelStudyDesign");

        let err = FieldConfiguration::new(items).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("belongs to identification")));
    }

    #[test]
    fn test_rejects_duplicate_and_missing() {
        let mut items = FieldConfiguration::default().items().to_vec();
        let first = items[0].clone();
        items.push(first);
        let err = FieldConfiguration::new(items).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("more than once")));

        let mut items = FieldConfiguration::default().items().to_vec();
        items.pop();
        let err = FieldConfiguration::new(items).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("'study_short_title' is missing")));
    }

    #[test]
    fn test_parse_reports_failing_path() {
        let yaml = "- study_field_name: study_number\n  study_field_grouping: identification\n  study_value_object_class: StudyIdentificationMetadata\n- study_field_name: \"  \"\n  study_field_grouping: identification\n  study_value_object_class: StudyIdentificationMetadata\n";

        let err = FieldConfiguration::parse(yaml).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("[1].study_field_name")));

        let err = FieldConfiguration::parse("- study_field_name: study_number\n  colour: red\n").unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("schema mismatch")));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fields.yaml");
        std::fs::write(&path, FieldConfiguration::default().render().unwrap()).unwrap();

        assert_eq!(
            FieldConfiguration::load(&path).unwrap(),
            FieldConfiguration::default()
        );
        assert!(matches!(
            FieldConfiguration::load(&tmp.path().join("missing.yaml")),
            Err(StudyError::FileRead(_))
        ));
    }

    #[test]
    fn test_flatten_record_groups_by_value_object() {
        let record = StudyMetadataSnapshot {
            study_number: Some("0001".into()),
            ct_gov_id: Some("NCT00000001".into()),
            trial_type_codes: vec!["C49666".into()],
            ..Default::default()
        };

        let groups = FieldConfiguration::default().flatten_record(&record).unwrap();
        let paths: Vec<&str> = groups.iter().map(|g| g.grouping.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "identification",
                "identification.registry_identifiers",
                "version",
                "design",
                "population",
                "intervention",
                "description",
            ]
        );

        assert_eq!(groups[0].fields[0], ("study_number".to_owned(), serde_json::json!("0001")));
        assert_eq!(groups[1].value_object_class, "RegistryIdentifiers");
        assert_eq!(groups[1].fields[0].1, serde_json::json!("NCT00000001"));
        let trial_types = groups[3]
            .fields
            .iter()
            .find(|(name, _)| name == "trial_type_codes")
            .unwrap();
        assert_eq!(trial_types.1, serde_json::json!(["C49666"]));
    }
}
