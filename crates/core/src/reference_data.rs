//! Reference-data catalogue backed by a YAML file.
//!
//! The catalogue answers the code-existence ports from static code lists, one list per value
//! domain. Domains the file does not list answer with the catalogue's `unlisted` policy.
//!
//! ```yaml
//! unlisted: reject
//! project: [P1, P2]
//! null_value: [C48660]
//! trial_phase: [C15600, C15601]
//! ```

use crate::ports::{Fallback, KnownCodes, ReferencePorts};
use crate::{StudyError, StudyResult};
use serde::Deserialize;
use std::path::Path;
use study_types::NonEmptyText;

macro_rules! catalogue {
    ($($domain:ident),* $(,)?) => {
        /// Known codes per value domain.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct ReferenceCatalogue {
            unlisted: Fallback,
            $( $domain: Option<KnownCodes>, )*
        }

        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct ReferenceCatalogueWire {
            #[serde(default)]
            unlisted: Option<Fallback>,
            $(
                #[serde(default)]
                $domain: Option<Vec<NonEmptyText>>,
            )*
        }

        impl ReferenceCatalogue {
            /// A catalogue with no code lists, answering every domain with `unlisted`.
            pub fn empty(unlisted: Fallback) -> Self {
                Self {
                    unlisted,
                    $( $domain: None, )*
                }
            }

            fn from_wire(wire: ReferenceCatalogueWire) -> Self {
                Self {
                    unlisted: wire.unlisted.unwrap_or(Fallback::Reject),
                    $(
                        $domain: wire
                            .$domain
                            .map(|codes| KnownCodes::new(codes.into_iter().map(NonEmptyText::into_string))),
                    )*
                }
            }

            /// Ports answering from this catalogue.
            ///
            /// Study-number and title uniqueness are not catalogue data; those ports answer with
            /// the `unlisted` policy until the caller overrides them.
            pub fn ports(&self) -> ReferencePorts<'_> {
                let mut ports: ReferencePorts<'_> = ReferencePorts::with_fallback(self.unlisted);
                $(
                    if let Some(codes) = &self.$domain {
                        ports = ports.$domain(codes);
                    }
                )*
                ports
            }

            /// Names of the domains this catalogue lists codes for.
            pub fn listed_domains(&self) -> Vec<&'static str> {
                let mut listed = Vec::new();
                $(
                    if self.$domain.is_some() {
                        listed.push(stringify!($domain));
                    }
                )*
                listed
            }
        }
    };
}

catalogue! {
    project,
    null_value,
    study_type,
    trial_type,
    trial_phase,
    trial_intent_type,
    therapeutic_area,
    disease_condition_or_indication,
    diagnosis_group,
    sex_of_participants,
    intervention_type,
    control_type,
    intervention_model,
    trial_blinding_schema,
}

impl Default for ReferenceCatalogue {
    /// No reference data configured: every code is accepted.
    fn default() -> Self {
        Self::empty(Fallback::AssumeValid)
    }
}

impl ReferenceCatalogue {
    pub fn unlisted(&self) -> Fallback {
        self.unlisted
    }

    /// Parses a catalogue from YAML text.
    ///
    /// A file that omits `unlisted` rejects codes from domains it does not list.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidConfig` naming the failing path if the YAML does not match the
    /// catalogue schema (unknown domain, blank code, wrong type).
    pub fn parse(yaml_text: &str) -> StudyResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        match serde_path_to_error::deserialize::<_, ReferenceCatalogueWire>(deserializer) {
            Ok(wire) => Ok(Self::from_wire(wire)),
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                Err(StudyError::InvalidConfig(format!(
                    "reference data schema mismatch at {path}: {source}"
                )))
            }
        }
    }

    /// Reads and parses a catalogue file.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::FileRead` if the file cannot be read, otherwise as
    /// [`ReferenceCatalogue::parse`].
    pub fn load(path: &Path) -> StudyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(StudyError::FileRead)?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CodeLookup;
    use crate::value_objects::HighLevelStudyDesign;
    use tempfile::TempDir;

    const CATALOGUE: &str = "\
project: [P1, P2]
trial_phase:
  - C15600
  - ' C15601 '
";

    #[test]
    fn test_listed_domains_answer_from_codes() {
        let catalogue = ReferenceCatalogue::parse(CATALOGUE).unwrap();
        let ports = catalogue.ports();

        assert_eq!(catalogue.listed_domains(), vec!["project", "trial_phase"]);
        assert!(ports.project.exists("P2"));
        assert!(!ports.project.exists("P3"));
        assert!(ports.trial_phase.exists("C15601"));
    }

    #[test]
    fn test_unlisted_domains_reject_by_default() {
        let catalogue = ReferenceCatalogue::parse(CATALOGUE).unwrap();
        assert_eq!(catalogue.unlisted(), Fallback::Reject);

        let design = HighLevelStudyDesign::builder().study_type_code("C98388").build();
        assert!(!design.is_valid(&catalogue.ports()));
    }

    #[test]
    fn test_unlisted_policy_can_assume_valid() {
        let catalogue =
            ReferenceCatalogue::parse("unlisted: assume_valid\nproject: [P1]\n").unwrap();
        let design = HighLevelStudyDesign::builder().study_type_code("C98388").build();

        assert!(design.is_valid(&catalogue.ports()));
        assert!(!catalogue.ports().project.exists("P9"));
    }

    #[test]
    fn test_default_accepts_everything() {
        let catalogue = ReferenceCatalogue::default();
        assert!(catalogue.listed_domains().is_empty());
        assert!(catalogue.ports().therapeutic_area.exists("anything"));
    }

    #[test]
    fn test_parse_errors_name_the_path() {
        let err = ReferenceCatalogue::parse("trial_phase: [C15600, '  ']\n").unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("trial_phase[1]")));

        let err = ReferenceCatalogue::parse("colour: [red]\n").unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(msg) if msg.contains("schema mismatch")));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reference.yaml");
        std::fs::write(&path, CATALOGUE).unwrap();

        let catalogue = ReferenceCatalogue::load(&path).unwrap();
        assert_eq!(catalogue, ReferenceCatalogue::parse(CATALOGUE).unwrap());
    }
}
