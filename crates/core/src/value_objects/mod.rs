//! Immutable value objects composing one version of study metadata.
//!
//! Each value object is a frozen set of fields. Construction goes through a builder whose
//! `build()` normalises input (free text trimmed with blanks dropped, code lists trimmed and
//! de-duplicated), so two objects built from equivalent input compare equal. Editing never
//! mutates: `fix_some_values` returns a copy with only the fields set in the closure changed.
//!
//! ```ignore
//! let design = HighLevelStudyDesign::builder()
//!     .trial_phase_code("C15600")
//!     .trial_type_codes(["C49666", "C49666 "])
//!     .build();
//! let edited = design.fix_some_values(|b| b.is_extension_trial(true));
//! ```

use study_types::{normalize_code_set, normalize_string};

/// Declares a value object, its builder and field accessors.
///
/// Fields are private; every field gets a `&T` accessor on the object and a setter on the
/// builder accepting anything that converts via [`IntoFieldValue`].
macro_rules! value_object {
    (
        $(#[$meta:meta])*
        pub struct $name:ident builds $builder:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            $( $field: $ty, )*
        }

        impl $name {
            pub fn builder() -> $builder {
                $builder::default()
            }

            /// Returns a builder pre-filled with this object's fields.
            pub fn to_builder(&self) -> $builder {
                $builder {
                    $( $field: self.$field.clone(), )*
                }
            }

            /// Returns a copy with the fields set by `edit` replaced.
            pub fn fix_some_values(&self, edit: impl FnOnce($builder) -> $builder) -> Self {
                edit(self.to_builder()).build()
            }

            $(
                $(#[$fmeta])*
                pub fn $field(&self) -> &$ty {
                    &self.$field
                }
            )*
        }

        #[derive(Clone, Debug, Default)]
        pub struct $builder {
            $( $field: $ty, )*
        }

        impl $builder {
            $(
                pub fn $field(mut self, value: impl $crate::value_objects::IntoFieldValue<$ty>) -> Self {
                    self.$field = value.into_field_value();
                    self
                }
            )*

            pub fn build(self) -> $name {
                $name {
                    $( $field: $crate::value_objects::Normalize::normalize(self.$field), )*
                }
            }
        }
    };
}

mod description;
mod design;
mod identification;
mod intervention;
mod population;
mod version;

pub use description::{StudyDescription, StudyDescriptionBuilder};
pub use design::{HighLevelStudyDesign, HighLevelStudyDesignBuilder};
pub use identification::{
    IdentificationCheck, RegistryIdentifiers, RegistryIdentifiersBuilder,
    StudyIdentificationMetadata, StudyIdentificationMetadataBuilder,
};
pub use intervention::{StudyIntervention, StudyInterventionBuilder};
pub use population::{StudyPopulation, StudyPopulationBuilder};
pub use version::{StudyStatus, StudyVersionMetadata, StudyVersionMetadataBuilder, VersionNumber};

/// Conversion accepted by value-object builder setters.
///
/// Lets callers write `.study_number("0001")`, `.is_extension_trial(true)` or
/// `.trial_type_codes(["C1", "C2"])` instead of spelling out `Some(..)` and owned strings.
pub trait IntoFieldValue<T> {
    fn into_field_value(self) -> T;
}

impl<T> IntoFieldValue<T> for T {
    fn into_field_value(self) -> T {
        self
    }
}

impl IntoFieldValue<Option<String>> for &str {
    fn into_field_value(self) -> Option<String> {
        Some(self.to_owned())
    }
}

impl IntoFieldValue<Option<String>> for String {
    fn into_field_value(self) -> Option<String> {
        Some(self)
    }
}

impl IntoFieldValue<Option<String>> for &String {
    fn into_field_value(self) -> Option<String> {
        Some(self.clone())
    }
}

impl IntoFieldValue<Option<bool>> for bool {
    fn into_field_value(self) -> Option<bool> {
        Some(self)
    }
}

impl IntoFieldValue<Option<u32>> for u32 {
    fn into_field_value(self) -> Option<u32> {
        Some(self)
    }
}

impl IntoFieldValue<Vec<String>> for Vec<&str> {
    fn into_field_value(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl IntoFieldValue<Vec<String>> for &[String] {
    fn into_field_value(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoFieldValue<Vec<String>> for [&str; N] {
    fn into_field_value(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

/// Normalisation applied by every builder's `build()`.
pub trait Normalize {
    fn normalize(self) -> Self;
}

impl Normalize for Option<String> {
    fn normalize(self) -> Self {
        normalize_string(self.as_deref())
    }
}

impl Normalize for Vec<String> {
    fn normalize(self) -> Self {
        normalize_code_set(self)
    }
}

impl Normalize for Option<bool> {
    fn normalize(self) -> Self {
        self
    }
}

impl Normalize for Option<u32> {
    fn normalize(self) -> Self {
        self
    }
}
