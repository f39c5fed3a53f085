//! Existence-check ports consumed by value-object validation and the aggregate.
//!
//! Every coded value a study can carry (project numbers, controlled terminology, null-value
//! reasons) is owned by some other system. The core never talks to those systems; it asks one
//! question per value domain through a small trait:
//!
//! - [`CodeLookup`]: does this code exist?
//! - [`StudyNumberLookup`]: is this study number already used by *another* study?
//! - [`TitleLookup`]: is this (short) title already used by a study with a different number?
//!
//! Closures implement the traits directly, so tests and adapters can wire ports inline. Ports
//! that a call site does not supply fall back to a [`Fallback`] policy chosen by that call site,
//! and all ports travel together in one [`ReferencePorts`] value.

use serde::Deserialize;
use std::collections::HashSet;

/// Answers whether a code is known in one value domain.
pub trait CodeLookup {
    fn exists(&self, code: &str) -> bool;
}

impl<F> CodeLookup for F
where
    F: Fn(&str) -> bool,
{
    fn exists(&self, code: &str) -> bool {
        self(code)
    }
}

/// Answers whether a study number is already taken.
///
/// `uid` identifies the study asking, so a study never collides with itself.
pub trait StudyNumberLookup {
    fn is_taken(&self, study_number: &str, uid: Option<&str>) -> bool;
}

impl<F> StudyNumberLookup for F
where
    F: Fn(&str, Option<&str>) -> bool,
{
    fn is_taken(&self, study_number: &str, uid: Option<&str>) -> bool {
        self(study_number, uid)
    }
}

/// Answers whether a title is already used by a study with a different study number.
pub trait TitleLookup {
    fn is_taken(&self, title: &str, study_number: Option<&str>) -> bool;
}

/// Newtype letting a closure act as a [`TitleLookup`].
///
/// Title and study-number lookups share a closure signature, so only one of them can get a
/// blanket impl.
pub struct TitleFn<F>(pub F);

impl<F> TitleLookup for TitleFn<F>
where
    F: Fn(&str, Option<&str>) -> bool,
{
    fn is_taken(&self, title: &str, study_number: Option<&str>) -> bool {
        (self.0)(title, study_number)
    }
}

/// Default answer for a port the caller did not supply.
///
/// `AssumeValid` accepts every code and reports every number/title as free.
/// `Reject` refuses every code and reports every number/title as taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    AssumeValid,
    Reject,
}

static ASSUME_VALID: Fallback = Fallback::AssumeValid;
static REJECT: Fallback = Fallback::Reject;

impl Fallback {
    fn as_static(self) -> &'static Fallback {
        match self {
            Fallback::AssumeValid => &ASSUME_VALID,
            Fallback::Reject => &REJECT,
        }
    }
}

impl CodeLookup for Fallback {
    fn exists(&self, _code: &str) -> bool {
        matches!(self, Fallback::AssumeValid)
    }
}

impl StudyNumberLookup for Fallback {
    fn is_taken(&self, _study_number: &str, _uid: Option<&str>) -> bool {
        matches!(self, Fallback::Reject)
    }
}

impl TitleLookup for Fallback {
    fn is_taken(&self, _title: &str, _study_number: Option<&str>) -> bool {
        matches!(self, Fallback::Reject)
    }
}

/// A fixed set of known codes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnownCodes(HashSet<String>);

impl KnownCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CodeLookup for KnownCodes {
    fn exists(&self, code: &str) -> bool {
        self.0.contains(code)
    }
}

/// All ports needed to validate study metadata, one per value domain.
///
/// Start from [`ReferencePorts::with_fallback`] (or one of its shorthands) and override the ports
/// you can answer:
///
/// ```ignore
/// let project = |code: &str| code == "P1";
/// let ports = ReferencePorts::reject_unverified().project(&project);
/// ```
#[derive(Clone, Copy)]
pub struct ReferencePorts<'a> {
    pub(crate) project: &'a dyn CodeLookup,
    pub(crate) study_number: &'a dyn StudyNumberLookup,
    pub(crate) study_title: &'a dyn TitleLookup,
    pub(crate) study_short_title: &'a dyn TitleLookup,
    pub(crate) null_value: &'a dyn CodeLookup,
    pub(crate) study_type: &'a dyn CodeLookup,
    pub(crate) trial_type: &'a dyn CodeLookup,
    pub(crate) trial_phase: &'a dyn CodeLookup,
    pub(crate) trial_intent_type: &'a dyn CodeLookup,
    pub(crate) therapeutic_area: &'a dyn CodeLookup,
    pub(crate) disease_condition_or_indication: &'a dyn CodeLookup,
    pub(crate) diagnosis_group: &'a dyn CodeLookup,
    pub(crate) sex_of_participants: &'a dyn CodeLookup,
    pub(crate) intervention_type: &'a dyn CodeLookup,
    pub(crate) control_type: &'a dyn CodeLookup,
    pub(crate) intervention_model: &'a dyn CodeLookup,
    pub(crate) trial_blinding_schema: &'a dyn CodeLookup,
}

impl ReferencePorts<'static> {
    /// Every port answers with `fallback`.
    pub fn with_fallback(fallback: Fallback) -> Self {
        let f = fallback.as_static();
        Self {
            project: f,
            study_number: f,
            study_title: f,
            study_short_title: f,
            null_value: f,
            study_type: f,
            trial_type: f,
            trial_phase: f,
            trial_intent_type: f,
            therapeutic_area: f,
            disease_condition_or_indication: f,
            diagnosis_group: f,
            sex_of_participants: f,
            intervention_type: f,
            control_type: f,
            intervention_model: f,
            trial_blinding_schema: f,
        }
    }

    pub fn assume_valid() -> Self {
        Self::with_fallback(Fallback::AssumeValid)
    }

    pub fn reject_unverified() -> Self {
        Self::with_fallback(Fallback::Reject)
    }
}

macro_rules! port_setters {
    ($( $(#[$doc:meta])* $name:ident: $trait:ident ),* $(,)?) => {
        impl<'a> ReferencePorts<'a> {
            $(
                $(#[$doc])*
                pub fn $name(mut self, lookup: &'a dyn $trait) -> Self {
                    self.$name = lookup;
                    self
                }
            )*
        }
    };
}

port_setters! {
    project: CodeLookup,
    study_number: StudyNumberLookup,
    study_title: TitleLookup,
    study_short_title: TitleLookup,
    /// Null-value (reason for missing) codes.
    null_value: CodeLookup,
    study_type: CodeLookup,
    trial_type: CodeLookup,
    trial_phase: CodeLookup,
    trial_intent_type: CodeLookup,
    therapeutic_area: CodeLookup,
    disease_condition_or_indication: CodeLookup,
    diagnosis_group: CodeLookup,
    sex_of_participants: CodeLookup,
    intervention_type: CodeLookup,
    control_type: CodeLookup,
    intervention_model: CodeLookup,
    trial_blinding_schema: CodeLookup,
}

impl std::fmt::Debug for ReferencePorts<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferencePorts").finish_non_exhaustive()
    }
}
