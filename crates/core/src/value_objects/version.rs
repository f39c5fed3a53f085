use super::{IntoFieldValue, Normalize};
use crate::{StudyError, StudyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of one version slot, and (derived) of the whole study.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StudyStatus {
    Draft,
    Released,
    Locked,
    Deleted,
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::Draft => "DRAFT",
            StudyStatus::Released => "RELEASED",
            StudyStatus::Locked => "LOCKED",
            StudyStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyStatus {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(StudyStatus::Draft),
            "RELEASED" => Ok(StudyStatus::Released),
            "LOCKED" => Ok(StudyStatus::Locked),
            "DELETED" => Ok(StudyStatus::Deleted),
            other => Err(StudyError::Validation(format!(
                "unknown study status '{other}'"
            ))),
        }
    }
}

/// Version number with exactly one decimal place, stored as tenths.
///
/// Locked versions are whole numbers (`1`, `2`, ...); each release adds `0.1` to the previous
/// release, so a release following lock `1` is `1.1`. Rendered and parsed as `"0.1"`, `"1"`,
/// `"1.1"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber(u32);

impl VersionNumber {
    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    /// The whole version number `n`, as given to the `n`-th locked version.
    pub const fn whole(n: u32) -> Self {
        Self(n * 10)
    }

    pub const fn tenths(self) -> u32 {
        self.0
    }

    pub const fn is_whole(self) -> bool {
        self.0 % 10 == 0
    }

    /// `previous + 0.1`, or `0.1` for the first release.
    pub fn next_release(previous: Option<VersionNumber>) -> Self {
        match previous {
            Some(prev) => Self(prev.0 + 1),
            None => Self(1),
        }
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.0 / 10)
        } else {
            write!(f, "{}.{}", self.0 / 10, self.0 % 10)
        }
    }
}

impl FromStr for VersionNumber {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StudyError::Validation(format!("invalid version number '{s}'"));
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        let (whole, tenth) = match s.split_once('.') {
            Some((whole, frac)) if digits(whole) && frac.len() == 1 && digits(frac) => {
                (whole, frac)
            }
            None if digits(s) => (s, "0"),
            _ => return Err(invalid()),
        };

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let tenth: u32 = tenth.parse().map_err(|_| invalid())?;
        whole
            .checked_mul(10)
            .and_then(|w| w.checked_add(tenth))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl Serialize for VersionNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl IntoFieldValue<Option<VersionNumber>> for VersionNumber {
    fn into_field_value(self) -> Option<VersionNumber> {
        Some(self)
    }
}

/// Who changed a version slot, when, why, and under which number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudyVersionMetadata {
    status: StudyStatus,
    timestamp: DateTime<Utc>,
    author: Option<String>,
    description: Option<String>,
    version_number: Option<VersionNumber>,
}

#[derive(Clone, Debug)]
pub struct StudyVersionMetadataBuilder {
    status: StudyStatus,
    timestamp: DateTime<Utc>,
    author: Option<String>,
    description: Option<String>,
    version_number: Option<VersionNumber>,
}

impl StudyVersionMetadataBuilder {
    pub fn status(mut self, status: StudyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn author(mut self, author: impl IntoFieldValue<Option<String>>) -> Self {
        self.author = author.into_field_value();
        self
    }

    pub fn description(mut self, description: impl IntoFieldValue<Option<String>>) -> Self {
        self.description = description.into_field_value();
        self
    }

    pub fn version_number(mut self, number: impl IntoFieldValue<Option<VersionNumber>>) -> Self {
        self.version_number = number.into_field_value();
        self
    }

    pub fn build(self) -> StudyVersionMetadata {
        StudyVersionMetadata {
            status: self.status,
            timestamp: self.timestamp,
            author: self.author.normalize(),
            description: self.description.normalize(),
            version_number: self.version_number,
        }
    }
}

impl StudyVersionMetadata {
    /// Starts a builder; status and timestamp are the only mandatory parts.
    pub fn builder(status: StudyStatus, timestamp: DateTime<Utc>) -> StudyVersionMetadataBuilder {
        StudyVersionMetadataBuilder {
            status,
            timestamp,
            author: None,
            description: None,
            version_number: None,
        }
    }

    /// Draft metadata: no number, no description.
    pub fn draft(timestamp: DateTime<Utc>, author: Option<&str>) -> Self {
        Self::builder(StudyStatus::Draft, timestamp)
            .author(author.map(str::to_owned))
            .build()
    }

    pub fn to_builder(&self) -> StudyVersionMetadataBuilder {
        StudyVersionMetadataBuilder {
            status: self.status,
            timestamp: self.timestamp,
            author: self.author.clone(),
            description: self.description.clone(),
            version_number: self.version_number,
        }
    }

    pub fn fix_some_values(
        &self,
        edit: impl FnOnce(StudyVersionMetadataBuilder) -> StudyVersionMetadataBuilder,
    ) -> Self {
        edit(self.to_builder()).build()
    }

    pub fn status(&self) -> StudyStatus {
        self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version_number(&self) -> Option<VersionNumber> {
        self.version_number
    }

    /// Checks the locked-version rules.
    ///
    /// A `LOCKED` slot needs a version number, an author and a description; any other status
    /// must not carry a number. The timestamp is always present by construction.
    ///
    /// Released slots written by the aggregate carry their release counter and are not run
    /// through this check.
    pub fn validate(&self) -> StudyResult<()> {
        let locked = self.status == StudyStatus::Locked;

        if locked && self.version_number.is_none() {
            return Err(StudyError::Validation(
                "LOCKED study must have locked version number.".into(),
            ));
        }

        if !locked && self.version_number.is_some() {
            return Err(StudyError::Validation(
                "Non-LOCKED study must not have locked version number.".into(),
            ));
        }

        if locked && (self.author.is_none() || self.description.is_none()) {
            return Err(StudyError::Validation(
                "version_info and version_author mandatory for LOCKED version".into(),
            ));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
