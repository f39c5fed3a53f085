//! Implementation of study uids and the version clock.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Canonical study uid (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained uid is guaranteed to be canonical, so path derivation and
/// string comparisons are consistent everywhere a study is referenced.
///
/// # Construction
/// - [`StudyUuid::new`] generates a fresh uid (for new study definitions).
/// - [`StudyUuid::parse`] validates an externally supplied identifier.
///
/// # Errors
/// [`StudyUuid::parse`] returns [`UuidError::InvalidInput`] if the input is not already
/// canonical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StudyUuid(Uuid);

impl Default for StudyUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl StudyUuid {
    /// Generates a new random (v4) study uid.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a uid string that must already be canonical.
    ///
    /// Hyphenated or uppercase forms are **not** normalised.
    ///
    /// # Arguments
    ///
    /// * `input` - Uid string to validate. Must be exactly 32 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if Self::is_canonical(input) {
            // SAFETY: is_canonical guarantees valid hex, so parse_str will succeed
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(UuidError::InvalidInput(format!(
            "study uid must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    /// Returns the inner `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is a canonical study uid.
    ///
    /// Purely syntactic: exactly 32 bytes, only `0-9` and `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uid>/` where `s1`/`s2` are the first two pairs of hex
    /// characters of this uid.
    ///
    /// # Arguments
    ///
    /// * `parent_dir` - Base directory under which to shard the uid.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for StudyUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for StudyUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudyUuid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StudyUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for StudyUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StudyUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Monotonic timestamp source for version metadata.
///
/// Every version slot of a study carries a timestamp, and the study's derived status depends on
/// which slot is the most recent. Two stamps taken within the same clock tick would make that
/// comparison ambiguous, so the clock never hands out a timestamp that is not strictly greater
/// than the latest one it is told about.
#[derive(Clone, Copy, Debug, Default)]
pub struct VersionClock;

impl VersionClock {
    /// Returns "now", or `last + 1ms` if the wall clock has not moved past `last`.
    ///
    /// # Arguments
    ///
    /// * `last` - The most recent timestamp already held by the caller, if any.
    pub fn next_after(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = Utc::now();

        match last {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        }
    }

    /// Like [`VersionClock::next_after`], taking the maximum of several previous stamps.
    pub fn next_after_all<I>(stamps: I) -> DateTime<Utc>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        Self::next_after(stamps.into_iter().max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_valid_uid() {
        let uid = StudyUuid::new();
        let canonical = uid.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(StudyUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let result = StudyUuid::parse(canonical);

        assert!(result.is_ok());
        assert_eq!(result.unwrap().to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uid() {
        let hyphenated = "550e8400-e29b-41d4-a716-446655440000";
        let result = StudyUuid::parse(hyphenated);

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_bad_lengths() {
        assert!(StudyUuid::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(StudyUuid::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(StudyUuid::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(StudyUuid::parse("550e8400e29b41d4a716446655440zzz").is_err());
        assert!(StudyUuid::parse("").is_err());
    }

    #[test]
    fn test_sharded_dir_structure() {
        let uid = StudyUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let parent = Path::new("/study_data/studies");

        assert_eq!(
            uid.sharded_dir(parent),
            PathBuf::from("/study_data/studies/55/0e/550e8400e29b41d4a716446655440000")
        );
    }

    #[test]
    fn test_sharded_dir_different_uids() {
        let uid1 = StudyUuid::parse("00112233445566778899aabbccddeeff").unwrap();
        let uid2 = StudyUuid::parse("aabbccddeeff00112233445566778899").unwrap();
        let parent = Path::new("/data");

        assert_eq!(
            uid1.sharded_dir(parent),
            PathBuf::from("/data/00/11/00112233445566778899aabbccddeeff")
        );
        assert_eq!(
            uid2.sharded_dir(parent),
            PathBuf::from("/data/aa/bb/aabbccddeeff00112233445566778899")
        );
    }

    #[test]
    fn test_from_str_round_trip() {
        let original = StudyUuid::new();
        let parsed: StudyUuid = original.to_string().parse().unwrap();

        assert_eq!(original, parsed);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let uid = StudyUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");

        let back: StudyUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);

        let bad = serde_json::from_str::<StudyUuid>("\"550e8400-e29b-41d4-a716-446655440000\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_version_clock_without_previous_is_now() {
        let before = Utc::now();
        let ts = VersionClock::next_after(None);
        let after = Utc::now();

        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_version_clock_bumps_past_future_timestamp() {
        let future = Utc::now() + Duration::hours(1);
        let ts = VersionClock::next_after(Some(future));

        assert_eq!(ts, future + Duration::milliseconds(1));
    }

    #[test]
    fn test_version_clock_strictly_increases() {
        let mut last = VersionClock::next_after(None);
        for _ in 0..100 {
            let next = VersionClock::next_after(Some(last));
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_version_clock_next_after_all_uses_maximum() {
        let now = Utc::now();
        let later = now + Duration::hours(2);
        let ts = VersionClock::next_after_all([now, later, now - Duration::hours(1)]);

        assert_eq!(ts, later + Duration::milliseconds(1));
        assert!(VersionClock::next_after_all(Vec::new()) <= Utc::now());
    }
}
