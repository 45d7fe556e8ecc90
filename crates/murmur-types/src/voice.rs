//! Per-user voice profile definitions.
//!
//! A `UserVoiceProfile` carries the four open_jtalk synthesis parameters a
//! user may tune. Profiles are only written once a user changes something;
//! everybody else speaks with [`UserVoiceProfile::DEFAULT`].

use crate::ValidationError;
use serde::{Deserialize, Serialize};

/// One tunable synthesis parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    /// All-pass constant.
    Alpha,
    /// Speech speed factor.
    Speed,
    /// Additional half-tone.
    Pitch,
    /// Weight of F0 variation (intonation).
    Accent,
}

impl ProfileField {
    pub const ALL: [ProfileField; 4] = [Self::Alpha, Self::Speed, Self::Pitch, Self::Accent];

    pub fn name(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Speed => "speed",
            Self::Pitch => "pitch",
            Self::Accent => "accent",
        }
    }

    /// Inclusive `(min, max)` bounds for this field.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::Alpha => (0.0, 1.0),
            Self::Speed => (0.1, 10.0),
            Self::Pitch => (-50.0, 50.0),
            Self::Accent => (0.0, 50.0),
        }
    }
}

/// Synthesis parameters for a single speaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserVoiceProfile {
    pub alpha: f64,
    pub speed: f64,
    pub pitch: f64,
    pub accent: f64,
}

impl UserVoiceProfile {
    /// Profile for users with no stored record.
    pub const DEFAULT: Self = Self {
        alpha: 0.54,
        speed: 1.0,
        pitch: 0.0,
        accent: 3.0,
    };

    /// Fixed profile for system-voiced utterances. Never persisted.
    pub const SYSTEM: Self = Self::DEFAULT;

    pub fn new(alpha: f64, speed: f64, pitch: f64, accent: f64) -> Self {
        Self {
            alpha,
            speed,
            pitch,
            accent,
        }
    }

    pub fn get(&self, field: ProfileField) -> f64 {
        match field {
            ProfileField::Alpha => self.alpha,
            ProfileField::Speed => self.speed,
            ProfileField::Pitch => self.pitch,
            ProfileField::Accent => self.accent,
        }
    }

    fn set(&mut self, field: ProfileField, value: f64) {
        match field {
            ProfileField::Alpha => self.alpha = value,
            ProfileField::Speed => self.speed = value,
            ProfileField::Pitch => self.pitch = value,
            ProfileField::Accent => self.accent = value,
        }
    }

    /// Checks every field against its bounds, in declaration order.
    ///
    /// NaN is rejected for every field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for field in ProfileField::ALL {
            let value = self.get(field);
            let (min, max) = field.bounds();
            if !(min..=max).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: field.name(),
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Returns `true` if any field differs from [`Self::DEFAULT`].
    pub fn differs_from_default(&self) -> bool {
        *self != Self::DEFAULT
    }

    /// Applies the fields of `candidate` that differ from the default
    /// baseline on top of `self`.
    ///
    /// Fields the candidate leaves at their default value keep whatever
    /// `self` already holds, so a user can change one parameter without
    /// restating the others.
    pub fn merged_with(&self, candidate: &Self) -> Self {
        let mut merged = *self;
        for field in ProfileField::ALL {
            let value = candidate.get(field);
            if value != Self::DEFAULT.get(field) {
                merged.set(field, value);
            }
        }
        merged
    }
}

impl Default for UserVoiceProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let p = UserVoiceProfile::default();
        assert_eq!(p, UserVoiceProfile::new(0.54, 1.0, 0.0, 3.0));
        assert!(!p.differs_from_default());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_reports_offending_field() {
        let cases = [
            (UserVoiceProfile::new(1.5, 1.0, 0.0, 3.0), "alpha"),
            (UserVoiceProfile::new(0.5, 0.05, 0.0, 3.0), "speed"),
            (UserVoiceProfile::new(0.5, 11.0, 0.0, 3.0), "speed"),
            (UserVoiceProfile::new(0.5, 1.0, -50.5, 3.0), "pitch"),
            (UserVoiceProfile::new(0.5, 1.0, 0.0, 51.0), "accent"),
            (UserVoiceProfile::new(f64::NAN, 1.0, 0.0, 3.0), "alpha"),
        ];
        for (profile, field) in cases {
            let err = profile.validate().unwrap_err();
            assert_eq!(err.field(), Some(field), "profile {profile:?}");
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(UserVoiceProfile::new(0.0, 0.1, -50.0, 0.0).validate().is_ok());
        assert!(UserVoiceProfile::new(1.0, 10.0, 50.0, 50.0).validate().is_ok());
    }

    #[test]
    fn merge_only_touches_non_default_fields() {
        let stored = UserVoiceProfile::new(0.3, 2.0, 5.0, 7.0);

        let only_alpha = UserVoiceProfile {
            alpha: 0.8,
            ..UserVoiceProfile::DEFAULT
        };
        assert_eq!(
            stored.merged_with(&only_alpha),
            UserVoiceProfile::new(0.8, 2.0, 5.0, 7.0)
        );

        let only_accent = UserVoiceProfile {
            accent: 10.0,
            ..UserVoiceProfile::DEFAULT
        };
        assert_eq!(
            stored.merged_with(&only_accent),
            UserVoiceProfile::new(0.3, 2.0, 5.0, 10.0)
        );

        assert_eq!(stored.merged_with(&UserVoiceProfile::DEFAULT), stored);
    }
}
