use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::detection::PERSON_CLASS;
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive missed updates tolerated before an identity is dropped.
    pub max_disappeared: u32,
    /// Largest centroid displacement (px) still treated as the same object.
    pub max_distance: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_disappeared: 30,
            max_distance: 120.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub min_confidence: f32,
    pub target_class: i32,
    /// Run the detector on every `skip_frames`-th frame, track in between.
    pub skip_frames: u64,
    /// Distance of both counting lines from the midline, as a fraction of
    /// the frame height.
    pub boundary_offset: f32,
    pub jpeg_quality: u8,
    /// Consecutive failed read-and-reopen cycles after which the stream
    /// yields [`Error::ReopenExhausted`]. `None` keeps reopening forever.
    pub max_reopen_attempts: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            min_confidence: 0.5,
            target_class: PERSON_CLASS,
            skip_frames: 5,
            boundary_offset: 0.2,
            jpeg_quality: 80,
            max_reopen_attempts: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let config: SessionConfig = serde_json::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;

        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.skip_frames == 0 {
            return Err(Error::Config("skip_frames must be at least 1".into()));
        }

        if self.tracker.max_distance.is_nan() || self.tracker.max_distance < 0.0 {
            return Err(Error::Config(format!(
                "max_distance must be non-negative, got {}",
                self.tracker.max_distance
            )));
        }

        if !(0.0..0.5).contains(&self.boundary_offset) {
            return Err(Error::Config(format!(
                "boundary_offset must be in [0, 0.5), got {}",
                self.boundary_offset
            )));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_deployment() {
        let c = SessionConfig::default();
        assert_eq!(c.tracker.max_disappeared, 30);
        assert_eq!(c.tracker.max_distance, 120.0);
        assert_eq!(c.skip_frames, 5);
        assert_eq!(c.target_class, PERSON_CLASS);
        assert_eq!(c.max_reopen_attempts, None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = SessionConfig::from_json_str(r#"{"skip_frames": 2, "tracker": {"max_distance": 60}}"#)
            .unwrap();
        assert_eq!(c.skip_frames, 2);
        assert_eq!(c.tracker.max_distance, 60.0);
        assert_eq!(c.tracker.max_disappeared, 30);
        assert_eq!(c.min_confidence, 0.5);
        assert_eq!(c.max_reopen_attempts, None);

        let c = SessionConfig::from_json_str(r#"{"max_reopen_attempts": 4}"#).unwrap();
        assert_eq!(c.max_reopen_attempts, Some(4));
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let err = SessionConfig::from_json_str(r#"{"skip_frames": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn offset_past_midline_is_rejected() {
        let c = SessionConfig {
            boundary_offset: 0.5,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_json_surfaces_parse_error() {
        assert!(matches!(
            SessionConfig::from_json_str("{skip_frames"),
            Err(Error::Json(_))
        ));
    }
}
