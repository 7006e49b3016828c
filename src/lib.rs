//! Directional flow counting over a stream of per-frame detections.
//!
//! A [`Session`] alternates an expensive [`Detector`] with cheap per-object
//! [`VisualTracker`]s ([`Scheduler`]), associates the resulting boxes with
//! stable identities ([`CentroidTracker`]) and counts identities crossing two
//! horizontal lines ([`CrossingCounter`]).

pub mod annotate;
pub mod bbox;
pub mod capture;
pub mod config;
pub mod counter;
pub mod detection;
pub mod error;
pub mod frame;
pub mod replay;
pub mod scheduler;
pub mod session;
pub mod trackable;
pub mod tracker;

pub use annotate::EncodedFrame;
pub use capture::{Capture, CaptureOpener, ImageSequence};
pub use config::{SessionConfig, TrackerConfig};
pub use counter::{Boundary, CrossingCounter};
pub use detection::{Detection, PERSON_CLASS};
pub use error::Error;
pub use frame::Frame;
pub use scheduler::{BoxSource, Detector, Scheduler, TrackerFactory, VisualTracker};
pub use session::{Session, SessionHandle};
pub use trackable::{TrackableObject, Zone};
pub use tracker::CentroidTracker;
