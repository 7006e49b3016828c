use std::time::Instant;

use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

/// Expensive full-frame object detector.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error>;
}

/// Cheap single-object tracker used between detector runs.
pub trait VisualTracker {
    fn start(&mut self, frame: &Frame, bbox: BBox<Ltrb>);
    fn advance(&mut self, frame: &Frame) -> BBox<Ltrb>;
}

/// Creates a fresh visual tracker for every accepted detection.
pub trait TrackerFactory {
    type Tracker: VisualTracker;

    fn create(&mut self) -> Self::Tracker;
}

impl<T, F> TrackerFactory for F
where
    T: VisualTracker,
    F: FnMut() -> T,
{
    type Tracker = T;

    #[inline]
    fn create(&mut self) -> T {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSource {
    Detected,
    Tracked,
}

/// Boxes produced for one frame and where they came from.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub source: BoxSource,
    pub boxes: Vec<BBox<Ltrb>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub skip_frames: u64,
    pub min_confidence: f32,
    pub target_class: i32,
}

/// Alternates the detector with per-object visual trackers.
///
/// Every `skip_frames`-th frame the detector runs and all visual trackers are
/// replaced by new ones seeded on the accepted detections; on the frames in
/// between each running tracker is advanced and its prediction emitted.
pub struct Scheduler<D, F: TrackerFactory> {
    detector: D,
    factory: F,
    trackers: Vec<F::Tracker>,
    config: SchedulerConfig,
    fps: f32,
}

impl<D: Detector, F: TrackerFactory> Scheduler<D, F> {
    pub fn new(detector: D, factory: F, config: SchedulerConfig) -> Self {
        Self {
            detector,
            factory,
            trackers: Vec::new(),
            config,
            fps: 0.0,
        }
    }

    #[inline]
    pub fn is_detection_frame(&self, elapsed: u64) -> bool {
        elapsed % self.config.skip_frames.max(1) == 0
    }

    /// Number of visual trackers currently running.
    #[inline]
    pub fn active_trackers(&self) -> usize {
        self.trackers.len()
    }

    /// Detector throughput measured on the last detection frame.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn reset(&mut self) {
        self.trackers.clear();
        self.fps = 0.0;
    }

    pub fn step(&mut self, frame: &Frame, elapsed: u64) -> Result<Schedule, Error> {
        if self.is_detection_frame(elapsed) {
            self.trackers.clear();

            let started = Instant::now();
            let detections = self.detector.detect(frame)?;
            let secs = started.elapsed().as_secs_f32();
            if secs > 0.0 {
                self.fps = 1.0 / secs;
            }

            let mut boxes = Vec::with_capacity(detections.len());

            for det in detections
                .iter()
                .filter(|d| d.is_target(self.config.min_confidence, self.config.target_class))
            {
                let mut tracker = self.factory.create();
                tracker.start(frame, det.bbox);

                self.trackers.push(tracker);
                boxes.push(det.bbox);
            }

            debug!(
                elapsed,
                detections = detections.len(),
                accepted = boxes.len(),
                "detect"
            );

            Ok(Schedule {
                source: BoxSource::Detected,
                boxes,
            })
        } else {
            let boxes: Vec<_> = self
                .trackers
                .iter_mut()
                .map(|t| t.advance(frame))
                .collect();

            Ok(Schedule {
                source: BoxSource::Tracked,
                boxes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::PERSON_CLASS;
    use image::RgbImage;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Scripted {
        calls: Rc<Cell<u32>>,
        detections: Vec<Detection>,
    }

    impl Detector for Scripted {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Error> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.detections.clone())
        }
    }

    /// Drifts 5px right on every advance.
    struct Drift(BBox<Ltrb>);

    impl VisualTracker for Drift {
        fn start(&mut self, _frame: &Frame, bbox: BBox<Ltrb>) {
            self.0 = bbox;
        }

        fn advance(&mut self, _frame: &Frame) -> BBox<Ltrb> {
            let b = self.0;
            self.0 = BBox::ltrb(b.left() + 5.0, b.top(), b.right() + 5.0, b.bottom());
            self.0
        }
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::new(64, 48), 0)
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            skip_frames: 3,
            min_confidence: 0.5,
            target_class: PERSON_CLASS,
        }
    }

    fn scheduler(
        calls: Rc<Cell<u32>>,
    ) -> Scheduler<Scripted, impl FnMut() -> Drift> {
        let detections = vec![
            Detection::new(BBox::ltrb(0.0, 0.0, 10.0, 10.0), 0.9, PERSON_CLASS),
            Detection::new(BBox::ltrb(20.0, 0.0, 30.0, 10.0), 0.4, PERSON_CLASS),
            Detection::new(BBox::ltrb(40.0, 0.0, 50.0, 10.0), 0.9, 3),
        ];

        Scheduler::new(
            Scripted { calls, detections },
            || Drift(BBox::ltrb(0.0, 0.0, 0.0, 0.0)),
            config(),
        )
    }

    #[test]
    fn detector_runs_only_on_cadence() {
        let calls = Rc::new(Cell::new(0));
        let mut s = scheduler(calls.clone());
        let f = frame();

        let sources: Vec<_> = (0..7).map(|i| s.step(&f, i).unwrap().source).collect();

        assert_eq!(calls.get(), 3);
        assert_eq!(
            sources,
            vec![
                BoxSource::Detected,
                BoxSource::Tracked,
                BoxSource::Tracked,
                BoxSource::Detected,
                BoxSource::Tracked,
                BoxSource::Tracked,
                BoxSource::Detected,
            ]
        );
    }

    #[test]
    fn only_confident_targets_seed_trackers() {
        let calls = Rc::new(Cell::new(0));
        let mut s = scheduler(calls);
        let f = frame();

        let sched = s.step(&f, 0).unwrap();
        assert_eq!(sched.boxes, vec![BBox::ltrb(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(s.active_trackers(), 1);
    }

    #[test]
    fn trackers_advance_between_detections_and_are_reseeded() {
        let calls = Rc::new(Cell::new(0));
        let mut s = scheduler(calls);
        let f = frame();

        s.step(&f, 0).unwrap();
        assert_eq!(s.step(&f, 1).unwrap().boxes, vec![BBox::ltrb(5.0, 0.0, 15.0, 10.0)]);
        assert_eq!(s.step(&f, 2).unwrap().boxes, vec![BBox::ltrb(10.0, 0.0, 20.0, 10.0)]);

        // a new detection frame drops the drifted trackers
        assert_eq!(s.step(&f, 3).unwrap().boxes, vec![BBox::ltrb(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(s.active_trackers(), 1);
        assert_eq!(s.step(&f, 4).unwrap().boxes, vec![BBox::ltrb(5.0, 0.0, 15.0, 10.0)]);
    }

    #[test]
    fn no_trackers_means_no_boxes() {
        let calls = Rc::new(Cell::new(0));
        let mut s = scheduler(calls);
        let f = frame();

        let sched = s.step(&f, 1).unwrap();
        assert_eq!(sched.source, BoxSource::Tracked);
        assert!(sched.boxes.is_empty());
    }
}
