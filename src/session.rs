use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::annotate::{annotate, encode_jpeg, EncodedFrame, Overlay};
use crate::capture::{Capture, CaptureOpener};
use crate::config::SessionConfig;
use crate::counter::{Boundary, CrossingCounter};
use crate::error::Error;
use crate::frame::Frame;
use crate::scheduler::{Detector, Scheduler, SchedulerConfig, TrackerFactory};
use crate::tracker::CentroidTracker;

#[derive(Debug, Default, Clone, Copy)]
struct Published {
    open: bool,
    total_in: u64,
    total_out: u64,
    fps: f32,
}

/// Session state readable from other threads while frames are produced.
/// Liveness and counters live under one lock so a close can never be
/// followed by a publish of the old totals.
#[derive(Debug, Default)]
struct Shared {
    state: Mutex<Published>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Published> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Published {
        *self.lock()
    }

    fn set_open(&self) {
        *self.lock() = Published {
            open: true,
            ..Published::default()
        };
    }

    fn close(&self) {
        *self.lock() = Published::default();
    }

    fn publish(&self, counter: &CrossingCounter, fps: f32) {
        let mut state = self.lock();

        // a concurrent close() already zeroed the counters
        if !state.open {
            return;
        }

        state.total_in = counter.total_in();
        state.total_out = counter.total_out();
        state.fps = fps;
    }
}

/// Cloneable, thread-safe view of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.snapshot().open
    }

    #[inline]
    pub fn total_in(&self) -> u64 {
        self.shared.snapshot().total_in
    }

    #[inline]
    pub fn total_out(&self) -> u64 {
        self.shared.snapshot().total_out
    }

    #[inline]
    pub fn persons_inside(&self) -> i64 {
        let state = self.shared.snapshot();
        state.total_in as i64 - state.total_out as i64
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.shared.snapshot().fps
    }

    /// Stops frame production and zeroes the counters. The capture itself
    /// is released by the producing side on its next pull, or when the
    /// [`Session`] is dropped.
    pub fn close(&self) {
        self.shared.close();
    }
}

struct Stream<C> {
    capture: C,
    boundary: Boundary,
    tracker: CentroidTracker,
    counter: CrossingCounter,
    elapsed: u64,
    failures: u32,
}

/// One camera stream: capture, detect/track scheduling, identity tracking
/// and crossing counts, from `open` until `close`.
pub struct Session<O: CaptureOpener, D, F: TrackerFactory> {
    config: SessionConfig,
    opener: O,
    scheduler: Scheduler<D, F>,
    shared: Arc<Shared>,
    stream: Option<Stream<O::Capture>>,
}

impl<O, D, F> Session<O, D, F>
where
    O: CaptureOpener,
    D: Detector,
    F: TrackerFactory,
{
    pub fn new(config: SessionConfig, opener: O, detector: D, factory: F) -> Result<Self, Error> {
        config.validate()?;

        let scheduler = Scheduler::new(
            detector,
            factory,
            SchedulerConfig {
                skip_frames: config.skip_frames,
                min_confidence: config.min_confidence,
                target_class: config.target_class,
            },
        );

        Ok(Self {
            config,
            opener,
            scheduler,
            shared: Arc::new(Shared::default()),
            stream: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.snapshot().open
    }

    #[inline]
    pub fn total_in(&self) -> u64 {
        self.shared.snapshot().total_in
    }

    #[inline]
    pub fn total_out(&self) -> u64 {
        self.shared.snapshot().total_out
    }

    #[inline]
    pub fn persons_inside(&self) -> i64 {
        let state = self.shared.snapshot();
        state.total_in as i64 - state.total_out as i64
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.shared.snapshot().fps
    }

    /// Counting lines of the open stream.
    pub fn boundary(&self) -> Option<Boundary> {
        self.stream.as_ref().map(|s| s.boundary)
    }

    /// Tracker of the open stream.
    pub fn tracker(&self) -> Option<&CentroidTracker> {
        self.stream.as_ref().map(|s| &s.tracker)
    }

    /// Acquires the source and starts from fresh tracker and counter state.
    /// Reopening an open session closes it first.
    pub fn open(&mut self) -> Result<(), Error> {
        if self.stream.is_some() {
            self.close();
        }

        let capture = self.opener.open()?;
        let (width, height) = capture.dims();
        let boundary = Boundary::from_height(height, self.config.boundary_offset);

        info!(
            uri = self.opener.uri(),
            width,
            height,
            limit_in = boundary.limit_in,
            limit_out = boundary.limit_out,
            "session opened"
        );

        self.scheduler.reset();
        self.stream = Some(Stream {
            capture,
            boundary,
            tracker: CentroidTracker::new(self.config.tracker),
            counter: CrossingCounter::new(boundary),
            elapsed: 0,
            failures: 0,
        });

        self.shared.set_open();

        Ok(())
    }

    /// Releases the capture and zeroes the counters. Idempotent.
    pub fn close(&mut self) {
        self.shared.close();
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!(
                uri = self.opener.uri(),
                total_in = stream.counter.total_in(),
                total_out = stream.counter.total_out(),
                "session closed"
            );

            self.scheduler.reset();
        }
    }

    /// Lazy sequence of annotated frames, ends once the session is closed.
    pub fn frames(&mut self) -> Frames<'_, O, D, F> {
        Frames { session: self }
    }

    /// Reads, processes and encodes the next frame. `None` once the session
    /// is closed (or was never opened).
    pub fn next_frame(&mut self) -> Option<Result<EncodedFrame, Error>> {
        loop {
            if !self.is_open() {
                self.teardown();
                return None;
            }

            let stream = self.stream.as_mut()?;

            if let Some(frame) = stream.capture.read() {
                stream.failures = 0;

                let result = process(
                    stream,
                    &mut self.scheduler,
                    &self.shared,
                    self.config.jpeg_quality,
                    frame,
                );

                return Some(result);
            }

            stream.failures += 1;
            if let Some(attempts) = self.config.max_reopen_attempts {
                if stream.failures > attempts {
                    // counters and tracker stay as they are, the next pull
                    // starts a fresh round of attempts
                    stream.failures = 0;

                    return Some(Err(Error::ReopenExhausted { attempts }));
                }
            }

            warn!(
                uri = self.opener.uri(),
                attempt = stream.failures,
                "frame read failed, reopening source"
            );

            match self.opener.open() {
                Ok(capture) => {
                    stream.capture = capture;
                    stream.elapsed = 0;
                }
                Err(err) => warn!("reopen failed: {}", err),
            }
        }
    }
}

fn process<C, D, F>(
    stream: &mut Stream<C>,
    scheduler: &mut Scheduler<D, F>,
    shared: &Shared,
    jpeg_quality: u8,
    frame: Frame,
) -> Result<EncodedFrame, Error>
where
    D: Detector,
    F: TrackerFactory,
{
    let schedule = scheduler.step(&frame, stream.elapsed)?;
    let objects = stream.tracker.update(&schedule.boxes);
    stream.counter.apply(&objects);
    stream.elapsed += 1;

    shared.publish(&stream.counter, scheduler.fps());

    let index = frame.index;
    let mut image = frame.image;

    annotate(
        &mut image,
        &Overlay {
            boxes: &schedule.boxes,
            source: schedule.source,
            objects: &objects,
            boundary: &stream.boundary,
            total_in: stream.counter.total_in(),
            total_out: stream.counter.total_out(),
        },
    );

    Ok(EncodedFrame {
        jpeg: encode_jpeg(&image, jpeg_quality)?,
        index,
        source: schedule.source,
        tracked: objects.len(),
        total_in: stream.counter.total_in(),
        total_out: stream.counter.total_out(),
    })
}

impl<O: CaptureOpener, D, F: TrackerFactory> Drop for Session<O, D, F> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

pub struct Frames<'a, O: CaptureOpener, D, F: TrackerFactory> {
    session: &'a mut Session<O, D, F>,
}

impl<'a, O, D, F> Iterator for Frames<'a, O, D, F>
where
    O: CaptureOpener,
    D: Detector,
    F: TrackerFactory,
{
    type Item = Result<EncodedFrame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.session.next_frame()
    }
}
