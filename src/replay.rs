//! Offline collaborators: replay recorded detections instead of running a
//! model, and a tracker that simply holds its seed box.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::bbox::{BBox, Ltrb};
use crate::detection::{Detection, DetectionRecord};
use crate::error::Error;
use crate::frame::Frame;
use crate::scheduler::{Detector, VisualTracker};

/// Detections dumped one line per frame as `<frame_idx>:<json array>`.
#[derive(Debug, Default, Clone)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<Detection>>,
}

impl ReplayDetector {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut frames = HashMap::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (idx, vector) = line.split_once(':').ok_or_else(|| {
                Error::Detector(format!("line {}: expected `<frame>:<detections>`", lineno + 1))
            })?;

            let idx: u64 = idx.trim().parse().map_err(|_| {
                Error::Detector(format!("line {}: bad frame index {:?}", lineno + 1, idx))
            })?;

            let records: Vec<DetectionRecord> = serde_json::from_str(vector)?;
            frames.insert(idx, records.into_iter().map(Detection::from).collect());
        }

        Ok(Self { frames })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;

        Self::from_reader(std::io::BufReader::new(file))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}

/// Predicts the seed box, snapped to whole pixels, on every frame.
#[derive(Debug, Clone, Copy)]
pub struct HoldTracker {
    bbox: BBox<Ltrb>,
}

impl Default for HoldTracker {
    fn default() -> Self {
        Self {
            bbox: BBox::ltrb(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl VisualTracker for HoldTracker {
    fn start(&mut self, _frame: &Frame, bbox: BBox<Ltrb>) {
        self.bbox = bbox.truncated();
    }

    fn advance(&mut self, _frame: &Frame) -> BBox<Ltrb> {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    const DUMP: &str = r#"0:[{"x":50,"y":40,"w":20,"h":10,"p":0.9,"c":1}]
1:[]

5:[{"x":10,"y":10,"w":4,"h":4,"p":0.7,"c":1},{"x":90,"y":90,"w":4,"h":4,"p":0.2,"c":3}]
"#;

    #[test]
    fn replays_by_frame_index() {
        let mut det = ReplayDetector::from_reader(DUMP.as_bytes()).unwrap();
        assert_eq!(det.len(), 3);

        let frame = |i| Frame::new(RgbImage::new(4, 4), i);

        assert_eq!(det.detect(&frame(0)).unwrap().len(), 1);
        assert!(det.detect(&frame(1)).unwrap().is_empty());
        assert!(det.detect(&frame(3)).unwrap().is_empty());

        let five = det.detect(&frame(5)).unwrap();
        assert_eq!(five.len(), 2);
        assert_eq!(five[1].class, 3);
    }

    #[test]
    fn rejects_lines_without_index() {
        let err = ReplayDetector::from_reader("[]".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
    }

    #[test]
    fn hold_tracker_repeats_its_seed() {
        let frame = Frame::new(RgbImage::new(4, 4), 0);
        let mut t = HoldTracker::default();
        t.start(&frame, BBox::ltrb(1.0, 2.0, 3.0, 4.0));
        assert_eq!(t.advance(&frame), BBox::ltrb(1.0, 2.0, 3.0, 4.0));
        assert_eq!(t.advance(&frame), BBox::ltrb(1.0, 2.0, 3.0, 4.0));

        t.start(&frame, BBox::ltrb(1.5, 2.9, 3.2, 4.7));
        assert_eq!(t.advance(&frame), BBox::ltrb(1.0, 2.0, 3.0, 4.0));
    }
}
