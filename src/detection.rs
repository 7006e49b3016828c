use serde_derive::Deserialize;

use crate::bbox::{BBox, Ltrb};

/// Class id the stock detector models assign to people.
pub const PERSON_CLASS: i32 = 1;

/// Single detector output in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, confidence: f32, class: i32) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    /// Whether this detection should enter the tracking pipeline: confidence
    /// strictly above `min_confidence` and class equal to `target_class`.
    #[inline]
    pub fn is_target(&self, min_confidence: f32, target_class: i32) -> bool {
        self.confidence > min_confidence && self.class == target_class
    }
}

/// Serialized detection, (x,y) of the center and (width,height) of bbox
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct DetectionRecord {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Detection::new(
            BBox::xywh(r.x, r.y, r.w, r.h).as_ltrb(),
            r.confidence,
            r.class,
        )
    }
}
