use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// Side of the counting boundary an identity is currently attributed to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    In,
    Out,
}

impl Zone {
    /// Starting zone of a newly seen identity: objects first seen in the
    /// upper half are assumed to be heading in, everything else heading out.
    #[inline]
    pub fn initial(y: f32, midline: f32) -> Self {
        if y < midline {
            Zone::Out
        } else {
            Zone::In
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackableObject {
    pub id: u32,
    pub centroids: Vec<na::Point2<f32>>,
    pub zone: Zone,
}

impl TrackableObject {
    pub fn new(id: u32, centroid: na::Point2<f32>, zone: Zone) -> Self {
        Self {
            id,
            centroids: vec![centroid],
            zone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midline_itself_starts_in() {
        assert_eq!(Zone::initial(239.9, 240.0), Zone::Out);
        assert_eq!(Zone::initial(240.0, 240.0), Zone::In);
    }

    #[test]
    fn zone_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Zone::Out).unwrap(), "\"out\"");
    }
}
