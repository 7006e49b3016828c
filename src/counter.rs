use std::collections::{BTreeMap, HashMap};

use nalgebra as na;
use tracing::info;

use crate::trackable::{TrackableObject, Zone};

/// Horizontal counting lines. `limit_out` sits above the midline and
/// `limit_in` below it; the band between them is where nothing is counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub midline: f32,
    pub limit_in: f32,
    pub limit_out: f32,
}

impl Boundary {
    #[inline]
    pub fn new(midline: f32, limit_in: f32, limit_out: f32) -> Self {
        Self {
            midline,
            limit_in,
            limit_out,
        }
    }

    /// Lines at `height/2 ± height*offset`, truncated to whole pixels.
    pub fn from_height(height: u32, offset: f32) -> Self {
        let h = height as f32;
        let mid = h / 2.0;

        Self {
            midline: mid,
            limit_in: (mid + h * offset).trunc(),
            limit_out: (mid - h * offset).trunc(),
        }
    }
}

/// What a single `apply` did to one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Entered,
    Exited,
}

#[derive(Debug, Clone)]
pub struct CrossingCounter {
    boundary: Boundary,
    total_in: u64,
    total_out: u64,
    objects: HashMap<u32, TrackableObject>,
}

impl CrossingCounter {
    pub fn new(boundary: Boundary) -> Self {
        Self {
            boundary,
            total_in: 0,
            total_out: 0,
            objects: HashMap::new(),
        }
    }

    #[inline]
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    #[inline]
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    #[inline]
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    #[inline]
    pub fn inside(&self) -> i64 {
        self.total_in as i64 - self.total_out as i64
    }

    #[inline]
    pub fn object(&self, id: u32) -> Option<&TrackableObject> {
        self.objects.get(&id)
    }

    #[inline]
    pub fn objects(&self) -> impl Iterator<Item = &'_ TrackableObject> {
        self.objects.values()
    }

    fn step(&mut self, id: u32, centroid: na::Point2<f32>) -> Option<Crossing> {
        let boundary = self.boundary;

        let obj = match self.objects.get_mut(&id) {
            Some(obj) => obj,
            None => {
                let zone = Zone::initial(centroid.y, boundary.midline);
                self.objects
                    .insert(id, TrackableObject::new(id, centroid, zone));

                return None;
            }
        };

        let crossing = match obj.zone {
            Zone::In if centroid.y <= boundary.limit_out => {
                obj.zone = Zone::Out;
                self.total_out += 1;
                Some(Crossing::Exited)
            }
            Zone::Out if centroid.y >= boundary.limit_in => {
                obj.zone = Zone::In;
                self.total_in += 1;
                Some(Crossing::Entered)
            }
            _ => None,
        };

        obj.centroids.push(centroid);

        crossing
    }

    /// Feeds one frame worth of tracker output. Objects whose identity is no
    /// longer in `mapping` were deregistered by the tracker and are dropped.
    pub fn apply(&mut self, mapping: &BTreeMap<u32, na::Point2<f32>>) {
        self.objects.retain(|id, _| mapping.contains_key(id));

        for (&id, &centroid) in mapping {
            match self.step(id, centroid) {
                Some(Crossing::Entered) => {
                    info!(id, total_in = self.total_in, "entered");
                }
                Some(Crossing::Exited) => {
                    info!(id, total_out = self.total_out, "exited");
                }
                None => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(id: u32, y: f32) -> BTreeMap<u32, na::Point2<f32>> {
        let mut m = BTreeMap::new();
        m.insert(id, na::Point2::new(100.0, y));
        m
    }

    fn counter() -> CrossingCounter {
        CrossingCounter::new(Boundary::new(240.0, 288.0, 192.0))
    }

    #[test]
    fn limits_follow_frame_height() {
        let b = Boundary::from_height(480, 0.2);
        assert_eq!(b.midline, 240.0);
        assert_eq!(b.limit_in, 336.0);
        assert_eq!(b.limit_out, 144.0);

        let b = Boundary::from_height(481, 0.1);
        assert_eq!(b.limit_in, 288.0);
        assert_eq!(b.limit_out, 192.0);
    }

    #[test]
    fn entering_counts_once() {
        let mut c = counter();

        for y in [40.0, 60.0, 200.0] {
            c.apply(&single(0, y));
            assert_eq!(c.total_in(), 0);
        }
        assert_eq!(c.object(0).unwrap().zone, Zone::Out);

        c.apply(&single(0, 300.0));
        assert_eq!(c.total_in(), 1);
        assert_eq!(c.object(0).unwrap().zone, Zone::In);

        for y in [250.0, 300.0, 250.0, 300.0] {
            c.apply(&single(0, y));
        }
        assert_eq!(c.total_in(), 1);
        assert_eq!(c.total_out(), 0);
        assert_eq!(c.object(0).unwrap().centroids.len(), 8);
    }

    #[test]
    fn exiting_requires_reaching_limit_out() {
        let mut c = counter();
        c.apply(&single(0, 400.0));
        assert_eq!(c.object(0).unwrap().zone, Zone::In);

        c.apply(&single(0, 193.0));
        assert_eq!(c.total_out(), 0);

        c.apply(&single(0, 192.0));
        assert_eq!(c.total_out(), 1);
        assert_eq!(c.object(0).unwrap().zone, Zone::Out);
        assert_eq!(c.inside(), -1);
    }

    #[test]
    fn first_sighting_never_counts() {
        let mut c = counter();
        c.apply(&single(0, 470.0));
        c.apply(&single(1, 5.0));
        assert_eq!((c.total_in(), c.total_out()), (0, 0));
    }

    #[test]
    fn dead_band_never_flips() {
        let mut c = counter();
        c.apply(&single(0, 100.0));
        for y in (193..288).map(|v| v as f32) {
            c.apply(&single(0, y));
        }
        assert_eq!(c.object(0).unwrap().zone, Zone::Out);
        assert_eq!(c.total_in(), 0);
    }

    #[test]
    fn departed_identities_are_pruned() {
        let mut c = counter();
        c.apply(&single(0, 100.0));
        c.apply(&single(1, 100.0));

        assert!(c.object(0).is_none());
        assert!(c.object(1).is_some());
    }

    #[test]
    fn round_trip_counts_both_ways() {
        let mut c = counter();
        for y in [100.0, 300.0, 150.0, 350.0] {
            c.apply(&single(7, y));
        }
        assert_eq!((c.total_in(), c.total_out()), (2, 1));
        assert_eq!(c.inside(), 1);
    }
}
