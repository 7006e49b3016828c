use std::collections::BTreeMap;

use nalgebra as na;
use ndarray::Array2;
use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::config::TrackerConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEntry {
    pub id: u32,
    pub centroid: na::Point2<f32>,
    /// Consecutive updates without a matching observation.
    pub disappeared: u32,
}

/// Pairwise euclidean distances, rows are `current`, columns are `observed`.
pub fn distance_matrix(current: &[na::Point2<f32>], observed: &[na::Point2<f32>]) -> Array2<f32> {
    let mut mat = Array2::zeros((current.len(), observed.len()));

    for (r, a) in current.iter().enumerate() {
        for (c, b) in observed.iter().enumerate() {
            mat[(r, c)] = na::distance(a, b);
        }
    }

    mat
}

/// Greedy row-first assignment over a distance matrix.
///
/// Rows are visited by ascending row minimum (ties keep row order), each row
/// proposes the column holding its minimum (first one on ties). A proposal is
/// dropped when its column was already taken or when the distance exceeds
/// `max_distance`. Returns accepted `(row, column)` pairs in visiting order.
pub fn greedy_match(mat: &Array2<f32>, max_distance: f32) -> Vec<(usize, usize)> {
    let (nrows, ncols) = mat.dim();
    if nrows == 0 || ncols == 0 {
        return Vec::new();
    }

    let row_min: Vec<(usize, f32)> = mat
        .outer_iter()
        .map(|row| {
            row.iter()
                .copied()
                .enumerate()
                .fold((0, f32::INFINITY), |best, (c, v)| {
                    if v < best.1 {
                        (c, v)
                    } else {
                        best
                    }
                })
        })
        .collect();

    let mut order: Vec<usize> = (0..nrows).collect();
    order.sort_by(|&a, &b| row_min[a].1.total_cmp(&row_min[b].1));

    let mut used_rows = vec![false; nrows];
    let mut used_cols = vec![false; ncols];
    let mut pairs = Vec::with_capacity(nrows.min(ncols));

    for row in order {
        let (col, dist) = row_min[row];

        if used_rows[row] || used_cols[col] {
            continue;
        }

        if dist > max_distance {
            continue;
        }

        used_rows[row] = true;
        used_cols[col] = true;
        pairs.push((row, col));
    }

    pairs
}

/// Centroid tracker: associates per-frame boxes with persistent identities.
#[derive(Debug, Clone)]
pub struct CentroidTracker {
    config: TrackerConfig,
    next_id: u32,
    // ids are handed out in increasing order, so key order is registration order
    entries: BTreeMap<u32, TrackedEntry>,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&TrackedEntry> {
        self.entries.get(&id)
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = &'_ TrackedEntry> {
        self.entries.values()
    }

    /// Identity the next registration will receive.
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Last known centroid of every live identity.
    pub fn positions(&self) -> BTreeMap<u32, na::Point2<f32>> {
        self.entries
            .iter()
            .map(|(&id, e)| (id, e.centroid))
            .collect()
    }

    fn register(&mut self, centroid: na::Point2<f32>) {
        let id = self.next_id;
        self.next_id += 1;

        debug!(id, x = centroid.x, y = centroid.y, "register");

        self.entries.insert(
            id,
            TrackedEntry {
                id,
                centroid,
                disappeared: 0,
            },
        );
    }

    fn mark_disappeared(&mut self, id: u32) {
        let expired = match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.disappeared += 1;
                entry.disappeared > self.config.max_disappeared
            }
            None => false,
        };

        if expired {
            debug!(id, "deregister");
            self.entries.remove(&id);
        }
    }

    pub fn update(&mut self, boxes: &[BBox<Ltrb>]) -> BTreeMap<u32, na::Point2<f32>> {
        if boxes.is_empty() {
            let ids: Vec<u32> = self.entries.keys().copied().collect();
            for id in ids {
                self.mark_disappeared(id);
            }

            return self.positions();
        }

        let observed: Vec<na::Point2<f32>> = boxes.iter().map(BBox::centroid).collect();

        if self.entries.is_empty() {
            for centroid in observed {
                self.register(centroid);
            }

            return self.positions();
        }

        let ids: Vec<u32> = self.entries.keys().copied().collect();
        let current: Vec<na::Point2<f32>> = self.entries.values().map(|e| e.centroid).collect();

        let mat = distance_matrix(&current, &observed);
        let pairs = greedy_match(&mat, self.config.max_distance);

        let mut used_rows = vec![false; ids.len()];
        let mut used_cols = vec![false; observed.len()];

        for (row, col) in pairs {
            if let Some(entry) = self.entries.get_mut(&ids[row]) {
                entry.centroid = observed[col];
                entry.disappeared = 0;
            }

            used_rows[row] = true;
            used_cols[col] = true;
        }

        if ids.len() >= observed.len() {
            for (row, &id) in ids.iter().enumerate() {
                if !used_rows[row] {
                    self.mark_disappeared(id);
                }
            }
        } else {
            for (col, &centroid) in observed.iter().enumerate() {
                if !used_cols[col] {
                    self.register(centroid);
                }
            }
        }

        self.positions()
    }
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
