//! Axis-aligned bounding boxes for blocks and the global domain.

use serde::{Deserialize, Serialize};

/// Closed axis-aligned box `[min, max]` in 3D.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self::unit()
    }
}

impl Aabb {
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// `[0, 1]^3`.
    pub const fn unit() -> Self {
        Self::new([0.0; 3], [1.0; 3])
    }

    /// Per-axis `max - min`.
    #[inline]
    pub fn extent(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e[0] * e[1] * e[2]
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|d| p[d] >= self.min[d] && p[d] <= self.max[d])
    }

    /// Squared distance from `p` to the closest point of the box (0 inside).
    pub fn distance2_to(&self, p: [f64; 3]) -> f64 {
        let mut d2 = 0.0;
        for d in 0..3 {
            let excess = if p[d] < self.min[d] {
                self.min[d] - p[d]
            } else if p[d] > self.max[d] {
                p[d] - self.max[d]
            } else {
                0.0
            };
            d2 += excess * excess;
        }
        d2
    }

    /// Box shifted by `offset`.
    pub fn translated(&self, offset: [f64; 3]) -> Self {
        Self::new(
            [
                self.min[0] + offset[0],
                self.min[1] + offset[1],
                self.min[2] + offset[2],
            ],
            [
                self.max[0] + offset[0],
                self.max[1] + offset[1],
                self.max[2] + offset[2],
            ],
        )
    }

    /// Tight box around `points`, or `None` if the iterator is empty.
    pub fn of_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut bb = Self::new(first, first);
        for p in it {
            for d in 0..3 {
                bb.min[d] = bb.min[d].min(p[d]);
                bb.max[d] = bb.max[d].max(p[d]);
            }
        }
        Some(bb)
    }

    /// True when every axis has `min < max`.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|d| self.min[d] < self.max[d])
    }
}
