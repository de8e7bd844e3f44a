//! Periodic-boundary wrap directions and the particle transform.
//!
//! A neighbor reached across the low-x face of the domain is tagged
//! [`WrapDir::X0`]; a particle sent to it is shifted by `+extent.x` so it
//! lands just past the receiver's high-x side. The remaining bits follow the
//! same pattern per axis.

use crate::topology::bounds::Aabb;
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of periodic wraps applied to a particle copy.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct WrapDir(pub u8);

impl WrapDir {
    pub const NONE: WrapDir = WrapDir(0x00);
    pub const X0: WrapDir = WrapDir(0x01);
    pub const X1: WrapDir = WrapDir(0x02);
    pub const Y0: WrapDir = WrapDir(0x04);
    pub const Y1: WrapDir = WrapDir(0x08);
    pub const Z0: WrapDir = WrapDir(0x10);
    pub const Z1: WrapDir = WrapDir(0x20);

    /// `(low bit, high bit)` per axis.
    pub const AXES: [(WrapDir, WrapDir); 3] = [
        (WrapDir::X0, WrapDir::X1),
        (WrapDir::Y0, WrapDir::Y1),
        (WrapDir::Z0, WrapDir::Z1),
    ];

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: WrapDir) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Translation a neighbor's bounds undergo when seen across this wrap.
    ///
    /// `X0` means the neighbor sits past our low-x face, so its bounds move by
    /// `-extent.x`; `X1` moves them by `+extent.x`.
    pub fn neighbor_shift(self, domain: &Aabb) -> [f64; 3] {
        let ext = domain.extent();
        let mut shift = [0.0; 3];
        for (d, (lo, hi)) in Self::AXES.iter().enumerate() {
            if self.contains(*lo) {
                shift[d] -= ext[d];
            }
            if self.contains(*hi) {
                shift[d] += ext[d];
            }
        }
        shift
    }
}

impl BitOr for WrapDir {
    type Output = WrapDir;
    fn bitor(self, rhs: WrapDir) -> WrapDir {
        WrapDir(self.0 | rhs.0)
    }
}

impl BitOrAssign for WrapDir {
    fn bitor_assign(&mut self, rhs: WrapDir) {
        self.0 |= rhs.0;
    }
}

/// Apply the periodic transform for a particle sent across `wrap`.
///
/// Returns the moved position together with the accumulated direction mask
/// (`dir | wrap`).
pub fn transform_particle(
    p: [f64; 3],
    dir: WrapDir,
    wrap: WrapDir,
    domain: &Aabb,
) -> ([f64; 3], WrapDir) {
    let ext = domain.extent();
    let mut out = p;
    let mut mask = dir;
    for (d, (lo, hi)) in WrapDir::AXES.iter().enumerate() {
        if wrap.contains(*lo) {
            out[d] += ext[d];
            mask |= *lo;
        }
        if wrap.contains(*hi) {
            out[d] -= ext[d];
            mask |= *hi;
        }
    }
    (out, mask)
}
