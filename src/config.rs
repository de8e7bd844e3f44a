//! Process-wide tessellation settings, passed by reference to every stage.

use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use serde::{Deserialize, Serialize};

/// Scale factor turning a cell volume into the squared diameter of the
/// smallest sphere of that volume: `(6 / pi)^(2/3)`.
pub const MIN_DIAMETER2_FACTOR: f64 = 1.539339;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TessConfig {
    /// Global domain; vertices outside it make a cell incomplete unless `wrap`.
    pub domain: Aabb,
    /// Periodic boundary conditions.
    pub wrap: bool,
    /// Smallest volume kept by the final filter. `<= 0` disables the bound.
    pub min_vol: f64,
    /// Largest volume kept by the final filter. `<= 0` disables the bound.
    pub max_vol: f64,
    pub num_vol_bins: usize,
    pub num_dense_bins: usize,
}

impl Default for TessConfig {
    fn default() -> Self {
        Self {
            domain: Aabb::unit(),
            wrap: false,
            min_vol: 0.0,
            max_vol: 0.0,
            num_vol_bins: 50,
            num_dense_bins: 100,
        }
    }
}

impl TessConfig {
    pub fn new(domain: Aabb) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }

    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_volume_range(mut self, min_vol: f64, max_vol: f64) -> Self {
        self.min_vol = min_vol;
        self.max_vol = max_vol;
        self
    }

    pub fn with_bins(mut self, num_vol_bins: usize, num_dense_bins: usize) -> Self {
        self.num_vol_bins = num_vol_bins;
        self.num_dense_bins = num_dense_bins;
        self
    }

    pub fn validate(&self) -> Result<(), TessError> {
        if !self.domain.is_valid() {
            return Err(TessError::InvalidConfig(format!(
                "domain must have min < max on every axis, got {:?}",
                self.domain
            )));
        }
        if self.min_vol > 0.0 && self.max_vol > 0.0 && self.min_vol > self.max_vol {
            return Err(TessError::InvalidConfig(format!(
                "min_vol {} exceeds max_vol {}",
                self.min_vol, self.max_vol
            )));
        }
        if self.num_vol_bins == 0 || self.num_dense_bins == 0 {
            return Err(TessError::InvalidConfig(
                "histograms need at least one bin".into(),
            ));
        }
        Ok(())
    }

    /// Squared diameter below which a cell is certainly smaller than
    /// `min_vol`, or `None` when the lower bound is disabled.
    pub fn d2_min(&self) -> Option<f64> {
        (self.min_vol > 0.0).then(|| MIN_DIAMETER2_FACTOR * self.min_vol.powf(2.0 / 3.0))
    }

    /// Does `vol` pass the `[min_vol, max_vol]` filter?
    #[inline]
    pub fn volume_in_range(&self, vol: f64) -> bool {
        (self.min_vol <= 0.0 || vol >= self.min_vol) && (self.max_vol <= 0.0 || vol <= self.max_vol)
    }
}
