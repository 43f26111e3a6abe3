use serde::{Deserialize, Serialize};

use crate::error::{Result, SolveError};

pub const N_PLATES: usize = 100;
pub const WIDTH_PLATES: u32 = 6000;
pub const HEIGHT_PLATES: u32 = 3210;
/// Minimum distance between two consecutive 1-cuts, waste excepted.
pub const MIN_1_CUT: u32 = 100;
/// Maximum distance between two consecutive 1-cuts, the residual excepted.
pub const MAX_1_CUT: u32 = 3500;
/// Minimum distance between two consecutive 2-cuts, waste excepted.
pub const MIN_2_CUT: u32 = 100;
/// Minimum width and height of any waste piece.
pub const MIN_WASTE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub plate_width: u32,
    pub plate_height: u32,
    pub max_plates: usize,
    pub min_1_cut: u32,
    /// Carried for reporting only; see `Solution::wide_first_cuts`.
    pub max_1_cut: u32,
    pub min_2_cut: u32,
    pub min_waste: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            plate_width: WIDTH_PLATES,
            plate_height: HEIGHT_PLATES,
            max_plates: N_PLATES,
            min_1_cut: MIN_1_CUT,
            max_1_cut: MAX_1_CUT,
            min_2_cut: MIN_2_CUT,
            min_waste: MIN_WASTE,
        }
    }
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plate_size(mut self, width: u32, height: u32) -> Self {
        self.plate_width = width;
        self.plate_height = height;
        self
    }

    pub fn with_max_plates(mut self, max_plates: usize) -> Self {
        self.max_plates = max_plates;
        self
    }

    pub fn with_min_1_cut(mut self, min: u32) -> Self {
        self.min_1_cut = min;
        self
    }

    pub fn with_max_1_cut(mut self, max: u32) -> Self {
        self.max_1_cut = max;
        self
    }

    pub fn with_min_2_cut(mut self, min: u32) -> Self {
        self.min_2_cut = min;
        self
    }

    pub fn with_min_waste(mut self, min: u32) -> Self {
        self.min_waste = min;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.plate_width == 0 || self.plate_height == 0 {
            return Err(SolveError::InvalidConfig(
                "plate dimensions must be non-zero".to_string(),
            ));
        }
        if self.min_waste == 0 {
            return Err(SolveError::InvalidConfig(
                "minimum waste size must be non-zero".to_string(),
            ));
        }
        if self.min_1_cut > self.max_1_cut {
            return Err(SolveError::InvalidConfig(format!(
                "minimum 1-cut distance {} exceeds maximum {}",
                self.min_1_cut, self.max_1_cut
            )));
        }
        Ok(())
    }
}
