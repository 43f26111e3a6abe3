use serde::{Deserialize, Serialize};

use crate::config::{HEIGHT_PLATES, WIDTH_PLATES};
use crate::error::{Result, SolveError};
use crate::tree::{CutTree, NodeIdx};
use crate::types::Defect;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plate {
    pub id: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub defects: Vec<Defect>,
}

fn default_width() -> u32 {
    WIDTH_PLATES
}

fn default_height() -> u32 {
    HEIGHT_PLATES
}

impl Plate {
    pub fn new(id: u32, width: u32, height: u32, defects: Vec<Defect>) -> Self {
        Self {
            id,
            width,
            height,
            defects,
        }
    }

    /// Every defect must lie on the plate, and the plate must leave room to
    /// add a side to any coordinate on it without overflowing.
    pub fn check_bounds(&self) -> Result<()> {
        if self.width > MAX_SIDE || self.height > MAX_SIDE {
            return Err(SolveError::InvalidConfig(format!(
                "plate {} is larger than {MAX_SIDE}",
                self.id
            )));
        }
        for d in &self.defects {
            let fits = |start: u32, len: u32, side: u32| {
                start.checked_add(len).is_some_and(|end| end <= side)
            };
            if !fits(d.x, d.width, self.width) || !fits(d.y, d.height, self.height) {
                return Err(SolveError::InvalidConfig(format!(
                    "defect {} lies outside plate {}",
                    d.id, self.id
                )));
            }
        }
        Ok(())
    }
}

const MAX_SIDE: u32 = u32::MAX / 2;

#[derive(Debug, Clone)]
pub struct PlatePool {
    plates: Vec<Plate>,
    limit: usize,
    next: usize,
}

impl PlatePool {
    pub fn new(plates: Vec<Plate>, limit: usize) -> Self {
        Self {
            plates,
            limit,
            next: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.plates.len().min(self.limit).saturating_sub(self.next)
    }

    fn take(&mut self) -> Option<&Plate> {
        if self.remaining() == 0 {
            return None;
        }
        self.next += 1;
        self.plates.get(self.next - 1)
    }

    /// Puts back every plate taken after `used` were out.
    pub(crate) fn rewind(&mut self, used: usize) {
        assert!(used <= self.next, "cannot rewind the pool forward");
        self.next = used;
    }
}

pub fn start_new_bin(pool: &mut PlatePool, tree: &mut CutTree) -> Result<NodeIdx> {
    let used = pool.used();
    let plate = pool.take().ok_or(SolveError::OutOfPlates { used })?;
    tracing::debug!(plate = plate.id, defects = plate.defects.len(), "starting new plate");
    Ok(tree.add_root(plate))
}
