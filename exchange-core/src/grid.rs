//! The N×N grid of resource cells and their regrowth dynamics.

use serde::{Deserialize, Serialize};

use crate::types::{DistanceMetric, Good, Position, Tick};

// === RESOURCE CELL ===

/// One grid cell. `seed_amount` is the scenario-load amount and the regrowth
/// cap; `last_harvest_tick` is set whenever any unit is removed, which is
/// what arms the regeneration timer. Cells never harvested stay at
/// `seed_amount` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCell {
    pub kind: Option<Good>,
    pub amount: u32,
    pub seed_amount: u32,
    pub last_harvest_tick: Option<Tick>,
}

impl ResourceCell {
    pub fn empty() -> Self {
        Self {
            kind: None,
            amount: 0,
            seed_amount: 0,
            last_harvest_tick: None,
        }
    }

    pub fn seeded(kind: Good, amount: u32) -> Self {
        Self {
            kind: Some(kind),
            amount,
            seed_amount: amount,
            last_harvest_tick: None,
        }
    }

    pub fn has_stock(&self) -> bool {
        self.kind.is_some() && self.amount > 0
    }
}

// === GRID ===

/// Row-major cell store. Positions are validated by the scenario loader, so
/// lookups take in-bounds coordinates.
#[derive(Debug, Clone)]
pub struct Grid {
    size: u32,
    cells: Vec<ResourceCell>,
}

impl Grid {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            cells: vec![ResourceCell::empty(); (size as usize) * (size as usize)],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn index(&self, pos: Position) -> usize {
        pos.y as usize * self.size as usize + pos.x as usize
    }

    pub fn cell(&self, pos: Position) -> &ResourceCell {
        &self.cells[self.index(pos)]
    }

    pub fn cell_mut(&mut self, pos: Position) -> &mut ResourceCell {
        let idx = self.index(pos);
        &mut self.cells[idx]
    }

    pub fn seed(&mut self, pos: Position, kind: Good, amount: u32) {
        *self.cell_mut(pos) = ResourceCell::seeded(kind, amount);
    }

    /// Remove up to `rate` units at `pos`, stamping the harvest tick.
    /// Returns the amount actually removed.
    pub fn harvest(&mut self, pos: Position, rate: u32, tick: Tick) -> u32 {
        let cell = self.cell_mut(pos);
        let taken = rate.min(cell.amount);
        if taken > 0 {
            cell.amount -= taken;
            cell.last_harvest_tick = Some(tick);
        }
        taken
    }

    /// Phase 6: timed regrowth. A cell regrows only once it has been
    /// harvested and `regen_cooldown` ticks have elapsed since the last
    /// harvest; growth is capped at `seed_amount`, and a fully recovered
    /// cell disarms its timer.
    pub fn regenerate(&mut self, tick: Tick, growth_rate: u32, regen_cooldown: u64) {
        if growth_rate == 0 {
            return;
        }
        for cell in &mut self.cells {
            if cell.kind.is_none() {
                continue;
            }
            let Some(last) = cell.last_harvest_tick else {
                continue;
            };
            if tick.saturating_sub(last) < regen_cooldown {
                continue;
            }
            cell.amount = (cell.amount + growth_rate).min(cell.seed_amount);
            if cell.amount == cell.seed_amount {
                cell.last_harvest_tick = None;
            }
        }
    }

    /// Resource cells within `radius` of `origin`, scanned row-major so the
    /// order is deterministic. Only cells with a kind are yielded.
    pub fn resources_in_radius(
        &self,
        origin: Position,
        radius: u32,
        metric: DistanceMetric,
    ) -> Vec<(Position, ResourceCell)> {
        let r = radius as i32;
        let n = self.size as i32;
        let mut out = Vec::new();
        for y in (origin.y - r).max(0)..=(origin.y + r).min(n - 1) {
            for x in (origin.x - r).max(0)..=(origin.x + r).min(n - 1) {
                let pos = Position::new(x, y);
                if origin.distance(pos, metric) > radius {
                    continue;
                }
                let cell = self.cell(pos);
                if cell.kind.is_some() {
                    out.push((pos, *cell));
                }
            }
        }
        out
    }

    /// All seeded cells in row-major order (snapshot emission).
    pub fn seeded_cells(&self) -> impl Iterator<Item = (Position, &ResourceCell)> {
        let n = self.size as i32;
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.kind.map(|_| {
                let y = i as i32 / n;
                let x = i as i32 % n;
                (Position::new(x, y), cell)
            })
        })
    }

    /// First cell whose amount exceeds its seed, if any (invariant sweep).
    pub fn find_overgrown(&self) -> Option<(Position, &ResourceCell)> {
        self.seeded_cells().find(|(_, c)| c.amount > c.seed_amount)
    }
}
