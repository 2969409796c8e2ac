//! Position-bucket spatial index for neighbor queries.
//!
//! Rebuilt from scratch whenever positions change (initialization and after
//! Movement). Queries scan the radius window in row-major order, and buckets
//! hold ids in ascending order, so results are deterministic.

use std::collections::HashMap;

use crate::types::{AgentId, DistanceMetric, Position};

#[derive(Debug, Default)]
pub struct SpatialIndex {
    buckets: HashMap<Position, Vec<AgentId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from `(id, pos)` pairs supplied in ascending id order.
    pub fn rebuild(&mut self, positions: impl Iterator<Item = (AgentId, Position)>) {
        self.buckets.clear();
        for (id, pos) in positions {
            self.buckets.entry(pos).or_default().push(id);
        }
    }

    /// Agents within `radius` of `origin` (excluding `exclude`), in
    /// row-major cell order, ascending id within a cell.
    pub fn neighbors_within(
        &self,
        origin: Position,
        radius: u32,
        metric: DistanceMetric,
        exclude: AgentId,
    ) -> Vec<AgentId> {
        let r = radius as i32;
        let mut out = Vec::new();
        for y in (origin.y - r)..=(origin.y + r) {
            for x in (origin.x - r)..=(origin.x + r) {
                let pos = Position::new(x, y);
                if origin.distance(pos, metric) > radius {
                    continue;
                }
                if let Some(ids) = self.buckets.get(&pos) {
                    out.extend(ids.iter().copied().filter(|&id| id != exclude));
                }
            }
        }
        out
    }
}
