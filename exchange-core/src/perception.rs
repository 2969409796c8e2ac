//! Phase 1: frozen per-agent snapshots of the local world.
//!
//! Perception is a pure function of pre-tick state. Decision reads only
//! these views (plus the live claims table for exclusivity), so mutations
//! made later in the tick can never leak backwards into what an agent saw.

use std::collections::{BTreeMap, HashMap};

use crate::agent::Agent;
use crate::grid::Grid;
use crate::quotes::Quotes;
use crate::spatial::SpatialIndex;
use crate::types::{AgentId, DistanceMetric, Good, Inventory, Position, Tick};

/// What one agent knows about a visible neighbor. Quotes are the neighbor's
/// end-of-previous-tick values.
#[derive(Debug, Clone, Copy)]
pub struct NeighborView {
    pub id: AgentId,
    pub pos: Position,
    pub inventory: Inventory,
    pub quotes: Quotes,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceView {
    pub pos: Position,
    pub kind: Good,
    pub amount: u32,
}

/// The frozen view handed to Decision.
#[derive(Debug, Clone)]
pub struct WorldView {
    pub agent_id: AgentId,
    pub neighbors: Vec<NeighborView>,
    pub resources: Vec<ResourceView>,
    /// Snapshot of this agent's own cooldown map.
    pub cooldowns: HashMap<AgentId, Tick>,
    /// Cells this agent held a claim on when the tick began.
    pub own_claims: Vec<Position>,
}

/// Build views for every agent in ascending id order.
pub fn build_world_views(
    agents: &[Agent],
    grid: &Grid,
    spatial: &SpatialIndex,
    claims: &BTreeMap<Position, AgentId>,
    metric: DistanceMetric,
) -> Vec<WorldView> {
    agents
        .iter()
        .map(|agent| {
            let neighbors = spatial
                .neighbors_within(agent.pos, agent.vision_radius, metric, agent.id)
                .into_iter()
                .map(|id| {
                    let other = &agents[id.index()];
                    NeighborView {
                        id,
                        pos: other.pos,
                        inventory: other.inventory,
                        quotes: other.quotes,
                    }
                })
                .collect();

            let resources = grid
                .resources_in_radius(agent.pos, agent.vision_radius, metric)
                .into_iter()
                .filter_map(|(pos, cell)| {
                    cell.kind.map(|kind| ResourceView {
                        pos,
                        kind,
                        amount: cell.amount,
                    })
                })
                .collect();

            let own_claims = claims
                .iter()
                .filter(|&(_, &claimant)| claimant == agent.id)
                .map(|(&pos, _)| pos)
                .collect();

            WorldView {
                agent_id: agent.id,
                neighbors,
                resources,
                cooldowns: agent.trade_cooldowns.clone(),
                own_claims,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::Utility;

    fn linear_agent(id: u32, x: i32, y: i32) -> Agent {
        Agent::new(
            AgentId::new(id),
            Position::new(x, y),
            Utility::Linear { v_a: 1.0, v_b: 1.0 },
        )
        .with_vision(2)
    }

    #[test]
    fn views_are_consistent_snapshots() {
        let agents = vec![linear_agent(0, 0, 0), linear_agent(1, 1, 1), linear_agent(2, 4, 4)];
        let mut grid = Grid::new(5);
        grid.seed(Position::new(1, 0), Good::A, 3);

        let mut spatial = SpatialIndex::new();
        spatial.rebuild(agents.iter().map(|a| (a.id, a.pos)));
        let claims = BTreeMap::new();

        let views = build_world_views(&agents, &grid, &spatial, &claims, DistanceMetric::Chebyshev);

        assert_eq!(views.len(), 3);
        // Agents 0 and 1 see each other; 2 is out of range of both.
        assert_eq!(views[0].neighbors.len(), 1);
        assert_eq!(views[0].neighbors[0].id, AgentId::new(1));
        assert_eq!(views[1].neighbors[0].id, AgentId::new(0));
        assert!(views[2].neighbors.is_empty());
        // Both nearby agents see the seeded cell.
        assert_eq!(views[0].resources.len(), 1);
        assert_eq!(views[1].resources.len(), 1);
        assert_eq!(views[0].resources[0].amount, 3);
    }
}
