//! Phase 5: harvesting claimed resource cells.

use std::collections::BTreeMap;

use crate::agent::Agent;
use crate::events::Event;
use crate::grid::Grid;
use crate::scenario::Params;
use crate::types::{AgentId, Good, Position, Tick};

/// In ascending id order: every unpaired agent standing on the cell it
/// claimed harvests up to the forage rate, marks its inventory dirty, and
/// releases the claim.
pub(crate) fn run_forage_phase(
    agents: &mut [Agent],
    grid: &mut Grid,
    claims: &mut BTreeMap<Position, AgentId>,
    params: &Params,
    tick: Tick,
    events: &mut Vec<Event>,
) {
    for agent in agents.iter_mut() {
        if agent.paired_with.is_some() {
            continue;
        }
        if claims.get(&agent.pos) != Some(&agent.id) {
            continue;
        }
        let Some(kind) = grid.cell(agent.pos).kind else {
            continue;
        };
        let harvested = grid.harvest(agent.pos, params.forage_rate, tick);
        if harvested == 0 {
            continue;
        }

        match kind {
            Good::A => agent.inventory.a += harvested,
            Good::B => agent.inventory.b += harvested,
        }
        agent.inventory_dirty = true;
        agent.foraging_commit = None;
        claims.remove(&agent.pos);

        tracing::debug!(
            target: "forage",
            tick,
            agent = agent.id.0,
            x = agent.pos.x,
            y = agent.pos.y,
            amount = harvested,
        );
        events.push(Event::Forage {
            tick,
            agent_id: agent.id,
            cell_pos: agent.pos,
            kind,
            amount_harvested: harvested,
        });
    }
}
