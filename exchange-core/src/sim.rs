//! The scheduler: owns all state, runs the seven-phase pipeline, and is the
//! only place the tick counter advances.
//!
//! Tick phases:
//! 1. Perception  - frozen per-agent views
//! 2. Decision    - targets, claims, pair formation
//! 3. Movement    - steps toward targets
//! 4. Trade       - bargaining over adjacent pairs
//! 5. Forage      - harvest claimed cells
//! 6. Regen       - timed cell regrowth
//! 7. Housekeeping - quote refresh, claim clearing, snapshots, tick advance
//!
//! Single-threaded and synchronous: phases run to completion in fixed order,
//! agents are processed in ascending id order, and no state-affecting
//! iteration depends on hash ordering. Given the same scenario and seed the
//! emitted event stream is bit-identical across runs and platforms.

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;

use crate::agent::Agent;
use crate::decision::run_decision_phase;
use crate::error::EngineError;
use crate::events::{Event, UnpairReason};
use crate::forage::run_forage_phase;
use crate::grid::Grid;
use crate::movement::run_movement_phase;
use crate::perception::build_world_views;
use crate::quotes::Quotes;
use crate::scenario::{Mode, Params};
use crate::spatial::SpatialIndex;
use crate::trade::run_trade_phase;
use crate::types::{AgentId, Position, Tick};

pub struct Simulation {
    tick: Tick,
    agents: Vec<Agent>,
    grid: Grid,
    claims: BTreeMap<Position, AgentId>,
    params: Params,
    rng: ChaCha8Rng,
    spatial: SpatialIndex,
    current_mode: Mode,
}

impl Simulation {
    /// Assemble the engine from validated parts and compute the initial
    /// quote set. Called by `ScenarioConfig::build`.
    pub(crate) fn from_parts(
        agents: Vec<Agent>,
        grid: Grid,
        params: Params,
        rng: ChaCha8Rng,
    ) -> Result<Simulation, String> {
        let mut spatial = SpatialIndex::new();
        spatial.rebuild(agents.iter().map(|a| (a.id, a.pos)));
        let current_mode = mode_at(&params, 0);

        let mut sim = Simulation {
            tick: 0,
            agents,
            grid,
            claims: BTreeMap::new(),
            params,
            rng,
            spatial,
            current_mode,
        };
        sim.refresh_dirty_quotes().map_err(|e| e.to_string())?;
        Ok(sim)
    }

    // === ACCESSORS ===

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.index()]
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn current_mode(&self) -> Mode {
        self.current_mode
    }

    /// The scheduler's seeded ChaCha stream. The built-in phases draw
    /// nothing from it; it is reserved for stochastic matching extensions,
    /// which must consume it in ascending-id order to stay deterministic.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    // === STEP / RUN ===

    /// Advance exactly one tick and return the events it emitted.
    pub fn step(&mut self) -> Result<Vec<Event>, EngineError> {
        let tick = self.tick;
        let mut events = vec![Event::TickBoundary { tick }];

        let mode = mode_at(&self.params, tick);
        if mode != self.current_mode {
            self.apply_mode_transition(mode, tick, &mut events);
        }

        // === 1. PERCEPTION ===
        let views = build_world_views(
            &self.agents,
            &self.grid,
            &self.spatial,
            &self.claims,
            self.params.distance_metric,
        );

        // === 2. DECISION ===
        run_decision_phase(
            &mut self.agents,
            &views,
            &mut self.claims,
            &self.params,
            mode,
            tick,
            &mut events,
        );

        // === 3. MOVEMENT ===
        run_movement_phase(&mut self.agents);
        self.spatial
            .rebuild(self.agents.iter().map(|a| (a.id, a.pos)));

        // === 4. TRADE ===
        if mode.trade_active() {
            run_trade_phase(&mut self.agents, &self.params, tick, &mut events)?;
        }

        // === 5. FORAGE ===
        if mode.forage_active() {
            run_forage_phase(
                &mut self.agents,
                &mut self.grid,
                &mut self.claims,
                &self.params,
                tick,
                &mut events,
            );
        }

        // === 6. RESOURCE REGEN ===
        self.grid.regenerate(
            tick,
            self.params.resource_growth_rate,
            self.params.resource_regen_cooldown,
        );

        // === 7. HOUSEKEEPING ===
        self.housekeeping(tick, &mut events)?;

        self.tick += 1;
        Ok(events)
    }

    /// Run up to `max_ticks`, accumulating events.
    pub fn run(&mut self, max_ticks: u64) -> Result<Vec<Event>, EngineError> {
        self.run_until(max_ticks, |_| false)
    }

    /// Run up to `max_ticks`, polling `stop` between ticks (never
    /// mid-phase).
    pub fn run_until(
        &mut self,
        max_ticks: u64,
        mut stop: impl FnMut(&Simulation) -> bool,
    ) -> Result<Vec<Event>, EngineError> {
        let mut all = Vec::new();
        for _ in 0..max_ticks {
            if stop(self) {
                break;
            }
            all.extend(self.step()?);
        }
        Ok(all)
    }

    // === MODE SCHEDULE ===

    fn apply_mode_transition(&mut self, new_mode: Mode, tick: Tick, events: &mut Vec<Event>) {
        tracing::debug!(target: "scheduler", tick, ?new_mode, "mode transition");

        if !new_mode.trade_active() {
            for i in 0..self.agents.len() {
                let Some(partner) = self.agents[i].paired_with else {
                    continue;
                };
                let j = partner.index();
                if j < i {
                    continue; // handled when the loop visited j
                }
                self.agents[i].paired_with = None;
                self.agents[j].paired_with = None;
                self.agents[i].clear_intent();
                self.agents[j].clear_intent();
                events.push(Event::Unpair {
                    tick,
                    agent_a: self.agents[i].id,
                    agent_b: partner,
                    reason: UnpairReason::ModeChanged,
                });
            }
            for agent in &mut self.agents {
                if agent.target_agent_id.is_some() {
                    agent.clear_intent();
                }
            }
        }

        if !new_mode.forage_active() {
            for agent in &mut self.agents {
                agent.foraging_commit = None;
                if agent.paired_with.is_none() && agent.target_agent_id.is_none() {
                    agent.target_pos = None;
                }
            }
            self.claims.clear();
        }

        self.current_mode = new_mode;
    }

    // === HOUSEKEEPING ===

    fn housekeeping(&mut self, tick: Tick, events: &mut Vec<Event>) -> Result<(), EngineError> {
        self.refresh_dirty_quotes()?;

        for agent in &mut self.agents {
            agent.prune_cooldowns(tick);
        }

        // Defensively expire pairings orphaned mid-tick; a valid pipeline
        // has none, and the symmetry invariant holds at every boundary.
        for i in 0..self.agents.len() {
            let Some(partner) = self.agents[i].paired_with else {
                continue;
            };
            if self.agents[partner.index()].paired_with != Some(self.agents[i].id) {
                tracing::warn!(target: "scheduler", tick, agent = self.agents[i].id.0, "expiring orphaned pairing");
                self.agents[i].paired_with = None;
                self.agents[i].clear_intent();
            }
        }

        // Claims are per-tick reservations; Decision rebuilds them.
        self.claims.clear();

        if let Some((pos, cell)) = self.grid.find_overgrown() {
            return Err(EngineError::invariant(
                tick,
                format!(
                    "cell {pos} holds {} units above its seed amount {}",
                    cell.amount, cell.seed_amount
                ),
            ));
        }

        let every = self.params.agent_snapshot_every;
        if every > 0 && tick % every == 0 {
            for agent in &self.agents {
                events.push(Event::AgentSnapshot {
                    tick,
                    agent_id: agent.id,
                    pos: agent.pos,
                    inventory: agent.inventory,
                    utility_value: agent.utility_value(),
                });
            }
        }
        let every = self.params.resource_snapshot_every;
        if every > 0 && tick % every == 0 {
            for (pos, cell) in self.grid.seeded_cells() {
                let Some(kind) = cell.kind else { continue };
                events.push(Event::ResourceSnapshot {
                    tick,
                    cell_pos: pos,
                    kind,
                    amount: cell.amount,
                });
            }
        }

        Ok(())
    }

    fn refresh_dirty_quotes(&mut self) -> Result<(), EngineError> {
        let tick = self.tick;
        for agent in &mut self.agents {
            if !agent.inventory_dirty {
                continue;
            }
            match Quotes::compute(
                &agent.utility,
                agent.inventory,
                self.params.spread,
                agent.money_lambda,
            ) {
                Ok(quotes) => {
                    agent.quotes = quotes;
                    agent.inventory_dirty = false;
                }
                Err(detail) => {
                    return Err(EngineError::invariant(
                        tick,
                        format!("agent {} quote refresh failed: {detail}", agent.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Resolve the schedule at `tick`; the last entry persists once the
/// schedule runs out.
fn mode_at(params: &Params, tick: Tick) -> Mode {
    let mut cursor = 0u64;
    for phase in &params.mode_schedule {
        cursor = cursor.saturating_add(phase.ticks);
        if tick < cursor {
            return phase.mode;
        }
    }
    params
        .mode_schedule
        .last()
        .map(|p| p.mode)
        .unwrap_or(Mode::Both)
}
