//! Scenario configuration: the validated record the engine consumes.
//!
//! Parsing from disk (JSON via serde) lives with external collaborators;
//! this module owns the shape, the validation (every error names the
//! offending field), and construction of the initial engine state,
//! including deterministic sampling of random resource layouts from the
//! scenario seed.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::ScenarioError;
use crate::grid::Grid;
use crate::sim::Simulation;
use crate::types::{AgentId, DistanceMetric, Good, Inventory, Position};
use crate::utility::Utility;

// === MODES & REGIMES ===

/// Which activities the schedule currently allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Trade,
    Forage,
    Both,
}

impl Mode {
    pub fn trade_active(self) -> bool {
        matches!(self, Mode::Trade | Mode::Both)
    }

    pub fn forage_active(self) -> bool {
        matches!(self, Mode::Forage | Mode::Both)
    }
}

/// One entry of the mode schedule; the last entry persists once the
/// schedule is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModePhase {
    pub mode: Mode,
    pub ticks: u64,
}

/// The allowed set of pair types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRegime {
    BarterOnly,
    MoneyOnly,
    Mixed,
    /// Money pairs gated on the paying side actually holding money; barter
    /// is searched only when no money candidate exists.
    MixedLiquidityGated,
}

impl ExchangeRegime {
    pub fn barter_allowed(self) -> bool {
        !matches!(self, ExchangeRegime::MoneyOnly)
    }

    pub fn money_allowed(self) -> bool {
        !matches!(self, ExchangeRegime::BarterOnly)
    }
}

// === PARAMS ===

fn default_distance_metric() -> DistanceMetric {
    DistanceMetric::Chebyshev
}

fn default_forage_commit_ticks() -> u32 {
    3
}

fn default_agent_snapshot_every() -> u64 {
    1
}

/// Immutable scenario parameters shared by every phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub spread: f64,
    pub epsilon: f64,
    pub d_a_max: u32,
    pub d_b_max: u32,
    pub trade_cooldown_ticks: u64,
    pub forage_rate: u32,
    pub resource_growth_rate: u32,
    pub resource_regen_cooldown: u64,
    pub beta_distance: f64,
    pub exchange_regime: ExchangeRegime,
    pub mode_schedule: Vec<ModePhase>,
    #[serde(default = "default_distance_metric")]
    pub distance_metric: DistanceMetric,
    #[serde(default = "default_forage_commit_ticks")]
    pub forage_commit_ticks: u32,
    #[serde(default = "default_agent_snapshot_every")]
    pub agent_snapshot_every: u64,
    #[serde(default)]
    pub resource_snapshot_every: u64,
}

// === SCENARIO ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: u32,
    pub utility: Utility,
    pub initial_inventory: Inventory,
    pub pos: Position,
    pub vision_radius: u32,
    pub interaction_radius: u32,
    pub move_budget_per_tick: u32,
    #[serde(default = "default_money_lambda")]
    pub money_lambda: f64,
}

fn default_money_lambda() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub pos: Position,
    pub kind: Good,
    pub amount: u32,
}

/// A uniformly scattered patch of same-kind cells, sampled from the
/// scenario seed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomPatch {
    pub kind: Good,
    pub cells: u32,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLayout {
    Cells(Vec<ResourceSpec>),
    Random(Vec<RandomPatch>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub grid_size: u32,
    pub agents: Vec<AgentConfig>,
    pub resources: ResourceLayout,
    pub params: Params,
    pub seed: u64,
}

impl ScenarioConfig {
    /// Validate every field, naming the offender in the error.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.grid_size < 1 {
            return Err(ScenarioError::field("grid_size", "must be ≥ 1"));
        }

        let p = &self.params;
        if !(p.spread > 0.0 && p.spread < 1.0) {
            return Err(ScenarioError::field("params.spread", "must be in (0, 1)"));
        }
        if !(p.epsilon > 0.0) {
            return Err(ScenarioError::field("params.epsilon", "must be > 0"));
        }
        if p.d_a_max < 1 {
            return Err(ScenarioError::field("params.d_a_max", "must be ≥ 1"));
        }
        if p.d_b_max < 1 {
            return Err(ScenarioError::field("params.d_b_max", "must be ≥ 1"));
        }
        if p.forage_rate < 1 {
            return Err(ScenarioError::field("params.forage_rate", "must be ≥ 1"));
        }
        if !(p.beta_distance > 0.0 && p.beta_distance <= 1.0) {
            return Err(ScenarioError::field(
                "params.beta_distance",
                "must be in (0, 1]",
            ));
        }
        if p.mode_schedule.is_empty() {
            return Err(ScenarioError::field(
                "params.mode_schedule",
                "must have at least one entry",
            ));
        }
        for (i, phase) in p.mode_schedule.iter().enumerate() {
            if phase.ticks < 1 {
                return Err(ScenarioError::field(
                    format!("params.mode_schedule[{i}].ticks"),
                    "must be ≥ 1",
                ));
            }
        }

        if self.agents.is_empty() {
            return Err(ScenarioError::field("agents", "must not be empty"));
        }
        // Ids must be unique and dense from 0: a sorted copy must read 0..n.
        let mut ids: Vec<u32> = self.agents.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        for (expected, &actual) in ids.iter().enumerate() {
            if actual != expected as u32 {
                return Err(ScenarioError::BadAgentIds {
                    reason: format!("expected id {expected}, found {actual}"),
                });
            }
        }

        for a in &self.agents {
            let agent = AgentId::new(a.id);
            if !a.pos.in_bounds(self.grid_size) {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "pos".into(),
                    reason: format!("{} outside the {}×{} grid", a.pos, self.grid_size, self.grid_size),
                });
            }
            if a.vision_radius < 1 {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "vision_radius".into(),
                    reason: "must be ≥ 1".into(),
                });
            }
            if a.interaction_radius < 1 {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "interaction_radius".into(),
                    reason: "must be ≥ 1".into(),
                });
            }
            if a.move_budget_per_tick < 1 {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "move_budget_per_tick".into(),
                    reason: "must be ≥ 1".into(),
                });
            }
            if !(a.money_lambda > 0.0) {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "money_lambda".into(),
                    reason: "must be > 0".into(),
                });
            }
            if let Err(reason) = a.utility.validate() {
                return Err(ScenarioError::InvalidAgent {
                    agent,
                    field: "utility".into(),
                    reason,
                });
            }
        }

        if let ResourceLayout::Cells(cells) = &self.resources {
            let mut seen = std::collections::BTreeSet::new();
            for spec in cells {
                if !spec.pos.in_bounds(self.grid_size) {
                    return Err(ScenarioError::InvalidResource {
                        pos: spec.pos,
                        reason: "outside the grid".into(),
                    });
                }
                if !seen.insert(spec.pos) {
                    return Err(ScenarioError::InvalidResource {
                        pos: spec.pos,
                        reason: "duplicate resource cell".into(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate and construct the engine. The scenario seed initializes the
    /// scheduler's ChaCha stream; random resource layouts consume it here,
    /// at load, so runs stay bit-identical.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        self.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut grid = Grid::new(self.grid_size);

        match &self.resources {
            ResourceLayout::Cells(cells) => {
                for spec in cells {
                    grid.seed(spec.pos, spec.kind, spec.amount);
                }
            }
            ResourceLayout::Random(patches) => {
                for patch in patches {
                    let mut open: Vec<Position> = empty_cells(&grid);
                    if (patch.cells as usize) > open.len() {
                        return Err(ScenarioError::field(
                            "resources.random",
                            format!(
                                "patch of {} cells does not fit the remaining {} empty cells",
                                patch.cells,
                                open.len()
                            ),
                        ));
                    }
                    open.shuffle(&mut rng);
                    for &pos in open.iter().take(patch.cells as usize) {
                        grid.seed(pos, patch.kind, patch.amount);
                    }
                }
            }
        }

        let mut agent_configs: Vec<&AgentConfig> = self.agents.iter().collect();
        agent_configs.sort_by_key(|a| a.id);
        let agents: Vec<Agent> = agent_configs
            .into_iter()
            .map(|cfg| {
                Agent::new(AgentId::new(cfg.id), cfg.pos, cfg.utility.clone())
                    .with_inventory(cfg.initial_inventory)
                    .with_vision(cfg.vision_radius)
                    .with_interaction(cfg.interaction_radius)
                    .with_move_budget(cfg.move_budget_per_tick)
                    .with_money_lambda(cfg.money_lambda)
            })
            .collect();

        Simulation::from_parts(agents, grid, self.params.clone(), rng).map_err(|detail| {
            ScenarioError::field("agents", format!("initial quote computation failed: {detail}"))
        })
    }
}

fn empty_cells(grid: &Grid) -> Vec<Position> {
    let n = grid.size() as i32;
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let pos = Position::new(x, y);
            if grid.cell(pos).kind.is_none() {
                out.push(pos);
            }
        }
    }
    out
}
