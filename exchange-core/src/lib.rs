//! Spatial bilateral exchange simulator
//!
//! This crate implements a deterministic, discrete-time, agent-based
//! simulation of a barter economy on an N×N grid. A fixed population of
//! agents with heterogeneous preferences forages two renewable resources
//! (A and B) and trades them pairwise; an optional money extension adds
//! money-mediated pairs behind the exchange regime.
//!
//! ## Agents
//!
//! Each agent carries an integer inventory, one of a closed family of
//! utility functions (CES, Linear, Quadratic, Translog, Stone-Geary), and a
//! quote dictionary of reservation prices derived from its MRS plus a
//! spread. Quotes are the matching heuristic: overlap between one agent's
//! ask and another's bid signals a mutually beneficial trade.
//!
//! ## The tick pipeline
//!
//! Every tick runs seven phases in fixed order: perception, decision,
//! movement, trade, forage, regeneration, housekeeping. Determinism is a
//! hard guarantee: agents are always processed in ascending id order,
//! ties break on row-major coordinates, and the same scenario and seed
//! reproduce the event stream bit for bit.
//!
//! ## Trade
//!
//! Pairs form by mutual consent or greedy fallback during Decision; once
//! adjacent, a pair bargains via compensating-block search: the smallest
//! integer block `(ΔA, ΔB)` that makes both sides strictly better off (by
//! more than a configured tolerance) executes. Failed negotiations set a
//! symmetric per-pair cooldown. Under money regimes the search also
//! evaluates money pairs and breaks surplus ties money-first.
//!
//! ## Module structure
//!
//! - `types`      Ids, positions, goods, inventories
//! - `utility`    The utility function family and reservation bounds
//! - `quotes`     Per-agent reservation-price dictionary
//! - `grid`       Resource cells and regrowth
//! - `spatial`    Neighbor queries by radius
//! - `agent`      Agent state
//! - `perception` Phase 1: frozen world views
//! - `decision`   Phase 2: preferences, claims, pair formation
//! - `movement`   Phase 3: stepping toward targets
//! - `trade`      Phase 4: bargaining and settlement
//! - `forage`     Phase 5: harvesting claimed cells
//! - `events`     The typed event stream
//! - `scenario`   Config records, validation, engine construction
//! - `sim`        The scheduler and the seven-phase `step`

pub mod agent;
pub mod decision;
pub mod error;
pub mod events;
pub mod forage;
pub mod grid;
pub mod movement;
pub mod perception;
pub mod quotes;
pub mod scenario;
pub mod sim;
pub mod spatial;
pub mod trade;
pub mod types;
pub mod utility;

// Re-export commonly used types at the crate root

// Core types
pub use types::{AgentId, DistanceMetric, Good, Inventory, Position, Price, Tick};

// Agents & utilities
pub use agent::{Agent, ForageCommit};
pub use quotes::{QuoteKey, Quotes};
pub use utility::{ReservationBounds, Utility};

// Grid
pub use grid::{Grid, ResourceCell};

// Events
pub use events::{ChosenTarget, Event, PairReason, PairType, UnpairReason};

// Errors
pub use error::{EngineError, ScenarioError};

// Scenario
pub use scenario::{
    AgentConfig, ExchangeRegime, Mode, ModePhase, Params, RandomPatch, ResourceLayout,
    ResourceSpec, ScenarioConfig,
};

// Engine
pub use sim::Simulation;

// Trade internals useful to analysis tooling
pub use trade::{TradeBlock, bargain};
