//! The engine's output: an ordered, append-only stream of owned events.
//!
//! `Simulation::step` returns the events of the tick it just ran; consumers
//! filter whatever subset they care about. Persistence and visualization
//! live outside the core.

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, Good, Inventory, Position, Price, Tick};

/// Which goods change hands in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairType {
    /// Good A against good B (pure barter).
    AForB,
    /// Good A against money.
    AForMoney,
    /// Good B against money.
    BForMoney,
}

impl PairType {
    /// Money-first tie-break rank: A↔M beats B↔M beats A↔B.
    pub fn priority(self) -> u8 {
        match self {
            PairType::AForMoney => 2,
            PairType::BForMoney => 1,
            PairType::AForB => 0,
        }
    }

    pub fn is_money(self) -> bool {
        matches!(self, PairType::AForMoney | PairType::BForMoney)
    }

    /// The good the seller hands over.
    pub fn good(self) -> Good {
        match self {
            PairType::AForB | PairType::AForMoney => Good::A,
            PairType::BForMoney => Good::B,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairReason {
    MutualConsent,
    GreedyFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpairReason {
    TradeSuccess,
    TradeFailed,
    ModeChanged,
}

/// What an agent decided to walk toward this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChosenTarget {
    TradePartner { id: AgentId },
    ForageCell { pos: Position, kind: Good },
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    TickBoundary {
        tick: Tick,
    },
    Decision {
        tick: Tick,
        agent_id: AgentId,
        chosen_target: ChosenTarget,
        /// Scores of the ranked alternatives, best first, partner identities
        /// omitted. Capped at the top 8.
        alternatives_rank: Vec<f64>,
    },
    Pair {
        tick: Tick,
        agent_a: AgentId,
        agent_b: AgentId,
        reason: PairReason,
    },
    Unpair {
        tick: Tick,
        agent_a: AgentId,
        agent_b: AgentId,
        reason: UnpairReason,
    },
    Trade {
        tick: Tick,
        buyer_id: AgentId,
        seller_id: AgentId,
        pair_type: PairType,
        /// Units of the traded good handed from seller to buyer.
        d_a: u32,
        /// Units of the counter (good B for barter, money otherwise).
        d_b: u32,
        price: Price,
        surplus_buyer: f64,
        surplus_seller: f64,
    },
    Forage {
        tick: Tick,
        agent_id: AgentId,
        cell_pos: Position,
        kind: Good,
        amount_harvested: u32,
    },
    AgentSnapshot {
        tick: Tick,
        agent_id: AgentId,
        pos: Position,
        inventory: Inventory,
        utility_value: f64,
    },
    ResourceSnapshot {
        tick: Tick,
        cell_pos: Position,
        kind: Good,
        amount: u32,
    },
}

impl Event {
    pub fn tick(&self) -> Tick {
        match *self {
            Event::TickBoundary { tick }
            | Event::Decision { tick, .. }
            | Event::Pair { tick, .. }
            | Event::Unpair { tick, .. }
            | Event::Trade { tick, .. }
            | Event::Forage { tick, .. }
            | Event::AgentSnapshot { tick, .. }
            | Event::ResourceSnapshot { tick, .. } => tick,
        }
    }
}
