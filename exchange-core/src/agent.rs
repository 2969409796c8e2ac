//! The agent: preferences, holdings, and per-tick intent state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::quotes::Quotes;
use crate::types::{AgentId, Inventory, Position, Tick};
use crate::utility::Utility;

/// An active commitment to walk to and harvest one cell, held for a few
/// ticks so agents don't thrash between near-equal forage targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForageCommit {
    pub pos: Position,
    pub ticks_remaining: u32,
}

/// One simulated agent. Owned exclusively by the scheduler for the whole
/// run; phases receive mutable access only during their slot in the tick.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Position,
    pub inventory: Inventory,
    pub utility: Utility,
    /// Reservation prices established at the end of the previous tick.
    pub quotes: Quotes,
    /// Marginal utility of one money unit in quasilinear trade evaluation.
    pub money_lambda: f64,

    pub vision_radius: u32,
    pub interaction_radius: u32,
    pub move_budget_per_tick: u32,

    /// Where the agent is walking (partner's cell or a claimed resource).
    pub target_pos: Option<Position>,
    /// Trade intent: the partner this agent wants to pair with.
    pub target_agent_id: Option<AgentId>,
    /// Symmetric pairing; both endpoints always agree or are both `None`.
    pub paired_with: Option<AgentId>,
    pub foraging_commit: Option<ForageCommit>,
    /// partner → expiry tick (exclusive); entries are pruned lazily.
    pub trade_cooldowns: HashMap<AgentId, Tick>,
    pub inventory_dirty: bool,
}

impl Agent {
    pub fn new(id: AgentId, pos: Position, utility: Utility) -> Self {
        Self {
            id,
            pos,
            inventory: Inventory::default(),
            utility,
            quotes: Quotes::neutral(),
            money_lambda: 1.0,
            vision_radius: 1,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            target_pos: None,
            target_agent_id: None,
            paired_with: None,
            foraging_commit: None,
            trade_cooldowns: HashMap::new(),
            inventory_dirty: true,
        }
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_vision(mut self, radius: u32) -> Self {
        self.vision_radius = radius;
        self
    }

    pub fn with_interaction(mut self, radius: u32) -> Self {
        self.interaction_radius = radius;
        self
    }

    pub fn with_move_budget(mut self, budget: u32) -> Self {
        self.move_budget_per_tick = budget;
        self
    }

    pub fn with_money_lambda(mut self, lambda: f64) -> Self {
        self.money_lambda = lambda;
        self
    }

    /// Goods-only utility of the current holdings.
    pub fn utility_value(&self) -> f64 {
        self.utility.value(self.inventory.a, self.inventory.b)
    }

    /// Quasilinear total used when money changes hands: `u_goods + λ·M`.
    pub fn quasilinear_value(&self, inv: Inventory) -> f64 {
        self.utility.value(inv.a, inv.b) + self.money_lambda * f64::from(inv.money)
    }

    /// Cooldown check with lazy expiry semantics: a partner is blocked while
    /// `current_tick < expiry`.
    pub fn in_cooldown_with(&self, partner: AgentId, tick: Tick) -> bool {
        self.trade_cooldowns
            .get(&partner)
            .is_some_and(|&expiry| tick < expiry)
    }

    pub fn set_cooldown(&mut self, partner: AgentId, expiry: Tick) {
        self.trade_cooldowns.insert(partner, expiry);
    }

    /// Drop expired entries so the map doesn't grow without bound.
    pub fn prune_cooldowns(&mut self, tick: Tick) {
        self.trade_cooldowns.retain(|_, &mut expiry| tick < expiry);
    }

    /// Forget all movement/trade intent (mode changes, pair teardown).
    pub fn clear_intent(&mut self) {
        self.target_pos = None;
        self.target_agent_id = None;
    }
}
