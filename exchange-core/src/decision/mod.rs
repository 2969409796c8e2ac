//! Phase 2: target selection, resource claims, and pair formation.
//!
//! Runs strictly in ascending id order. Preference building reads only the
//! frozen perception views; claim exclusivity consults the live claims
//! table so that a lower-id agent's claim is visible to higher ids within
//! the same phase.

mod preferences;

pub use preferences::{ForagePref, TradePref, forage_preferences, trade_preferences};

use std::collections::BTreeMap;

use crate::agent::{Agent, ForageCommit};
use crate::events::{ChosenTarget, Event, PairReason};
use crate::perception::WorldView;
use crate::scenario::{ExchangeRegime, Mode, Params};
use crate::types::{AgentId, Inventory, Position, Tick};

/// How many alternative scores a DecisionEvent carries at most.
const MAX_RANKED_ALTERNATIVES: usize = 8;

struct Choice {
    alternatives: Vec<f64>,
    trade_prefs: Vec<TradePref>,
}

pub(crate) fn run_decision_phase(
    agents: &mut [Agent],
    views: &[WorldView],
    claims: &mut BTreeMap<Position, AgentId>,
    params: &Params,
    mode: Mode,
    tick: Tick,
    events: &mut Vec<Event>,
) {
    drop_stale_claims(agents, claims);

    // === TARGET SELECTION ===
    let mut choices: Vec<Choice> = Vec::with_capacity(agents.len());
    for idx in 0..agents.len() {
        let choice = select_target(agents, views, claims, params, mode, tick, idx);
        choices.push(choice);
    }

    // === PAIR FORMATION ===
    let mut pair_events = Vec::new();

    // Pass 1 (stable intent) already happened during selection: valid
    // existing pairings were carried and everything inconsistent was torn
    // down before preferences were built.

    // Pass 2: mutual consent.
    for i in 0..agents.len() {
        if agents[i].paired_with.is_some() {
            continue;
        }
        let Some(target) = agents[i].target_agent_id else {
            continue;
        };
        let j = target.index();
        if agents[j].paired_with.is_some() {
            continue;
        }
        if agents[j].target_agent_id != Some(agents[i].id) {
            continue;
        }
        if pair_blocked(agents, i, j, params.exchange_regime, tick) {
            continue;
        }
        form_pair(agents, claims, i, j, PairReason::MutualConsent, tick, &mut pair_events);
    }

    // Pass 3: greedy fallback. The chosen partner is claimed irrespective
    // of its own top choice.
    for i in 0..agents.len() {
        if agents[i].paired_with.is_some() || agents[i].target_agent_id.is_none() {
            continue;
        }
        let pick = choices[i].trade_prefs.iter().find(|pref| {
            let j = pref.partner.index();
            agents[j].paired_with.is_none()
                && !pair_blocked(agents, i, j, params.exchange_regime, tick)
        });
        if let Some(pref) = pick {
            let j = pref.partner.index();
            form_pair(agents, claims, i, j, PairReason::GreedyFallback, tick, &mut pair_events);
        }
    }

    // Pass 3b: clear intent for agents whose prospective partners were all
    // taken (or blocked).
    for agent in agents.iter_mut() {
        if agent.paired_with.is_none() && agent.target_agent_id.is_some() {
            agent.clear_intent();
        }
    }

    // === TELEMETRY ===
    for (idx, choice) in choices.iter().enumerate() {
        let agent = &agents[idx];
        let chosen_target = if let Some(partner) = agent.paired_with.or(agent.target_agent_id) {
            ChosenTarget::TradePartner { id: partner }
        } else if let Some(pos) = agent.target_pos.or(agent.foraging_commit.map(|c| c.pos)) {
            match views[idx].resources.iter().find(|r| r.pos == pos) {
                Some(res) => ChosenTarget::ForageCell {
                    pos,
                    kind: res.kind,
                },
                None => ChosenTarget::Idle,
            }
        } else {
            ChosenTarget::Idle
        };
        events.push(Event::Decision {
            tick,
            agent_id: agent.id,
            chosen_target,
            alternatives_rank: choice.alternatives.clone(),
        });
    }
    events.extend(pair_events);
}

/// Drop claim entries whose claimant no longer pursues that cell.
fn drop_stale_claims(agents: &[Agent], claims: &mut BTreeMap<Position, AgentId>) {
    claims.retain(|pos, claimant| {
        let agent = &agents[claimant.index()];
        agent.paired_with.is_none()
            && (agent.target_pos == Some(*pos) || agent.pos == *pos)
    });
}

/// Run the selection logic for one agent, mutating its intent state and the
/// claims table. Returns the recorded choice for telemetry and pass 3.
fn select_target(
    agents: &mut [Agent],
    views: &[WorldView],
    claims: &mut BTreeMap<Position, AgentId>,
    params: &Params,
    mode: Mode,
    tick: Tick,
    idx: usize,
) -> Choice {
    let view = &views[idx];

    // Skip-if-paired: validate the partner is still consistent and carry
    // the pairing into Trade.
    if let Some(partner) = agents[idx].paired_with {
        let me_id = agents[idx].id;
        let consistent =
            mode.trade_active() && agents[partner.index()].paired_with == Some(me_id);
        if consistent {
            let partner_pos = agents[partner.index()].pos;
            let me = &mut agents[idx];
            me.target_agent_id = Some(partner);
            me.target_pos = pursuit_target(me.pos, partner_pos, me.interaction_radius);
            return Choice {
                alternatives: Vec::new(),
                trade_prefs: Vec::new(),
            };
        }
        // Defensive teardown; a valid pipeline never reaches this.
        tracing::warn!(target: "decision", tick, agent = me_id.0, "inconsistent pairing cleared");
        agents[idx].paired_with = None;
        agents[idx].clear_intent();
    }

    let me = &agents[idx];
    let trade_prefs = if mode.trade_active() {
        trade_preferences(me, view, params, tick)
    } else {
        Vec::new()
    };

    let mut forage_prefs = if mode.forage_active() {
        forage_preferences(me, view, claims, params)
    } else {
        Vec::new()
    };

    // An active foraging commit pins the forage choice to the committed
    // cell while it remains visible, stocked, and unclaimed by others.
    let commit = me.foraging_commit.filter(|c| c.ticks_remaining > 0);
    if let Some(commit) = commit {
        if let Some(&pinned) = forage_prefs.iter().find(|p| p.pos == commit.pos) {
            forage_prefs = vec![pinned];
        }
    }

    let best_trade = trade_prefs.first().copied();
    let best_forage = forage_prefs.first().copied();

    // Ranked alternative scores for telemetry (anonymized, best first).
    let mut all_scores: Vec<f64> = trade_prefs
        .iter()
        .map(|p| p.score)
        .chain(forage_prefs.iter().map(|p| p.score))
        .collect();
    all_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let alternatives: Vec<f64> = all_scores
        .into_iter()
        .skip(1)
        .take(MAX_RANKED_ALTERNATIVES)
        .collect();

    // Commit to whichever of trade/forage scores higher; trade wins ties.
    release_claims_of(claims, agents[idx].id);
    match (best_trade, best_forage) {
        (Some(trade), forage) if forage.is_none_or(|f| trade.score >= f.score) => {
            let me = &mut agents[idx];
            me.target_agent_id = Some(trade.partner);
            me.target_pos = pursuit_target(me.pos, trade.partner_pos, me.interaction_radius);
            me.foraging_commit = None;
        }
        (_, Some(forage)) => {
            let me_id = agents[idx].id;
            claims.insert(forage.pos, me_id);
            let me = &mut agents[idx];
            me.target_agent_id = None;
            me.target_pos = Some(forage.pos);
            me.foraging_commit = match me.foraging_commit {
                Some(c) if c.pos == forage.pos => Some(ForageCommit {
                    pos: c.pos,
                    ticks_remaining: c.ticks_remaining.saturating_sub(1),
                }),
                _ if params.forage_commit_ticks > 0 => Some(ForageCommit {
                    pos: forage.pos,
                    ticks_remaining: params.forage_commit_ticks,
                }),
                _ => None,
            };
        }
        _ => {
            let me = &mut agents[idx];
            me.clear_intent();
            me.foraging_commit = None;
        }
    }

    Choice {
        alternatives,
        trade_prefs,
    }
}

/// Where to walk when chasing a partner: their cell, or nowhere if already
/// inside interaction range.
fn pursuit_target(me: Position, partner: Position, interaction_radius: u32) -> Option<Position> {
    if me.in_box(partner, interaction_radius) {
        None
    } else {
        Some(partner)
    }
}

/// Cooldown or zero-inventory reasons this pair must not form.
fn pair_blocked(
    agents: &[Agent],
    i: usize,
    j: usize,
    regime: ExchangeRegime,
    tick: Tick,
) -> bool {
    let (a, b) = (&agents[i], &agents[j]);
    if a.in_cooldown_with(b.id, tick) || b.in_cooldown_with(a.id, tick) {
        return true;
    }
    !inventory_feasible(a.inventory, b.inventory, regime)
}

/// At least one direction of one allowed pair type is stocked on both ends.
pub(crate) fn inventory_feasible(a: Inventory, b: Inventory, regime: ExchangeRegime) -> bool {
    let mut feasible = false;
    if regime.barter_allowed() {
        feasible |= (a.a >= 1 && b.b >= 1) || (b.a >= 1 && a.b >= 1);
    }
    if regime.money_allowed() {
        feasible |= (a.a >= 1 && b.money >= 1)
            || (b.a >= 1 && a.money >= 1)
            || (a.b >= 1 && b.money >= 1)
            || (b.b >= 1 && a.money >= 1);
    }
    feasible
}

/// Establish a symmetric pairing. Both endpoints drop forage state, both
/// walk toward each other if not yet in range.
fn form_pair(
    agents: &mut [Agent],
    claims: &mut BTreeMap<Position, AgentId>,
    i: usize,
    j: usize,
    reason: PairReason,
    tick: Tick,
    events: &mut Vec<Event>,
) {
    let (id_i, pos_i) = (agents[i].id, agents[i].pos);
    let (id_j, pos_j) = (agents[j].id, agents[j].pos);
    release_claims_of(claims, id_i);
    release_claims_of(claims, id_j);

    let a = &mut agents[i];
    a.paired_with = Some(id_j);
    a.target_agent_id = Some(id_j);
    a.target_pos = pursuit_target(pos_i, pos_j, a.interaction_radius);
    a.foraging_commit = None;

    let b = &mut agents[j];
    b.paired_with = Some(id_i);
    b.target_agent_id = Some(id_i);
    b.target_pos = pursuit_target(pos_j, pos_i, b.interaction_radius);
    b.foraging_commit = None;

    let (agent_a, agent_b) = if id_i < id_j { (id_i, id_j) } else { (id_j, id_i) };
    events.push(Event::Pair {
        tick,
        agent_a,
        agent_b,
        reason,
    });
}

fn release_claims_of(claims: &mut BTreeMap<Position, AgentId>, id: AgentId) {
    claims.retain(|_, claimant| *claimant != id);
}
