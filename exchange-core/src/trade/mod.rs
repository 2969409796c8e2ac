//! Phase 4: bargaining over adjacent pairs and conservation-safe settlement.

mod bargain;

pub use bargain::{TradeBlock, bargain};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::events::{Event, UnpairReason};
use crate::scenario::Params;
use crate::types::Tick;

/// For each pair `(i, j)` with `i < j`, in ascending `i`: if the pair is in
/// interaction range, run bargaining and settle exactly one trade or set a
/// cooldown. Pairs out of range stay paired and keep converging.
pub(crate) fn run_trade_phase(
    agents: &mut [Agent],
    params: &Params,
    tick: Tick,
    events: &mut Vec<Event>,
) -> Result<(), EngineError> {
    let pairs: Vec<(usize, usize)> = agents
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.paired_with.map(|j| (i, j.index())))
        .filter(|&(i, j)| i < j)
        .collect();

    for (i, j) in pairs {
        let radius = agents[i]
            .interaction_radius
            .min(agents[j].interaction_radius);
        if !agents[i].pos.in_box(agents[j].pos, radius) {
            continue;
        }

        match bargain(&agents[i], &agents[j], params) {
            Some(block) => settle(agents, i, j, &block, tick, events)?,
            None => fail(agents, i, j, params, tick, events),
        }
    }
    Ok(())
}

/// Apply the block atomically: goods are conserved by construction, and any
/// would-be negative holding aborts the run as a conservation bug.
fn settle(
    agents: &mut [Agent],
    i: usize,
    j: usize,
    block: &TradeBlock,
    tick: Tick,
    events: &mut Vec<Event>,
) -> Result<(), EngineError> {
    let (seller_idx, buyer_idx) = if agents[i].id == block.seller {
        (i, j)
    } else {
        (j, i)
    };
    let good = block.pair_type.good();
    let d_good = i64::from(block.d_good);
    let d_counter = i64::from(block.d_counter);

    let seller_inv = agents[seller_idx].inventory;
    let buyer_inv = agents[buyer_idx].inventory;

    let (new_seller, new_buyer) = if block.pair_type.is_money() {
        let new_seller = seller_inv
            .checked_apply(good, -d_good)
            .zip(seller_inv.checked_apply_money(d_counter));
        let new_buyer = buyer_inv
            .checked_apply(good, d_good)
            .zip(buyer_inv.checked_apply_money(-d_counter));
        match (new_seller, new_buyer) {
            (Some((sg, sm)), Some((bg, bm))) => {
                let mut s = seller_inv;
                s.set_amount(good, sg);
                s.money = sm;
                let mut b = buyer_inv;
                b.set_amount(good, bg);
                b.money = bm;
                (s, b)
            }
            _ => {
                return Err(EngineError::invariant(
                    tick,
                    format!(
                        "trade between {} and {} would drive an inventory negative ({block:?})",
                        agents[seller_idx].id, agents[buyer_idx].id
                    ),
                ));
            }
        }
    } else {
        let counter = good.other();
        let new_seller = seller_inv
            .checked_apply(good, -d_good)
            .zip(seller_inv.checked_apply(counter, d_counter));
        let new_buyer = buyer_inv
            .checked_apply(good, d_good)
            .zip(buyer_inv.checked_apply(counter, -d_counter));
        match (new_seller, new_buyer) {
            (Some((sg, sc)), Some((bg, bc))) => {
                let mut s = seller_inv;
                s.set_amount(good, sg);
                s.set_amount(counter, sc);
                let mut b = buyer_inv;
                b.set_amount(good, bg);
                b.set_amount(counter, bc);
                (s, b)
            }
            _ => {
                return Err(EngineError::invariant(
                    tick,
                    format!(
                        "trade between {} and {} would drive an inventory negative ({block:?})",
                        agents[seller_idx].id, agents[buyer_idx].id
                    ),
                ));
            }
        }
    };

    agents[seller_idx].inventory = new_seller;
    agents[buyer_idx].inventory = new_buyer;
    agents[seller_idx].inventory_dirty = true;
    agents[buyer_idx].inventory_dirty = true;

    tracing::debug!(
        target: "trade",
        tick,
        seller = block.seller.0,
        buyer = block.buyer.0,
        d_good = block.d_good,
        d_counter = block.d_counter,
        price = block.price(),
    );

    events.push(Event::Trade {
        tick,
        buyer_id: block.buyer,
        seller_id: block.seller,
        pair_type: block.pair_type,
        d_a: block.d_good,
        d_b: block.d_counter,
        price: block.price(),
        surplus_buyer: block.surplus_buyer,
        surplus_seller: block.surplus_seller,
    });

    // Successful trades clear the pairing so the next Decision can
    // re-evaluate (or re-pair freely if still beneficial).
    unpair(agents, i, j, tick, UnpairReason::TradeSuccess, events);
    Ok(())
}

/// Failed negotiation: symmetric per-pair cooldown, then teardown.
fn fail(
    agents: &mut [Agent],
    i: usize,
    j: usize,
    params: &Params,
    tick: Tick,
    events: &mut Vec<Event>,
) {
    let expiry = tick + params.trade_cooldown_ticks;
    let (id_i, id_j) = (agents[i].id, agents[j].id);
    agents[i].set_cooldown(id_j, expiry);
    agents[j].set_cooldown(id_i, expiry);

    tracing::debug!(target: "trade", tick, a = id_i.0, b = id_j.0, expiry, "no feasible block");
    unpair(agents, i, j, tick, UnpairReason::TradeFailed, events);
}

fn unpair(
    agents: &mut [Agent],
    i: usize,
    j: usize,
    tick: Tick,
    reason: UnpairReason,
    events: &mut Vec<Event>,
) {
    let (id_i, id_j) = (agents[i].id, agents[j].id);
    agents[i].paired_with = None;
    agents[j].paired_with = None;
    agents[i].clear_intent();
    agents[j].clear_intent();

    let (agent_a, agent_b) = if id_i < id_j { (id_i, id_j) } else { (id_j, id_i) };
    events.push(Event::Unpair {
        tick,
        agent_a,
        agent_b,
        reason,
    });
}
