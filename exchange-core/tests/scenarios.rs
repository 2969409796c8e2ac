//! End-to-end scenario contracts: convergence, cooldown cadence,
//! regeneration timing, the money-first tie-break, mode schedules, and
//! claim anti-clustering.

use exchange_core::{
    AgentConfig, AgentId, DistanceMetric, Event, ExchangeRegime, Good, Inventory, Mode, ModePhase,
    PairReason, PairType, Params, Position, ResourceLayout, ResourceSpec, ScenarioConfig,
    UnpairReason, Utility,
};

fn params(regime: ExchangeRegime, mode_schedule: Vec<ModePhase>) -> Params {
    Params {
        spread: 0.02,
        epsilon: 1e-9,
        d_a_max: 3,
        d_b_max: 3,
        trade_cooldown_ticks: 5,
        forage_rate: 1,
        resource_growth_rate: 1,
        resource_regen_cooldown: 5,
        beta_distance: 0.9,
        exchange_regime: regime,
        mode_schedule,
        distance_metric: DistanceMetric::Chebyshev,
        forage_commit_ticks: 3,
        agent_snapshot_every: 0,
        resource_snapshot_every: 0,
    }
}

fn mode(mode: Mode, ticks: u64) -> ModePhase {
    ModePhase { mode, ticks }
}

fn ces_agent(id: u32, pos: (i32, i32), w_a: f64, inv: (u32, u32)) -> AgentConfig {
    AgentConfig {
        id,
        utility: Utility::Ces {
            w_a,
            w_b: 1.0 - w_a,
            rho: 0.0,
        },
        initial_inventory: Inventory::new(inv.0, inv.1),
        pos: Position::new(pos.0, pos.1),
        vision_radius: 4,
        interaction_radius: 1,
        move_budget_per_tick: 1,
        money_lambda: 1.0,
    }
}

// === TWO-AGENT BARTER CONVERGENCE ===

#[test]
fn two_agent_barter_converges_and_stops_trading() {
    let config = ScenarioConfig {
        grid_size: 3,
        agents: vec![
            ces_agent(0, (0, 0), 0.8, (8, 4)),
            ces_agent(1, (2, 2), 0.2, (4, 8)),
        ],
        resources: ResourceLayout::Cells(vec![]),
        params: params(ExchangeRegime::BarterOnly, vec![mode(Mode::Trade, 1000)]),
        seed: 42,
    };

    let mut sim = config.build().unwrap();
    let u0_start = sim.agent(AgentId::new(0)).utility_value();
    let u1_start = sim.agent(AgentId::new(1)).utility_value();

    let events = sim.run(20).unwrap();

    // They want each other immediately: mutual consent on the first tick.
    assert!(
        events.iter().any(|e| matches!(
            e,
            Event::Pair {
                tick: 0,
                reason: PairReason::MutualConsent,
                ..
            }
        )),
        "expected a mutual-consent pair on tick 0"
    );

    let trade_ticks: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Trade { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert!(!trade_ticks.is_empty(), "no trades executed");
    assert!(trade_ticks.len() <= 6, "too many trades: {trade_ticks:?}");
    assert!(
        *trade_ticks.first().unwrap() <= 3,
        "first trade too late: {trade_ticks:?}"
    );
    assert!(
        *trade_ticks.last().unwrap() < 10,
        "trading should die out after convergence: {trade_ticks:?}"
    );

    // Goods conserved, both sides strictly better off than at the start.
    let a0 = sim.agent(AgentId::new(0)).inventory;
    let a1 = sim.agent(AgentId::new(1)).inventory;
    assert_eq!(a0.a + a1.a, 12);
    assert_eq!(a0.b + a1.b, 12);
    assert!(sim.agent(AgentId::new(0)).utility_value() > u0_start);
    assert!(sim.agent(AgentId::new(1)).utility_value() > u1_start);
}

// === COOLDOWN ON FAILED TRADE ===

#[test]
fn marginal_overlap_fails_and_cooldown_gates_repairing() {
    // Quote overlap exists, but eps = 0.15 rejects every integer block, so
    // each meeting fails and the pair can only re-form on the 5-tick beat.
    let mut config = ScenarioConfig {
        grid_size: 3,
        agents: vec![
            ces_agent(0, (0, 0), 0.6, (6, 6)),
            ces_agent(1, (1, 0), 0.4, (6, 6)),
        ],
        resources: ResourceLayout::Cells(vec![]),
        params: params(ExchangeRegime::BarterOnly, vec![mode(Mode::Trade, 1000)]),
        seed: 42,
    };
    config.params.epsilon = 0.15;

    let events = config.build().unwrap().run(16).unwrap();

    assert!(
        !events.iter().any(|e| matches!(e, Event::Trade { .. })),
        "eps must reject every block"
    );

    let pair_ticks: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Pair { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert_eq!(
        pair_ticks,
        vec![0, 5, 10, 15],
        "pairings must track the cooldown cadence"
    );
    assert!(events.iter().all(|e| match e {
        Event::Unpair { reason, .. } => *reason == UnpairReason::TradeFailed,
        _ => true,
    }));
}

// === RESOURCE REGENERATION ===

#[test]
fn depleted_cell_regrows_after_the_cooldown() {
    let cell = Position::new(2, 2);
    let config = ScenarioConfig {
        grid_size: 5,
        agents: vec![AgentConfig {
            id: 0,
            utility: Utility::Linear { v_a: 2.0, v_b: 1.0 },
            initial_inventory: Inventory::new(0, 10),
            pos: Position::new(0, 0),
            vision_radius: 5,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            money_lambda: 1.0,
        }],
        resources: ResourceLayout::Cells(vec![ResourceSpec {
            pos: cell,
            kind: Good::A,
            amount: 5,
        }]),
        params: params(ExchangeRegime::BarterOnly, vec![mode(Mode::Forage, 1000)]),
        seed: 1,
    };

    let mut sim = config.build().unwrap();
    let mut harvest_ticks = Vec::new();
    let mut amount_by_tick = Vec::new();
    for _ in 0..13 {
        let events = sim.step().unwrap();
        harvest_ticks.extend(events.iter().filter_map(|e| match e {
            Event::Forage { tick, .. } => Some(*tick),
            _ => None,
        }));
        amount_by_tick.push(sim.grid().cell(cell).amount);
    }

    // Walk-in takes the manhattan distance (4 single-cell steps), then one
    // unit per tick drains the cell.
    assert_eq!(harvest_ticks, vec![3, 4, 5, 6, 7]);
    // Empty through the regen cooldown window, one unit back afterwards.
    assert_eq!(amount_by_tick[7], 0);
    assert_eq!(amount_by_tick[11], 0);
    assert_eq!(
        amount_by_tick[12], 1,
        "regrowth must land exactly when the cooldown elapses: {amount_by_tick:?}"
    );
    assert_eq!(sim.agent(AgentId::new(0)).inventory.a, 5);
}

#[test]
fn untouched_cells_hold_their_seed_amount_forever() {
    let far_cell = Position::new(4, 4);
    let config = ScenarioConfig {
        grid_size: 5,
        agents: vec![AgentConfig {
            id: 0,
            utility: Utility::Linear { v_a: 2.0, v_b: 1.0 },
            initial_inventory: Inventory::new(0, 0),
            pos: Position::new(0, 0),
            vision_radius: 1, // never sees the cell
            interaction_radius: 1,
            move_budget_per_tick: 1,
            money_lambda: 1.0,
        }],
        resources: ResourceLayout::Cells(vec![ResourceSpec {
            pos: far_cell,
            kind: Good::B,
            amount: 7,
        }]),
        params: params(ExchangeRegime::BarterOnly, vec![mode(Mode::Forage, 1000)]),
        seed: 1,
    };

    let mut sim = config.build().unwrap();
    sim.run(50).unwrap();
    let cell = sim.grid().cell(far_cell);
    assert_eq!(cell.amount, 7);
    assert_eq!(cell.last_harvest_tick, None);
}

// === MONEY-FIRST TIE-BREAK ===

#[test]
fn equal_surplus_trade_settles_money_first() {
    // Linear utilities with λ = 1 make the first accepted money block and
    // the first accepted barter block carry identical total surplus; the
    // tie must fall to A↔M.
    let config = ScenarioConfig {
        grid_size: 3,
        agents: vec![
            AgentConfig {
                id: 0,
                utility: Utility::Linear { v_a: 4.0, v_b: 1.0 },
                initial_inventory: Inventory::new(0, 10).with_money(10),
                pos: Position::new(0, 0),
                vision_radius: 3,
                interaction_radius: 1,
                move_budget_per_tick: 1,
                money_lambda: 1.0,
            },
            AgentConfig {
                id: 1,
                utility: Utility::Linear { v_a: 1.0, v_b: 1.0 },
                initial_inventory: Inventory::new(10, 10),
                pos: Position::new(1, 0),
                vision_radius: 3,
                interaction_radius: 1,
                move_budget_per_tick: 1,
                money_lambda: 1.0,
            },
        ],
        resources: ResourceLayout::Cells(vec![]),
        params: params(ExchangeRegime::Mixed, vec![mode(Mode::Trade, 1000)]),
        seed: 3,
    };

    let mut sim = config.build().unwrap();
    let money_before: u32 = sim.agents().iter().map(|a| a.inventory.money).sum();
    let events = sim.run(20).unwrap();

    let first_trade = events
        .iter()
        .find_map(|e| match e {
            Event::Trade { pair_type, .. } => Some(*pair_type),
            _ => None,
        })
        .expect("the pair must trade");
    assert_eq!(first_trade, PairType::AForMoney);

    let money_after: u32 = sim.agents().iter().map(|a| a.inventory.money).sum();
    assert_eq!(money_before, money_after, "money is neither minted nor burned");
}

// === MODE SCHEDULE ===

#[test]
fn mode_schedule_partitions_trading_and_foraging() {
    let config = ScenarioConfig {
        grid_size: 5,
        agents: vec![
            ces_agent(0, (0, 0), 0.8, (8, 4)),
            ces_agent(1, (2, 2), 0.2, (4, 8)),
        ],
        resources: ResourceLayout::Cells(vec![
            ResourceSpec {
                pos: Position::new(1, 3),
                kind: Good::A,
                amount: 6,
            },
            ResourceSpec {
                pos: Position::new(3, 1),
                kind: Good::B,
                amount: 6,
            },
        ]),
        params: params(
            ExchangeRegime::BarterOnly,
            vec![mode(Mode::Trade, 10), mode(Mode::Forage, 10)],
        ),
        seed: 42,
    };

    let events = config.build().unwrap().run(20).unwrap();

    for event in &events {
        match event {
            Event::Pair { tick, .. } | Event::Trade { tick, .. } => {
                assert!(*tick < 10, "trading activity leaked into forage mode: {event:?}");
            }
            Event::Forage { tick, .. } => {
                assert!(*tick >= 10, "foraging before its window: {event:?}");
            }
            _ => {}
        }
    }
    assert!(
        events.iter().any(|e| matches!(e, Event::Trade { .. })),
        "trade window produced no trades"
    );
    assert!(
        events.iter().any(|e| matches!(e, Event::Forage { .. })),
        "forage window produced no harvests"
    );
}

// === CLAIM ANTI-CLUSTERING ===

#[test]
fn lowest_id_agent_claims_a_contested_cell() {
    let cell = Position::new(2, 2);
    let forager = |id: u32, x: i32, y: i32| AgentConfig {
        id,
        utility: Utility::Linear { v_a: 2.0, v_b: 1.0 },
        initial_inventory: Inventory::new(0, 0),
        pos: Position::new(x, y),
        vision_radius: 5,
        interaction_radius: 1,
        move_budget_per_tick: 1,
        money_lambda: 1.0,
    };
    // Three agents at Chebyshev distance 2 from the only cell.
    let config = ScenarioConfig {
        grid_size: 5,
        agents: vec![forager(0, 0, 2), forager(1, 2, 0), forager(2, 4, 4)],
        resources: ResourceLayout::Cells(vec![ResourceSpec {
            pos: cell,
            kind: Good::A,
            amount: 2,
        }]),
        params: params(ExchangeRegime::BarterOnly, vec![mode(Mode::Forage, 1000)]),
        seed: 6,
    };

    let mut sim = config.build().unwrap();
    let events = sim.run(10).unwrap();

    for event in &events {
        if let Event::Forage { agent_id, .. } = event {
            assert_eq!(
                *agent_id,
                AgentId::new(0),
                "only the claim holder may harvest"
            );
        }
    }
    assert_eq!(sim.agent(AgentId::new(0)).inventory.a, 2);
    // The losers never found an alternative target and never moved.
    assert_eq!(sim.agent(AgentId::new(1)).pos, Position::new(2, 0));
    assert_eq!(sim.agent(AgentId::new(2)).pos, Position::new(4, 4));
    assert_eq!(sim.agent(AgentId::new(1)).inventory.a, 0);
    assert_eq!(sim.agent(AgentId::new(2)).inventory.a, 0);
}
