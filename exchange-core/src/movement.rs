//! Phase 3: single-cell steps toward the current target.

use crate::agent::Agent;
use crate::types::Position;

/// Move every targeted agent up to its per-tick budget. Steps prefer the
/// axis with the larger remaining delta; on equal deltas the row is reduced
/// before the column. Co-location is allowed, and inventories are never
/// touched here.
pub(crate) fn run_movement_phase(agents: &mut [Agent]) {
    for agent in agents.iter_mut() {
        let Some(target) = agent.target_pos else {
            continue;
        };
        let mut pos = agent.pos;
        for _ in 0..agent.move_budget_per_tick {
            if pos == target {
                break;
            }
            pos = step_toward(pos, target);
        }
        agent.pos = pos;
        if pos == target {
            // Arrival clears the walk target; pairing and claims survive.
            agent.target_pos = None;
        }
    }
}

fn step_toward(pos: Position, target: Position) -> Position {
    let dx = target.x - pos.x;
    let dy = target.y - pos.y;
    if dy.abs() >= dx.abs() && dy != 0 {
        Position::new(pos.x, pos.y + dy.signum())
    } else {
        Position::new(pos.x + dx.signum(), pos.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentId;
    use crate::utility::Utility;

    fn walker(x: i32, y: i32, budget: u32) -> Agent {
        Agent::new(
            AgentId::new(0),
            Position::new(x, y),
            Utility::Linear { v_a: 1.0, v_b: 1.0 },
        )
        .with_move_budget(budget)
    }

    #[test]
    fn larger_delta_axis_moves_first() {
        let mut agents = vec![walker(0, 0, 1)];
        agents[0].target_pos = Some(Position::new(3, 1));
        run_movement_phase(&mut agents);
        // |dx|=3 > |dy|=1: the column moves first.
        assert_eq!(agents[0].pos, Position::new(1, 0));
    }

    #[test]
    fn equal_deltas_reduce_row_before_column() {
        let mut agents = vec![walker(0, 0, 1)];
        agents[0].target_pos = Some(Position::new(2, 2));
        run_movement_phase(&mut agents);
        assert_eq!(agents[0].pos, Position::new(0, 1));
    }

    #[test]
    fn budget_bounds_steps_and_arrival_clears_target() {
        let mut agents = vec![walker(0, 0, 3)];
        agents[0].target_pos = Some(Position::new(2, 0));
        run_movement_phase(&mut agents);
        assert_eq!(agents[0].pos, Position::new(2, 0));
        assert_eq!(agents[0].target_pos, None);
    }

    #[test]
    fn untargeted_agents_stay_put() {
        let mut agents = vec![walker(2, 3, 5)];
        run_movement_phase(&mut agents);
        assert_eq!(agents[0].pos, Position::new(2, 3));
    }
}
