use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashSet},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{Action, Direction, Position, world::WorldInfo};

/// Tuning knobs for the action-state search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Skip states whose key has already been expanded.
    ///
    /// With unit costs and insertion-order tie breaking the first expansion
    /// of a key always wins, so this never changes the plan. It does keep the
    /// frontier finite when the gold turns out to be unreachable.
    pub prune_revisits: bool,

    /// Give up after this many expansions. `None`, the default, searches
    /// until the gold is reached or the frontier is empty.
    pub max_expansions: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            prune_revisits: true,
            max_expansions: None,
        }
    }
}

/// The part of a search state that determines which actions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub arrow_used: bool,
    pub wumpus_dead: bool,
    pub facing: Direction,
    pub position: Position,
}

/// A node of the action-state search: a key plus the actions that led to it.
///
/// Every successor gets its own copy of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub key: SearchKey,
    pub history: Vec<Action>,
}

impl SearchState {
    /// Arrow in hand, wumpus alive, facing North on the hunter's start cell.
    pub fn initial(world: &WorldInfo) -> Self {
        SearchState {
            key: SearchKey {
                arrow_used: false,
                wumpus_dead: false,
                facing: Direction::North,
                position: world.hunter(),
            },
            history: Vec::new(),
        }
    }

    /// Path cost so far, one per action.
    pub fn cost(&self) -> usize {
        self.history.len()
    }

    /// Applies `action`, or returns `None` when it is illegal in this state.
    ///
    /// `Grab` and `Climb` are never produced during the search.
    pub fn successor(&self, action: Action, world: &WorldInfo) -> Option<SearchState> {
        let key = self.key;
        let next = match action {
            Action::TurnLeft => SearchKey {
                facing: key.facing.turn_left(),
                ..key
            },
            Action::TurnRight => SearchKey {
                facing: key.facing.turn_right(),
                ..key
            },
            Action::Move => {
                let position = key.position.step(key.facing)?;
                if !can_enter(world, position, key.wumpus_dead) {
                    return None;
                }
                SearchKey { position, ..key }
            }
            Action::Shoot => {
                if key.arrow_used {
                    return None;
                }
                let hit = world
                    .wumpus()
                    .is_some_and(|wumpus| key.facing.is_ahead(key.position, wumpus));
                SearchKey {
                    arrow_used: true,
                    wumpus_dead: key.wumpus_dead || hit,
                    ..key
                }
            }
            Action::Grab | Action::Climb => return None,
        };

        let mut history = self.history.clone();
        history.push(action);
        Some(SearchState { key: next, history })
    }
}

/// Whether the hunter may step onto `position`.
///
/// The wumpus cell only opens up in states where the wumpus is already dead.
fn can_enter(world: &WorldInfo, position: Position, wumpus_dead: bool) -> bool {
    world.contains(position)
        && !world.is_pit(position)
        && !world.is_block(position)
        && (wumpus_dead || !world.is_wumpus(position))
}

/// Frontier entry. Ordered by cost, then by insertion sequence; the state
/// itself never takes part in the comparison.
#[derive(Debug)]
struct PriorityEntry {
    cost: usize,
    seq: u64,
    state: SearchState,
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for PriorityEntry {}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        (other.cost, other.seq).cmp(&(self.cost, self.seq))
    }
}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How planning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    /// The gold lies on the start cell.
    GoldAtStart,
    /// No pit-free path connects the start and the gold.
    Unreachable,
    /// Paths exist on the open grid, but none the hunter can legally walk
    /// (blocks or the wumpus cut them), or an opt-in expansion budget ran out.
    SearchExhausted,
    /// A route was found; `outbound_cost` counts the actions up to the gold.
    Found { outbound_cost: usize },
}

/// A complete action sequence, always ending in `Climb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub outcome: PlanOutcome,
    pub actions: Vec<Action>,
}

impl Plan {
    fn abandon(outcome: PlanOutcome) -> Self {
        Plan {
            outcome,
            actions: vec![Action::Climb],
        }
    }
}

/// Uniform-cost planner over (arrow, wumpus, facing, position) states.
#[derive(Debug, Clone)]
pub struct Planner {
    actions: Vec<Action>,
    config: PlannerConfig,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(&Action::ALL)
    }
}

impl Planner {
    /// Creates a planner for a hunter that supports `actions`.
    ///
    /// Successors are generated in the order given. Actions that cannot be
    /// used mid-search are ignored.
    pub fn new(actions: &[Action]) -> Self {
        Self {
            actions: actions
                .iter()
                .copied()
                .filter(|action| action.is_expandable())
                .collect(),
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Plans the whole episode: fetch the gold, come back, climb out.
    #[tracing::instrument(level = "debug", skip_all, fields(world = world.id()))]
    pub fn plan(&self, world: &WorldInfo) -> Plan {
        if world.gold() == world.hunter() {
            debug!("Gold is on the start cell");
            return Plan {
                outcome: PlanOutcome::GoldAtStart,
                actions: vec![Action::Grab, Action::Climb],
            };
        }

        if !path_exists(world) {
            debug!("No pit-free path to the gold, abandoning");
            return Plan::abandon(PlanOutcome::Unreachable);
        }

        match self.search(world) {
            Some(state) => {
                let outbound_cost = state.cost();
                let actions = synthesize_return(&state.history);
                debug!(outbound_cost, total = actions.len(), "Plan found");
                Plan {
                    outcome: PlanOutcome::Found { outbound_cost },
                    actions,
                }
            }
            None => {
                debug!("Search exhausted without reaching the gold, abandoning");
                Plan::abandon(PlanOutcome::SearchExhausted)
            }
        }
    }

    /// Runs the uniform-cost search and returns the first state standing on
    /// the gold.
    ///
    /// The search stops as soon as an expansion produces the gold cell, which
    /// is cost-minimal because every action costs one and the frontier is
    /// popped in nondecreasing cost order.
    pub fn search(&self, world: &WorldInfo) -> Option<SearchState> {
        let gold = world.gold();
        let mut frontier = BinaryHeap::new();
        let mut expanded: HashSet<SearchKey> = HashSet::new();
        let mut seq: u64 = 0;
        let mut expansions: usize = 0;

        frontier.push(PriorityEntry {
            cost: 0,
            seq,
            state: SearchState::initial(world),
        });

        while let Some(PriorityEntry { state, .. }) = frontier.pop() {
            if self.config.prune_revisits && !expanded.insert(state.key) {
                continue;
            }

            expansions += 1;
            if self
                .config
                .max_expansions
                .is_some_and(|limit| expansions > limit)
            {
                warn!(expansions, "Expansion budget exhausted");
                return None;
            }

            for &action in &self.actions {
                let Some(child) = state.successor(action, world) else {
                    continue;
                };

                if child.key.position == gold {
                    trace!(expansions, frontier = frontier.len(), "Reached the gold");
                    return Some(child);
                }

                seq += 1;
                frontier.push(PriorityEntry {
                    cost: child.cost(),
                    seq,
                    state: child,
                });
            }
        }

        trace!(expansions, "Frontier exhausted");
        None
    }
}

/// Plans with the full action set and default configuration.
pub fn plan(world: &WorldInfo) -> Plan {
    Planner::default().plan(world)
}

/// Whether the gold can be reached at all over cells that are inside the
/// grid and not pits. Facing, the arrow, the wumpus and blocks are ignored.
pub fn path_exists(world: &WorldInfo) -> bool {
    let start = world.hunter();
    let gold = world.gold();
    if start == gold {
        return true;
    }

    let mut visited: HashSet<Position> = HashSet::from([start]);
    let mut stack: Vec<Position> = vec![start];

    while let Some(current) = stack.pop() {
        if current == gold {
            return true;
        }
        for neighbor in current.neighbors() {
            if world.contains(neighbor) && !world.is_pit(neighbor) && visited.insert(neighbor) {
                stack.push(neighbor);
            }
        }
    }

    false
}

/// Builds the full plan from the outbound actions: grab, turn around, walk
/// the outbound route backwards with left and right swapped, climb.
///
/// Shots are not repeated on the way back. A turn left dangling right
/// before the climb is dropped.
pub fn synthesize_return(outbound: &[Action]) -> Vec<Action> {
    let mut actions = Vec::with_capacity(outbound.len() * 2 + 4);
    actions.extend_from_slice(outbound);
    actions.extend([Action::Grab, Action::TurnLeft, Action::TurnLeft]);

    actions.extend(
        outbound
            .iter()
            .rev()
            .filter(|action| matches!(action, Action::Move | Action::TurnLeft | Action::TurnRight))
            .map(|action| action.mirrored()),
    );

    if actions.last() != Some(&Action::Move) {
        actions.pop();
    }

    actions.push(Action::Climb);
    actions
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::world::{SIMPLE_WORLD_JSON, WorldDescription};

    use crate::Action::{Climb, Grab, Move, Shoot, TurnLeft as L, TurnRight as R};

    fn world(description: WorldDescription) -> WorldInfo {
        description.into_world().unwrap()
    }

    fn corridor(wumpus: Option<[usize; 2]>, blocks: Vec<[usize; 2]>) -> WorldInfo {
        world(WorldDescription {
            size: [3, 1],
            hunters: vec![[0, 0]],
            golds: vec![[2, 0]],
            exits: vec![[0, 0]],
            wumpuses: wumpus.into_iter().collect(),
            blocks,
            ..Default::default()
        })
    }

    /// Walks the plan and checks the hunter never dies, reaches the gold and
    /// is back on the start cell when climbing.
    fn assert_safe_round_trip(world: &WorldInfo, actions: &[Action]) {
        let mut position = world.hunter();
        let mut facing = Direction::North;
        let mut arrow_used = false;
        let mut wumpus_dead = false;
        let mut visited_gold = false;

        let (last, body) = actions.split_last().expect("empty plan");
        assert_eq!(*last, Climb);

        for action in body {
            match action {
                Move => {
                    position = position.step(facing).expect("walked off the grid");
                    assert!(world.contains(position), "walked off the grid");
                    assert!(!world.is_pit(position), "fell into pit at {position:?}");
                    assert!(!world.is_block(position), "walked into block");
                    assert!(
                        wumpus_dead || !world.is_wumpus(position),
                        "eaten at {position:?}"
                    );
                }
                L => facing = facing.turn_left(),
                R => facing = facing.turn_right(),
                Shoot => {
                    assert!(!arrow_used, "shot twice");
                    arrow_used = true;
                    if let Some(w) = world.wumpus() {
                        wumpus_dead |= facing.is_ahead(position, w);
                    }
                }
                Grab => assert_eq!(position, world.gold()),
                Climb => panic!("climb before the end of the plan"),
            }
            visited_gold |= position == world.gold();
        }

        assert!(visited_gold, "never reached the gold");
        assert_eq!(position, world.hunter(), "not back at the start");
    }

    /// Breadth-first search over the same keys, used as a reference for the
    /// cheapest outbound cost.
    fn reference_cost(world: &WorldInfo) -> Option<usize> {
        let start = SearchState::initial(world);
        let mut seen = HashSet::from([start.key]);
        let mut queue = VecDeque::from([start]);
        while let Some(state) = queue.pop_front() {
            if state.key.position == world.gold() {
                return Some(state.cost());
            }
            for action in [Move, R, L, Shoot] {
                if let Some(child) = state.successor(action, world) {
                    if seen.insert(child.key) {
                        queue.push_back(child);
                    }
                }
            }
        }
        None
    }

    #[test]
    fn gold_at_start_grabs_and_climbs() {
        let w = world(WorldDescription {
            size: [3, 3],
            hunters: vec![[1, 1]],
            golds: vec![[1, 1]],
            ..Default::default()
        });
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::GoldAtStart);
        assert_eq!(plan.actions, vec![Grab, Climb]);
    }

    #[test]
    fn walled_in_by_pits_only_climbs() {
        let w = world(WorldDescription {
            size: [4, 4],
            hunters: vec![[0, 0]],
            golds: vec![[3, 3]],
            pits: vec![[1, 0], [0, 1]],
            ..Default::default()
        });
        assert!(!path_exists(&w));
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::Unreachable);
        assert_eq!(plan.actions, vec![Climb]);
    }

    #[test]
    fn reachability_ignores_wumpus_and_blocks() {
        assert!(path_exists(&corridor(Some([1, 0]), vec![])));
        assert!(path_exists(&corridor(None, vec![[1, 0]])));
    }

    #[test]
    fn reachability_stays_inside_the_grid() {
        // The only detour around the pit row would run along x == width.
        let w = world(WorldDescription {
            size: [2, 3],
            hunters: vec![[0, 0]],
            golds: vec![[0, 2]],
            pits: vec![[0, 1], [1, 1]],
            ..Default::default()
        });
        assert!(!path_exists(&w));
    }

    #[test]
    fn blocked_corridor_exhausts_search() {
        let w = corridor(None, vec![[1, 0]]);
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::SearchExhausted);
        assert_eq!(plan.actions, vec![Climb]);
    }

    #[test]
    fn simple_world_plan() {
        let w = WorldInfo::from_json(SIMPLE_WORLD_JSON).unwrap();
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::Found { outbound_cost: 10 });
        assert_eq!(
            plan.actions,
            vec![
                Move, Move, Move, R, Move, Move, Move, Move, Move, Move, Grab, L, L, Move, Move,
                Move, Move, Move, Move, L, Move, Move, Move, Climb,
            ]
        );
        assert_safe_round_trip(&w, &plan.actions);
    }

    #[test]
    fn simple_world_plan_is_the_same_without_pruning() {
        let w = WorldInfo::from_json(SIMPLE_WORLD_JSON).unwrap();
        let pruned = Planner::default().plan(&w);
        let unpruned = Planner::default()
            .with_config(PlannerConfig {
                prune_revisits: false,
                max_expansions: None,
            })
            .plan(&w);
        assert_eq!(pruned, unpruned);
    }

    #[test]
    fn shoots_wumpus_blocking_the_only_path() {
        let w = corridor(Some([1, 0]), vec![]);
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::Found { outbound_cost: 4 });
        assert_eq!(
            plan.actions,
            vec![R, Shoot, Move, Move, Grab, L, L, Move, Move, Climb]
        );
        assert_safe_round_trip(&w, &plan.actions);
    }

    #[test]
    fn shooting_is_cheaper_than_a_detour() {
        let w = world(WorldDescription {
            size: [4, 4],
            hunters: vec![[1, 1]],
            golds: vec![[1, 3]],
            wumpuses: vec![[1, 2]],
            pits: vec![[0, 2], [2, 2]],
            exits: vec![[1, 1]],
            ..Default::default()
        });
        let plan = plan(&w);
        assert_eq!(
            plan.actions,
            vec![Shoot, Move, Move, Grab, L, L, Move, Move, Climb]
        );
        assert_safe_round_trip(&w, &plan.actions);
    }

    #[test]
    fn shot_kills_only_when_aligned() {
        let w = corridor(Some([1, 0]), vec![]);
        let start = SearchState::initial(&w);

        let missed = start.successor(Shoot, &w).unwrap();
        assert!(missed.key.arrow_used);
        assert!(!missed.key.wumpus_dead);
        assert_eq!(missed.key.position, start.key.position);
        assert_eq!(missed.key.facing, Direction::North);

        let facing_east = start.successor(R, &w).unwrap();
        let hit = facing_east.successor(Shoot, &w).unwrap();
        assert!(hit.key.wumpus_dead);

        let facing_west = start.successor(L, &w).unwrap();
        assert!(!facing_west.successor(Shoot, &w).unwrap().key.wumpus_dead);
    }

    #[test]
    fn second_shot_is_illegal() {
        let w = corridor(Some([1, 0]), vec![]);
        let shot = SearchState::initial(&w).successor(Shoot, &w).unwrap();
        assert_eq!(shot.successor(Shoot, &w), None);
    }

    #[test]
    fn wumpus_cell_opens_after_kill() {
        let w = corridor(Some([1, 0]), vec![]);
        let facing_east = SearchState::initial(&w).successor(R, &w).unwrap();
        assert_eq!(facing_east.successor(Move, &w), None);

        let after_kill = facing_east.successor(Shoot, &w).unwrap();
        let moved = after_kill.successor(Move, &w).unwrap();
        assert_eq!(moved.key.position, Position::new(1, 0));
        assert_eq!(moved.history, vec![R, Shoot, Move]);
        assert_eq!(facing_east.history, vec![R]);
    }

    #[test]
    fn moves_never_leave_the_grid() {
        let w = corridor(None, vec![]);
        let start = SearchState::initial(&w);
        // Facing North on a one-row grid.
        assert_eq!(start.successor(Move, &w), None);
        let west = start.successor(L, &w).unwrap();
        assert_eq!(west.successor(Move, &w), None);
    }

    #[test]
    fn grab_and_climb_are_not_searched() {
        let w = corridor(None, vec![]);
        let start = SearchState::initial(&w);
        assert_eq!(start.successor(Grab, &w), None);
        assert_eq!(start.successor(Climb, &w), None);
    }

    #[test]
    fn frontier_breaks_ties_by_insertion_order() {
        let w = corridor(None, vec![]);
        let mut heap = BinaryHeap::new();
        for (seq, cost) in [(0, 2), (1, 1), (2, 1), (3, 0)] {
            heap.push(PriorityEntry {
                cost,
                seq,
                state: SearchState::initial(&w),
            });
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn return_path_mirrors_turns_and_drops_shots() {
        let outbound = [R, Shoot, Move, L, Move];
        assert_eq!(
            synthesize_return(&outbound),
            vec![
                R, Shoot, Move, L, Move, Grab, L, L, Move, R, Move, Climb
            ]
        );
    }

    #[test]
    fn return_path_keeps_a_final_move() {
        let outbound = [Move, R, Move];
        assert_eq!(
            synthesize_return(&outbound),
            vec![Move, R, Move, Grab, L, L, Move, L, Move, Climb]
        );
    }

    #[test]
    fn return_path_reverses_to_outbound() {
        let outbounds: [&[Action]; 4] = [
            &[Move, Move, R, Move, Move],
            &[R, Move, L, Move, L, L, Move],
            &[L, Move],
            &[Move, Move, Move, R, Move, Move, Move, Move, Move, Move],
        ];
        for outbound in outbounds {
            let plan = synthesize_return(outbound);
            let back = &plan[outbound.len() + 3..plan.len() - 1];
            let recovered: Vec<Action> = back.iter().rev().map(|a| a.mirrored()).collect();

            // A leading turn comes back as the trimmed trailing turn.
            let expected = if outbound[0] == Move {
                outbound
            } else {
                &outbound[1..]
            };
            assert_eq!(recovered, expected);
        }
    }

    #[test]
    fn classic_worlds_are_cost_minimal_and_safe() {
        for seed in 0..40 {
            let w = WorldInfo::classic(5, seed).unwrap();
            let plan = plan(&w);
            match plan.outcome {
                PlanOutcome::Found { outbound_cost } => {
                    assert_eq!(Some(outbound_cost), reference_cost(&w), "seed {seed}");
                    assert_safe_round_trip(&w, &plan.actions);
                }
                PlanOutcome::Unreachable => {
                    assert!(!path_exists(&w));
                    assert_eq!(plan.actions, vec![Climb]);
                }
                PlanOutcome::SearchExhausted => {
                    assert_eq!(reference_cost(&w), None, "seed {seed}");
                }
                PlanOutcome::GoldAtStart => unreachable!("classic gold never starts on the hunter"),
            }
        }
    }

    #[test]
    fn bundled_worlds_plan_as_expected() {
        let corridor = WorldInfo::from_json(include_str!("../../worlds/wumpus_corridor.json")).unwrap();
        let plan_corridor = plan(&corridor);
        assert_eq!(
            plan_corridor.outcome,
            PlanOutcome::Found { outbound_cost: 6 }
        );
        assert_safe_round_trip(&corridor, &plan_corridor.actions);

        let sealed = WorldInfo::from_json(include_str!("../../worlds/sealed_gold.json")).unwrap();
        assert_eq!(plan(&sealed).outcome, PlanOutcome::Unreachable);
    }

    fn open_world(size: usize) -> WorldInfo {
        world(WorldDescription {
            size: [size, size],
            hunters: vec![[0, 0]],
            golds: vec![[size - 1, size - 1]],
            exits: vec![[0, 0]],
            ..Default::default()
        })
    }

    #[test]
    fn default_search_has_no_expansion_budget() {
        assert_eq!(PlannerConfig::default().max_expansions, None);

        let w = open_world(100);
        let plan = plan(&w);
        assert_eq!(plan.outcome, PlanOutcome::Found { outbound_cost: 199 });
        assert_safe_round_trip(&w, &plan.actions);
    }

    #[test]
    #[ignore = "expands over a million states"]
    fn default_search_finishes_worlds_past_a_million_expansions() {
        let w = open_world(400);
        assert_eq!(plan(&w).outcome, PlanOutcome::Found { outbound_cost: 799 });
    }

    #[test]
    fn expansion_budget_stops_the_search() {
        let w = WorldInfo::from_json(SIMPLE_WORLD_JSON).unwrap();
        let planner = Planner::default().with_config(PlannerConfig {
            prune_revisits: true,
            max_expansions: Some(3),
        });
        assert_eq!(planner.search(&w), None);
        assert_eq!(planner.plan(&w).outcome, PlanOutcome::SearchExhausted);
    }

    #[test]
    fn planner_only_uses_supported_actions() {
        // Without the arrow the wumpus in the corridor can't be passed.
        let w = corridor(Some([1, 0]), vec![]);
        let planner = Planner::new(&[Move, R, L, Grab, Climb]);
        assert_eq!(planner.plan(&w).outcome, PlanOutcome::SearchExhausted);
    }
}
