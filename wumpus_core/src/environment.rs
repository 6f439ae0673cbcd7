use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Action, Direction, Position, agent::Agent, map::Grid, world::WorldInfo};

/// Every action costs one point.
pub const ACTION_COST: i64 = 1;
/// Extra cost of firing the arrow.
pub const ARROW_COST: i64 = 10;
pub const DEATH_PENALTY: i64 = 1000;
/// Awarded when climbing out with the gold.
pub const GOLD_REWARD: i64 = 1000;

/// Represents the static type of a cell in the environment grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Floor,
    Pit,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Pit,
    Wumpus,
}

/// Represents the outcome of processing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    /// Walked into a block or the edge of the world.
    Bump,
    /// The arrow killed the wumpus.
    Scream,
    Died(DeathCause),
    Exited { with_gold: bool },
    Failure(String),
}

/// Where an episode stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Running,
    Dead(DeathCause),
    Exited { with_gold: bool },
}

impl EpisodeStatus {
    pub fn is_over(self) -> bool {
        self != EpisodeStatus::Running
    }
}

/// Holds the state of the hunter within the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunterState {
    pub position: Position,
    pub facing: Direction,
    pub has_arrow: bool,
    pub has_gold: bool,
}

/// What the hunter senses on its current cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percepts {
    /// The wumpus is on or next to this cell.
    pub stench: bool,
    /// A pit is next to this cell.
    pub breeze: bool,
    /// The gold is on this cell.
    pub glitter: bool,
}

/// Provides a read-only view of the environment relevant to an agent.
///
/// The world is fully observed, so the snapshot is handed over as is.
#[derive(Debug)]
pub struct EnvironmentView<'a> {
    pub world: &'a WorldInfo,
    pub hunter: &'a HunterState,
    pub wumpus_alive: bool,
    pub percepts: Percepts,
}

/// Summary of an episode driven by [`Environment::run_episode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub actions: Vec<Action>,
    pub status: EpisodeStatus,
    pub score: i64,
}

/// Steps a single hunter through a world.
#[derive(Debug, Clone)]
pub struct Environment {
    world: WorldInfo,
    terrain: Grid<Cell>,
    hunter: HunterState,
    wumpus_alive: bool,
    gold_on_floor: bool,
    status: EpisodeStatus,
    score: i64,
}

impl Environment {
    /// Places the hunter on its start cell, facing North with one arrow.
    pub fn new(world: WorldInfo) -> Self {
        let terrain = Grid::from_generator(world.width(), world.height(), |position| {
            if world.is_block(position) {
                Cell::Block
            } else if world.is_pit(position) {
                Cell::Pit
            } else {
                Cell::Floor
            }
        });
        let hunter = HunterState {
            position: world.hunter(),
            facing: Direction::North,
            has_arrow: true,
            has_gold: false,
        };

        Environment {
            wumpus_alive: world.wumpus().is_some(),
            world,
            terrain,
            hunter,
            gold_on_floor: true,
            status: EpisodeStatus::Running,
            score: 0,
        }
    }

    pub fn world(&self) -> &WorldInfo {
        &self.world
    }

    pub fn terrain(&self) -> &Grid<Cell> {
        &self.terrain
    }

    pub fn hunter(&self) -> &HunterState {
        &self.hunter
    }

    pub fn wumpus_alive(&self) -> bool {
        self.wumpus_alive
    }

    /// Whether the gold still lies on its cell.
    pub fn gold_on_floor(&self) -> bool {
        self.gold_on_floor
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn percepts(&self) -> Percepts {
        let here = self.hunter.position;
        let around: Vec<Position> = here
            .neighbors()
            .filter(|p| self.terrain.contains(*p))
            .collect();

        Percepts {
            stench: self
                .world
                .wumpus()
                .is_some_and(|wumpus| wumpus == here || around.contains(&wumpus)),
            breeze: around.iter().any(|p| self.terrain[*p] == Cell::Pit),
            glitter: self.gold_on_floor && self.world.gold() == here,
        }
    }

    pub fn view(&self) -> EnvironmentView<'_> {
        EnvironmentView {
            world: &self.world,
            hunter: &self.hunter,
            wumpus_alive: self.wumpus_alive,
            percepts: self.percepts(),
        }
    }

    /// Asks the agent for one action and applies it.
    ///
    /// Returns `None` without touching the world when the agent has stopped.
    pub fn process_turn(&mut self, agent: &mut dyn Agent) -> Option<(Action, ActionResult)> {
        let action = agent.get_action(&self.view())?;
        let result = self.process_action(action);
        Some((action, result))
    }

    /// Lets the agent act until the episode ends, the agent stops, or
    /// `max_steps` actions were taken.
    pub fn run_episode(&mut self, agent: &mut dyn Agent, max_steps: usize) -> EpisodeReport {
        let mut actions = Vec::new();
        while !self.status.is_over() && actions.len() < max_steps {
            let Some((action, result)) = self.process_turn(agent) else {
                debug!("Agent has no more actions");
                break;
            };
            debug!(?action, ?result, "Step");
            actions.push(action);
        }
        info!(status = ?self.status, score = self.score, steps = actions.len(), "Episode finished");
        EpisodeReport {
            actions,
            status: self.status,
            score: self.score,
        }
    }

    /// Applies a single action for the hunter.
    pub fn process_action(&mut self, action: Action) -> ActionResult {
        if self.status.is_over() {
            return ActionResult::Failure("The episode is over.".to_string());
        }
        self.score -= ACTION_COST;

        let hunter = &mut self.hunter;
        match action {
            Action::TurnLeft => {
                hunter.facing = hunter.facing.turn_left();
                ActionResult::Success
            }
            Action::TurnRight => {
                hunter.facing = hunter.facing.turn_right();
                ActionResult::Success
            }
            Action::Move => {
                let target = match hunter.position.step(hunter.facing) {
                    Some(target) if self.terrain.contains(target) => target,
                    _ => return ActionResult::Bump,
                };
                match self.terrain[target] {
                    Cell::Block => ActionResult::Bump,
                    Cell::Pit => {
                        hunter.position = target;
                        self.die(DeathCause::Pit)
                    }
                    Cell::Floor if self.wumpus_alive && self.world.is_wumpus(target) => {
                        hunter.position = target;
                        self.die(DeathCause::Wumpus)
                    }
                    Cell::Floor => {
                        hunter.position = target;
                        ActionResult::Success
                    }
                }
            }
            Action::Shoot => {
                if !hunter.has_arrow {
                    return ActionResult::Failure("No arrow left.".to_string());
                }
                hunter.has_arrow = false;
                self.score -= ARROW_COST;

                let hit = self.wumpus_alive
                    && self
                        .world
                        .wumpus()
                        .is_some_and(|wumpus| hunter.facing.is_ahead(hunter.position, wumpus));
                if hit {
                    self.wumpus_alive = false;
                    ActionResult::Scream
                } else {
                    ActionResult::Success
                }
            }
            Action::Grab => {
                if self.gold_on_floor && hunter.position == self.world.gold() {
                    self.gold_on_floor = false;
                    hunter.has_gold = true;
                    ActionResult::Success
                } else {
                    ActionResult::Failure(format!("No gold at {:?}.", hunter.position))
                }
            }
            Action::Climb => {
                if !self.world.is_exit(hunter.position) {
                    return ActionResult::Failure(format!("No exit at {:?}.", hunter.position));
                }
                let with_gold = hunter.has_gold;
                if with_gold {
                    self.score += GOLD_REWARD;
                }
                self.status = EpisodeStatus::Exited { with_gold };
                ActionResult::Exited { with_gold }
            }
        }
    }

    fn die(&mut self, cause: DeathCause) -> ActionResult {
        self.score -= DEATH_PENALTY;
        self.status = EpisodeStatus::Dead(cause);
        ActionResult::Died(cause)
    }
}
