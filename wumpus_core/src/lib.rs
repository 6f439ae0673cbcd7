use serde::{Deserialize, Serialize};

pub mod agent;
pub mod environment;
pub mod map;
pub mod planner;
pub mod world;

/// Represents a 2D coordinate. `y` grows towards North.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring position one cell along `direction`.
    ///
    /// Returns `None` when the step would leave the low edge of the grid.
    /// The high edge is checked by the caller, which knows the grid size.
    pub fn step(&self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    /// Left, right, up and down neighbours that don't underflow.
    pub fn neighbors(&self) -> impl Iterator<Item = Position> {
        let origin = *self;
        [Direction::West, Direction::East, Direction::North, Direction::South]
            .into_iter()
            .filter_map(move |direction| origin.step(direction))
    }
}

/// The facing of the hunter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Rotates 90° counter-clockwise: East → North → West → South → East.
    pub fn turn_left(self) -> Direction {
        match self {
            Direction::East => Direction::North,
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
        }
    }

    /// Rotates 90° clockwise, the inverse of [`Direction::turn_left`].
    pub fn turn_right(self) -> Direction {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    /// Unit offset `(dx, dy)` of one step in this direction.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// Whether `target` lies strictly ahead of `from` on this direction's axis.
    pub fn is_ahead(self, from: Position, target: Position) -> bool {
        match self {
            Direction::North => target.x == from.x && target.y > from.y,
            Direction::East => target.y == from.y && target.x > from.x,
            Direction::South => target.x == from.x && target.y < from.y,
            Direction::West => target.y == from.y && target.x < from.x,
        }
    }
}

/// Primitive actions the hunter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Move,
    TurnRight,
    TurnLeft,
    Shoot,
    Grab,
    Climb,
}

impl Action {
    /// The full action set, in the order the hunter exposes it.
    pub const ALL: [Action; 6] = [
        Action::Move,
        Action::TurnRight,
        Action::TurnLeft,
        Action::Shoot,
        Action::Grab,
        Action::Climb,
    ];

    /// Actions the planner may use while searching for the gold.
    /// `Grab` and `Climb` only appear in the synthesized return trip.
    pub fn is_expandable(self) -> bool {
        matches!(
            self,
            Action::Move | Action::TurnRight | Action::TurnLeft | Action::Shoot
        )
    }

    /// Swaps left and right turns; other actions are unchanged.
    pub fn mirrored(self) -> Action {
        match self {
            Action::TurnLeft => Action::TurnRight,
            Action::TurnRight => Action::TurnLeft,
            other => other,
        }
    }
}
