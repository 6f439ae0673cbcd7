use std::{collections::HashSet, fmt};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::Position;

/// The 7×7 world used as the default scenario.
pub const SIMPLE_WORLD_JSON: &str = r#"
{
    "id": "simple wumpus world",
    "size": [7, 7],
    "hunters": [[0, 0]],
    "pits": [[4, 0], [3, 1], [2, 2], [6, 2], [4, 4], [3, 5], [4, 6], [5, 6]],
    "wumpuses": [[1, 2]],
    "exits": [[0, 0]],
    "golds": [[6, 3]],
    "blocks": []
}
"#;

/// Probability that a free cell of a classic world holds a pit.
const CLASSIC_PIT_PROBABILITY: f64 = 0.2;

/// The kinds of objects a world description lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Hunter,
    Pit,
    Wumpus,
    Gold,
    Exit,
    Block,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Hunter => "hunter",
            EntityKind::Pit => "pit",
            EntityKind::Wumpus => "wumpus",
            EntityKind::Gold => "gold",
            EntityKind::Exit => "exit",
            EntityKind::Block => "block",
        };
        f.write_str(name)
    }
}

/// Errors raised while turning a description into a [`WorldInfo`].
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Invalid world description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("World size ({width}, {height}) has no cells")]
    EmptyGrid { width: usize, height: usize },
    #[error("The {kind} at ({x}, {y}) is out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        kind: EntityKind,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("World has no {0}")]
    Missing(EntityKind),
    #[error("World has {count} entries of kind {kind}, at most one is supported")]
    TooMany { kind: EntityKind, count: usize },
    #[error("Classic worlds need a size of at least 2, got {0}")]
    TooSmall(usize),
}

/// The textual form of a world: a JSON object with a size and coordinate lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub size: [usize; 2],
    #[serde(default)]
    pub hunters: Vec<[usize; 2]>,
    #[serde(default)]
    pub pits: Vec<[usize; 2]>,
    #[serde(default)]
    pub wumpuses: Vec<[usize; 2]>,
    #[serde(default)]
    pub exits: Vec<[usize; 2]>,
    #[serde(default)]
    pub golds: Vec<[usize; 2]>,
    #[serde(default)]
    pub blocks: Vec<[usize; 2]>,
}

impl WorldDescription {
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, WorldError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates the description and builds the planner's snapshot.
    pub fn into_world(self) -> Result<WorldInfo, WorldError> {
        WorldInfo::from_description(&self)
    }
}

/// Immutable snapshot of a fully observed world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldInfo {
    id: Option<String>,
    width: usize,
    height: usize,
    hunter: Position,
    gold: Position,
    wumpus: Option<Position>,
    pits: HashSet<Position>,
    exits: HashSet<Position>,
    blocks: HashSet<Position>,
}

impl WorldInfo {
    /// Parses and validates a JSON world description.
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        WorldDescription::from_json(json)?.into_world()
    }

    /// Builds a world, failing fast on anything the planner can't handle:
    /// an empty grid, out of range coordinates, a missing or repeated hunter
    /// or gold, or more than one wumpus.
    pub fn from_description(description: &WorldDescription) -> Result<Self, WorldError> {
        let [width, height] = description.size;
        if width == 0 || height == 0 {
            return Err(WorldError::EmptyGrid { width, height });
        }

        let collect = |kind, coords: &Vec<[usize; 2]>| positions(kind, coords, width, height);

        let hunter = exactly_one(
            EntityKind::Hunter,
            collect(EntityKind::Hunter, &description.hunters)?,
        )?;
        let gold = exactly_one(
            EntityKind::Gold,
            collect(EntityKind::Gold, &description.golds)?,
        )?;
        let wumpus = at_most_one(
            EntityKind::Wumpus,
            collect(EntityKind::Wumpus, &description.wumpuses)?,
        )?;

        Ok(WorldInfo {
            id: description.id.clone(),
            width,
            height,
            hunter,
            gold,
            wumpus,
            pits: collect(EntityKind::Pit, &description.pits)?.into_iter().collect(),
            exits: collect(EntityKind::Exit, &description.exits)?.into_iter().collect(),
            blocks: collect(EntityKind::Block, &description.blocks)?.into_iter().collect(),
        })
    }

    /// Generates a square classic world.
    ///
    /// The hunter starts on the exit at (0, 0). Gold and wumpus sit on distinct
    /// random cells away from the start, and every other free cell holds a pit
    /// with probability 0.2.
    pub fn classic(size: usize, seed: u64) -> Result<Self, WorldError> {
        if size < 2 {
            return Err(WorldError::TooSmall(size));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let start = Position::new(0, 0);

        let mut free: Vec<Position> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Position { x, y }))
            .filter(|p| *p != start)
            .collect();

        let gold = free.swap_remove(rng.random_range(0..free.len()));
        let wumpus = free.swap_remove(rng.random_range(0..free.len()));
        let pits = free
            .into_iter()
            .filter(|_| rng.random_bool(CLASSIC_PIT_PROBABILITY))
            .collect();

        Ok(WorldInfo {
            id: Some(format!("classic {size}x{size} (seed {seed})")),
            width: size,
            height: size,
            hunter: start,
            gold,
            wumpus: Some(wumpus),
            pits,
            exits: HashSet::from([start]),
            blocks: HashSet::new(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Start position of the hunter.
    pub fn hunter(&self) -> Position {
        self.hunter
    }

    pub fn gold(&self) -> Position {
        self.gold
    }

    pub fn wumpus(&self) -> Option<Position> {
        self.wumpus
    }

    pub fn pits(&self) -> &HashSet<Position> {
        &self.pits
    }

    pub fn exits(&self) -> &HashSet<Position> {
        &self.exits
    }

    pub fn blocks(&self) -> &HashSet<Position> {
        &self.blocks
    }

    /// Cells run `0..width` × `0..height`.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    pub fn is_pit(&self, position: Position) -> bool {
        self.pits.contains(&position)
    }

    pub fn is_block(&self, position: Position) -> bool {
        self.blocks.contains(&position)
    }

    pub fn is_wumpus(&self, position: Position) -> bool {
        self.wumpus == Some(position)
    }

    pub fn is_exit(&self, position: Position) -> bool {
        self.exits.contains(&position)
    }
}

impl From<&WorldInfo> for WorldDescription {
    fn from(world: &WorldInfo) -> Self {
        let sorted = |set: &HashSet<Position>| {
            let mut coords: Vec<[usize; 2]> = set.iter().map(|p| [p.x, p.y]).collect();
            coords.sort_unstable();
            coords
        };
        WorldDescription {
            id: world.id.clone(),
            size: [world.width, world.height],
            hunters: vec![[world.hunter.x, world.hunter.y]],
            pits: sorted(&world.pits),
            wumpuses: world.wumpus.iter().map(|p| [p.x, p.y]).collect(),
            exits: sorted(&world.exits),
            golds: vec![[world.gold.x, world.gold.y]],
            blocks: sorted(&world.blocks),
        }
    }
}

/// Converts raw coordinates, rejecting any that fall outside the grid.
fn positions(
    kind: EntityKind,
    coords: &[[usize; 2]],
    width: usize,
    height: usize,
) -> Result<Vec<Position>, WorldError> {
    coords
        .iter()
        .map(|&[x, y]| {
            if x < width && y < height {
                Ok(Position { x, y })
            } else {
                Err(WorldError::OutOfBounds {
                    kind,
                    x,
                    y,
                    width,
                    height,
                })
            }
        })
        .collect()
}

fn exactly_one(kind: EntityKind, positions: Vec<Position>) -> Result<Position, WorldError> {
    at_most_one(kind, positions)?.ok_or(WorldError::Missing(kind))
}

fn at_most_one(kind: EntityKind, positions: Vec<Position>) -> Result<Option<Position>, WorldError> {
    match positions.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(WorldError::TooMany {
            kind,
            count: many.len(),
        }),
    }
}
