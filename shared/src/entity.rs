//! Grid entities: snakes, food and walls.
//!
//! Every entity is an ordered run of [`Block`]s (head first, tail last) with an
//! alive flag and free-form JSON metadata. Per-kind behaviour lives in
//! [`Shape`] so the engine can dispatch on an explicit tag instead of a type
//! hierarchy.

use std::collections::VecDeque;

/// Arbitrary key/value data attached to an entity (e.g. a snake's name).
pub type Metadata = serde_json::Value;

/// One grid cell.
///
/// Coordinates are signed so a bounded engine can look at a head that would
/// leave the grid before it kills the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub x: i32,
    pub y: i32,
}

impl Block {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Moves by `(dx, dy)` without any wrapping or clamping.
    pub fn offset(self, (dx, dy): (i32, i32)) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Reduces both coordinates into `0..width` and `0..height`.
    pub fn wrapped(self, width: i32, height: i32) -> Self {
        Self::new(self.x.rem_euclid(width), self.y.rem_euclid(height))
    }
}

impl From<(i32, i32)> for Block {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Heading of a snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
    /// Jumps three cells upward in a single move.
    Boost,
}

impl Direction {
    /// Per-move displacement. `y` grows downward.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Right => (1, 0),
            Direction::Boost => (0, -3),
        }
    }

    /// True when `self` points straight back along `other`.
    pub fn reverses(self, other: Direction) -> bool {
        let (ax, ay) = self.offset();
        let (bx, by) = other.offset();
        ax * by - ay * bx == 0 && ax * bx + ay * by < 0
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Direction::Up),
            0x02 => Some(Direction::Left),
            0x03 => Some(Direction::Down),
            0x04 => Some(Direction::Right),
            0x05 => Some(Direction::Boost),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Up => 0x01,
            Direction::Left => 0x02,
            Direction::Down => 0x03,
            Direction::Right => 0x04,
            Direction::Boost => 0x05,
        }
    }
}

/// Entity category. Everything except [`EntityKind::Snake`] is a "kind" in
/// the wire protocol and is sent as its own list, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Snake,
    Food,
    Wall,
}

impl EntityKind {
    /// Non-snake kinds in wire order.
    pub const OTHERS: [EntityKind; 2] = [EntityKind::Food, EntityKind::Wall];
}

/// Movement state carried only by snakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnakeState {
    /// Direction requested for the next move.
    pub facing: Direction,
    /// Direction of the last committed move.
    pub heading: Direction,
    /// Set when the snake has just eaten; consumed by the next move.
    pub pending_growth: bool,
    /// Grid size for wrapping engines, `None` when the grid is bounded.
    pub wrap: Option<(i32, i32)>,
}

/// Kind tag plus per-kind state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Snake(SnakeState),
    Food,
    Wall,
}

/// Blocks gained and lost by an entity over some window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockDelta {
    pub added: Vec<Block>,
    pub removed: Vec<Block>,
}

impl BlockDelta {
    pub fn new(added: Vec<Block>, removed: Vec<Block>) -> Self {
        Self { added, removed }
    }

    /// A delta that introduces every block of `entity`.
    pub fn whole(entity: &Entity) -> Self {
        Self::new(entity.blocks.iter().copied().collect(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Appends a later delta to this one.
    ///
    /// A block removed while still pending as added (or added while pending as
    /// removed) cancels one occurrence instead of being appended. Everything
    /// else is concatenated, so duplicates survive.
    pub fn merge(&mut self, added: &[Block], removed: &[Block]) {
        for block in removed {
            match self.added.iter().position(|b| b == block) {
                Some(i) => {
                    self.added.remove(i);
                }
                None => self.removed.push(*block),
            }
        }
        for block in added {
            match self.removed.iter().position(|b| b == block) {
                Some(i) => {
                    self.removed.remove(i);
                }
                None => self.added.push(*block),
            }
        }
    }
}

/// A snake, food item or wall.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub alive: bool,
    /// Head first, tail last. Never empty while alive.
    pub blocks: VecDeque<Block>,
    pub metadata: Metadata,
    pub shape: Shape,
}

impl Entity {
    /// Length of a freshly spawned snake.
    pub const SNAKE_LENGTH: i32 = 3;

    /// A vertical snake facing up with its head at `head`.
    pub fn snake(head: Block, name: &str, wrap: Option<(i32, i32)>) -> Self {
        let blocks = (0..Self::SNAKE_LENGTH)
            .map(|dy| Block::new(head.x, head.y + dy))
            .collect();
        Self {
            alive: true,
            blocks,
            metadata: serde_json::json!({ "name": name }),
            shape: Shape::Snake(SnakeState {
                facing: Direction::Up,
                heading: Direction::Up,
                pending_growth: false,
                wrap,
            }),
        }
    }

    pub fn food(at: Block) -> Self {
        Self {
            alive: true,
            blocks: VecDeque::from([at]),
            metadata: empty_metadata(),
            shape: Shape::Food,
        }
    }

    pub fn wall(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            alive: true,
            blocks: blocks.into_iter().collect(),
            metadata: empty_metadata(),
            shape: Shape::Wall,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self.shape {
            Shape::Snake(_) => EntityKind::Snake,
            Shape::Food => EntityKind::Food,
            Shape::Wall => EntityKind::Wall,
        }
    }

    pub fn snake_state(&self) -> Option<&SnakeState> {
        match &self.shape {
            Shape::Snake(state) => Some(state),
            _ => None,
        }
    }

    pub fn snake_state_mut(&mut self) -> Option<&mut SnakeState> {
        match &mut self.shape {
            Shape::Snake(state) => Some(state),
            _ => None,
        }
    }

    /// Snake name from the metadata, if any.
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(|n| n.as_str())
    }

    pub fn head(&self) -> Option<Block> {
        self.blocks.front().copied()
    }

    pub fn tail(&self) -> Option<Block> {
        self.blocks.back().copied()
    }

    /// Everything between head and tail.
    pub fn body(&self) -> impl Iterator<Item = &Block> {
        let len = self.blocks.len();
        self.blocks.iter().skip(1).take(len.saturating_sub(2))
    }

    /// Where the head lands after the next move, without moving.
    ///
    /// Static entities stay put. Bounded snakes are not clamped; the engine
    /// decides whether the result is on the grid.
    pub fn future_head(&self) -> Option<Block> {
        let head = self.head()?;
        match &self.shape {
            Shape::Snake(state) => {
                let next = head.offset(state.facing.offset());
                Some(match state.wrap {
                    Some((width, height)) => next.wrapped(width, height),
                    None => next,
                })
            }
            Shape::Food | Shape::Wall => Some(head),
        }
    }

    /// Cells another head may not enter this tick.
    ///
    /// For snakes this is head plus body: the tail is vacated by the move.
    /// Static entities block with every cell.
    pub fn obstacle_blocks(&self) -> impl Iterator<Item = &Block> {
        let len = self.blocks.len();
        let take = match self.shape {
            Shape::Snake(_) if len > 1 => len - 1,
            _ => len,
        };
        self.blocks.iter().take(take)
    }

    /// Would this entity's next head land on `other`?
    ///
    /// `other` must be a different entity; its own next head counts as an
    /// obstacle so two snakes entering the same cell hit each other.
    pub fn occupies(&self, other: &Entity) -> bool {
        let Some(next) = self.future_head() else {
            return false;
        };
        other.future_head() == Some(next) || other.obstacle_blocks().any(|b| *b == next)
    }

    /// Would the next head land on this entity's own head or body?
    pub fn occupies_self(&self) -> bool {
        let Some(next) = self.future_head() else {
            return false;
        };
        self.obstacle_blocks().any(|b| *b == next)
    }

    /// Commits the pending move and returns the blocks gained and lost.
    ///
    /// Growing snakes keep their tail. Static entities never change.
    pub fn advance(&mut self) -> BlockDelta {
        let Some(next) = self.future_head() else {
            return BlockDelta::default();
        };
        let Shape::Snake(state) = &mut self.shape else {
            return BlockDelta::default();
        };
        let grow = std::mem::take(&mut state.pending_growth);
        state.heading = state.facing;

        self.blocks.push_front(next);
        let removed = if grow {
            Vec::new()
        } else {
            self.blocks.pop_back().into_iter().collect()
        };
        BlockDelta::new(vec![next], removed)
    }

    /// Marks the entity dead. Idempotent.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// Whether `direction` is a legal turn for this snake: not a reversal of
    /// the requested or the last travelled direction.
    pub fn can_turn(&self, direction: Direction) -> bool {
        match self.snake_state() {
            Some(state) => !direction.reverses(state.facing) && !direction.reverses(state.heading),
            None => false,
        }
    }
}

/// `{}`, the metadata of food and walls.
pub fn empty_metadata() -> Metadata {
    Metadata::Object(serde_json::Map::new())
}
