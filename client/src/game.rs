use log::debug;
use shared::{Block, Direction, EngineInfo, EntityRecord, GridMode, StateMessage};
use std::collections::HashMap;

/// What sits on a cell, as far as this client knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupant {
    Own,
    Snake,
    Food,
    Wall,
    /// A kind list this client does not know about.
    Other,
}

impl Occupant {
    fn for_kind(index: usize) -> Self {
        match index {
            0 => Occupant::Food,
            1 => Occupant::Wall,
            _ => Occupant::Other,
        }
    }

    pub fn is_obstacle(self) -> bool {
        !matches!(self, Occupant::Food)
    }
}

/// Local picture of the grid, rebuilt from full states and patched by
/// updated states.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub info: EngineInfo,
    pub alive: bool,
    pub name: Option<String>,
    /// Newest known head of this player's snake
    pub head: Option<Block>,
    /// Direction of the last move this client asked for
    pub heading: Direction,
    /// Occupants per cell; a cell may hold several during a tick
    cells: HashMap<Block, Vec<Occupant>>,
}

impl ClientGameState {
    pub fn new(info: EngineInfo) -> Self {
        Self {
            info,
            alive: true,
            name: None,
            head: None,
            heading: Direction::Up,
            cells: HashMap::new(),
        }
    }

    fn records(message: &StateMessage) -> impl Iterator<Item = (Occupant, &EntityRecord)> {
        let own = std::iter::once((Occupant::Own, &message.player));
        let snakes = message.snakes.iter().map(|r| (Occupant::Snake, r));
        let kinds = message
            .kinds
            .iter()
            .enumerate()
            .flat_map(|(i, list)| list.iter().map(move |r| (Occupant::for_kind(i), r)));
        own.chain(snakes).chain(kinds)
    }

    fn add(&mut self, block: Block, occupant: Occupant) {
        self.cells.entry(block).or_default().push(occupant);
    }

    fn remove(&mut self, block: Block, occupant: Occupant) {
        if let Some(occupants) = self.cells.get_mut(&block) {
            if let Some(i) = occupants.iter().position(|o| *o == occupant) {
                occupants.swap_remove(i);
            }
            if occupants.is_empty() {
                self.cells.remove(&block);
            }
        }
    }

    fn read_header(&mut self, player: &EntityRecord) {
        self.alive = player.alive;
        if let Some(name) = player.name() {
            self.name = Some(name.to_string());
        }
    }

    /// Replaces the local picture with a full state.
    pub fn apply_full(&mut self, message: &StateMessage) {
        self.cells.clear();
        self.read_header(&message.player);
        self.head = message.player.added.first().copied();
        for (occupant, record) in Self::records(message) {
            for block in &record.added {
                self.add(*block, occupant);
            }
        }
    }

    /// Applies an updated state: every removal first, then every addition.
    pub fn apply_update(&mut self, message: &StateMessage) {
        self.read_header(&message.player);
        for (occupant, record) in Self::records(message) {
            for block in &record.removed {
                self.remove(*block, occupant);
            }
        }
        for (occupant, record) in Self::records(message) {
            for block in &record.added {
                self.add(*block, occupant);
            }
        }
        if let Some(head) = message.player.added.last() {
            self.head = Some(*head);
        }
    }

    pub fn occupants(&self, block: Block) -> &[Occupant] {
        self.cells.get(&block).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count(&self, occupant: Occupant) -> usize {
        self.cells
            .values()
            .flatten()
            .filter(|o| **o == occupant)
            .count()
    }

    fn wrapping(&self) -> bool {
        self.info.grid_mode() == Some(GridMode::Wrapping)
    }

    fn step(&self, from: Block, direction: Direction) -> Option<Block> {
        let (width, height) = (i32::from(self.info.width), i32::from(self.info.height));
        let next = from.offset(direction.offset());
        if self.wrapping() {
            return Some(next.wrapped(width, height));
        }
        ((0..width).contains(&next.x) && (0..height).contains(&next.y)).then_some(next)
    }

    fn distance(&self, a: Block, b: Block) -> i32 {
        let (dx, dy) = ((a.x - b.x).abs(), (a.y - b.y).abs());
        if self.wrapping() {
            let (width, height) = (i32::from(self.info.width), i32::from(self.info.height));
            dx.min(width - dx) + dy.min(height - dy)
        } else {
            dx + dy
        }
    }

    /// Greedy move towards the nearest food that does not reverse the snake
    /// or enter an occupied cell. `None` when no such move exists.
    pub fn choose_direction(&self) -> Option<Direction> {
        let head = self.head?;
        let food: Vec<Block> = self
            .cells
            .iter()
            .filter(|(_, occupants)| occupants.contains(&Occupant::Food))
            .map(|(block, _)| *block)
            .collect();

        let mut best: Option<(i32, Direction)> = None;
        for direction in [Direction::Up, Direction::Left, Direction::Down, Direction::Right] {
            if direction.reverses(self.heading) {
                continue;
            }
            let Some(next) = self.step(head, direction) else {
                continue;
            };
            if self.occupants(next).iter().any(|o| o.is_obstacle()) {
                continue;
            }
            let score = food
                .iter()
                .map(|f| self.distance(next, *f))
                .min()
                .unwrap_or(0);
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, direction));
            }
        }
        debug!("Autopilot from {:?}: {:?}", head, best);
        best.map(|(_, direction)| direction)
    }
}
