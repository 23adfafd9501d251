//! Tick-based snake simulation.
//!
//! The engine owns every live entity and advances the world one discrete step
//! at a time. Each step resolves deaths, then feeding, then movement, then
//! food spawning, and reports exactly which blocks each entity gained or lost
//! so per-player trackers can be brought up to date.
//!
//! Iteration order is always creation order, so a seeded engine is fully
//! reproducible.

use crate::config::EngineSettings;
use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::entity::{Block, BlockDelta, Direction, Entity, EntityKind};
use shared::{EngineInfo, GridMode};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Rows kept clear of food at the bottom of the grid, and clear of snake
/// heads at both top and bottom.
pub const SPAWN_MARGIN: i32 = 3;

/// Stable handle for an entity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

pub type EntityDeltas = Vec<(EntityId, BlockDelta)>;

/// Everything that changed during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Moves and deaths of snakes, in snake order.
    pub snakes: EntityDeltas,
    /// Snakes registered since the previous tick, with all of their blocks.
    pub new_snakes: EntityDeltas,
    /// Changes to existing non-snake entities, per kind.
    pub kinds: BTreeMap<EntityKind, EntityDeltas>,
    /// Non-snake entities created this tick, with all of their blocks.
    pub new_of_kinds: BTreeMap<EntityKind, EntityDeltas>,
    /// Final state of every entity removed this tick.
    pub retired: HashMap<EntityId, Arc<Entity>>,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        let mut report = Self {
            tick,
            ..Default::default()
        };
        for kind in EntityKind::OTHERS {
            report.kinds.insert(kind, Vec::new());
            report.new_of_kinds.insert(kind, Vec::new());
        }
        report
    }

    fn kind_mut(&mut self, kind: EntityKind) -> &mut EntityDeltas {
        self.kinds.entry(kind).or_default()
    }
}

pub struct Engine {
    width: u16,
    height: u16,
    mode: GridMode,
    target_food: usize,
    tick: u64,
    next_id: u64,
    entities: HashMap<EntityId, Entity>,
    snakes: Vec<EntityId>,
    kinds: BTreeMap<EntityKind, Vec<EntityId>>,
    /// Snakes created since the last tick; reported as new by the next one.
    pending_snakes: Vec<EntityId>,
    rng: StdRng,
}

impl Engine {
    pub fn new(settings: &EngineSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut engine = Self {
            width: settings.width,
            height: settings.height,
            mode: settings.mode,
            target_food: settings.target_food,
            tick: 0,
            next_id: 0,
            entities: HashMap::new(),
            snakes: Vec::new(),
            kinds: EntityKind::OTHERS
                .iter()
                .map(|kind| (*kind, Vec::new()))
                .collect(),
            pending_snakes: Vec::new(),
            rng,
        };

        for wall in &settings.walls {
            if engine.add_wall(wall.blocks()).is_none() {
                warn!("Ignoring wall {:?}: off the grid or overlapping", wall);
            }
        }
        engine
    }

    pub fn width(&self) -> i32 {
        i32::from(self.width)
    }

    pub fn height(&self) -> i32 {
        i32::from(self.height)
    }

    pub fn mode(&self) -> GridMode {
        self.mode
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            mode: self.mode.code(),
            width: self.width,
            height: self.height,
        }
    }

    /// Whether `block` lies on the grid.
    pub fn contains(&self, block: Block) -> bool {
        (0..self.width()).contains(&block.x) && (0..self.height()).contains(&block.y)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).map_or(false, |e| e.alive)
    }

    pub fn snake_ids(&self) -> &[EntityId] {
        &self.snakes
    }

    pub fn snakes(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.members_of(&self.snakes)
    }

    /// Snakes spawned since the last tick; the next report announces them.
    pub fn pending_snake_ids(&self) -> &[EntityId] {
        &self.pending_snakes
    }

    pub fn kind_ids(&self, kind: EntityKind) -> &[EntityId] {
        self.kinds.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Non-snake kinds with their members, in wire order.
    pub fn kinds(&self) -> impl Iterator<Item = (EntityKind, &[EntityId])> {
        self.kinds.iter().map(|(kind, ids)| (*kind, ids.as_slice()))
    }

    pub fn members(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.members_of(self.kind_ids(kind))
    }

    fn members_of<'a>(
        &'a self,
        ids: &'a [EntityId],
    ) -> impl Iterator<Item = (EntityId, &'a Entity)> + 'a {
        ids.iter()
            .filter_map(move |id| self.entities.get(id).map(|e| (*id, e)))
    }

    pub fn food_count(&self) -> usize {
        self.kind_ids(EntityKind::Food).len()
    }

    /// Every block of every live entity: snakes first, then each kind.
    pub fn all_blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        for (_, snake) in self.snakes() {
            blocks.extend(snake.blocks.iter().copied());
        }
        for (_, ids) in self.kinds() {
            for (_, entity) in self.members_of(ids) {
                blocks.extend(entity.blocks.iter().copied());
            }
        }
        blocks
    }

    fn occupied(&self) -> HashSet<Block> {
        self.entities
            .values()
            .flat_map(|e| e.blocks.iter().copied())
            .collect()
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        match entity.kind() {
            EntityKind::Snake => self.snakes.push(id),
            kind => self.kinds.entry(kind).or_default().push(id),
        }
        self.entities.insert(id, entity);
        id
    }

    /// Removes an entity for good and returns its final, dead state.
    fn retire(&mut self, id: EntityId) -> Option<Arc<Entity>> {
        self.snakes.retain(|s| *s != id);
        self.pending_snakes.retain(|s| *s != id);
        for members in self.kinds.values_mut() {
            members.retain(|m| *m != id);
        }
        let mut entity = self.entities.remove(&id)?;
        entity.kill();
        Some(Arc::new(entity))
    }

    fn wrap(&self) -> Option<(i32, i32)> {
        match self.mode {
            GridMode::Wrapping => Some((self.width(), self.height())),
            GridMode::Bounded => None,
        }
    }

    fn snake_cells(head: Block) -> impl Iterator<Item = Block> {
        (0..Entity::SNAKE_LENGTH).map(move |dy| Block::new(head.x, head.y + dy))
    }

    /// Places a new snake at a random free spot away from the top and bottom
    /// edges. Returns `None` when no spot is free.
    pub fn spawn_snake(&mut self, name: &str) -> Option<EntityId> {
        let occupied = self.occupied();
        let mut candidates = Vec::new();
        for y in SPAWN_MARGIN..self.height() - SPAWN_MARGIN {
            for x in 0..self.width() {
                let head = Block::new(x, y);
                if Self::snake_cells(head).all(|b| !occupied.contains(&b)) {
                    candidates.push(head);
                }
            }
        }
        let head = *candidates.choose(&mut self.rng)?;
        self.place_snake(head, name)
    }

    /// Places a new snake with its head at `head`, facing up.
    pub fn place_snake(&mut self, head: Block, name: &str) -> Option<EntityId> {
        let occupied = self.occupied();
        if !Self::snake_cells(head).all(|b| self.contains(b) && !occupied.contains(&b)) {
            return None;
        }
        let id = self.insert(Entity::snake(head, name, self.wrap()));
        self.pending_snakes.push(id);
        debug!("Spawned snake {:?} '{}' at {:?}", id, name, head);
        Some(id)
    }

    /// Places one food item on a random free cell above the bottom margin.
    pub fn spawn_food(&mut self) -> Option<EntityId> {
        let occupied = self.occupied();
        let mut candidates = Vec::new();
        for y in 0..self.height() - SPAWN_MARGIN {
            for x in 0..self.width() {
                let cell = Block::new(x, y);
                if !occupied.contains(&cell) {
                    candidates.push(cell);
                }
            }
        }
        let cell = *candidates.choose(&mut self.rng)?;
        self.place_food(cell)
    }

    pub fn place_food(&mut self, at: Block) -> Option<EntityId> {
        if !self.contains(at) || self.occupied().contains(&at) {
            return None;
        }
        Some(self.insert(Entity::food(at)))
    }

    /// Adds a static obstacle. Every block must be on the grid and free.
    pub fn add_wall(&mut self, blocks: Vec<Block>) -> Option<EntityId> {
        let occupied = self.occupied();
        if blocks.is_empty()
            || blocks
                .iter()
                .any(|b| !self.contains(*b) || occupied.contains(b))
        {
            return None;
        }
        Some(self.insert(Entity::wall(blocks)))
    }

    /// Marks an entity dead; the next tick removes it.
    pub fn kill(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.kill();
                true
            }
            None => false,
        }
    }

    /// Sets the direction of a live snake unless it would turn straight back.
    pub fn steer(&mut self, id: EntityId, direction: Direction) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.alive || !entity.can_turn(direction) {
            return false;
        }
        match entity.snake_state_mut() {
            Some(state) => {
                state.facing = direction;
                true
            }
            None => false,
        }
    }

    fn must_die(&self, id: EntityId) -> bool {
        let Some(snake) = self.entities.get(&id) else {
            return true;
        };
        if !snake.alive {
            return true;
        }
        let Some(next) = snake.future_head() else {
            error!("Live snake {:?} has no blocks, killing it", id);
            return true;
        };
        if self.mode == GridMode::Bounded && !self.contains(next) {
            return true;
        }
        if snake.occupies_self() {
            return true;
        }
        let hits_snake = self
            .snakes()
            .filter(|(other, _)| *other != id)
            .any(|(_, other)| snake.occupies(other));
        let hits_wall = self
            .members(EntityKind::Wall)
            .any(|(_, wall)| snake.occupies(wall));
        hits_snake || hits_wall
    }

    /// Advances the world by one step.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::new(self.tick);

        // Deaths are decided against the layout at the start of the tick.
        let doomed: Vec<EntityId> = self
            .snakes
            .iter()
            .copied()
            .filter(|id| self.must_die(*id))
            .collect();
        for id in doomed {
            if let Some(snake) = self.retire(id) {
                debug!("Snake {:?} died on tick {}", id, self.tick);
                let removed = snake.blocks.iter().copied().collect();
                report.snakes.push((id, BlockDelta::new(Vec::new(), removed)));
                report.retired.insert(id, snake);
            }
        }

        let foods = self.kind_ids(EntityKind::Food).to_vec();
        for food_id in foods {
            let Some(food) = self.entities.get(&food_id) else {
                continue;
            };
            let eater = self
                .snakes()
                .find(|(_, snake)| snake.occupies(food))
                .map(|(id, _)| id);
            let Some(eater) = eater else {
                continue;
            };
            if let Some(state) = self
                .entities
                .get_mut(&eater)
                .and_then(Entity::snake_state_mut)
            {
                state.pending_growth = true;
            }
            if let Some(food) = self.retire(food_id) {
                debug!("Snake {:?} ate food {:?}", eater, food_id);
                let removed = food.blocks.iter().copied().collect();
                report
                    .kind_mut(EntityKind::Food)
                    .push((food_id, BlockDelta::new(Vec::new(), removed)));
                report.retired.insert(food_id, food);
            }
        }

        for id in &self.snakes {
            if let Some(snake) = self.entities.get_mut(id) {
                report.snakes.push((*id, snake.advance()));
            }
        }

        if self.food_count() < self.target_food {
            if let Some(id) = self.spawn_food() {
                if let Some(food) = self.entities.get(&id) {
                    let delta = BlockDelta::whole(food);
                    report
                        .new_of_kinds
                        .entry(EntityKind::Food)
                        .or_default()
                        .push((id, delta));
                }
            }
        }

        for id in std::mem::take(&mut self.pending_snakes) {
            if let Some(snake) = self.entities.get(&id) {
                report.new_snakes.push((id, BlockDelta::whole(snake)));
            }
        }

        report
    }
}
