//! Per-player accumulation of block changes between state reads.
//!
//! Every registered player owns one [`DeltaTracker`]. The tick loop merges each
//! [`TickReport`] into every tracker; a state read serializes the tracker and
//! then resets it to a fresh baseline of zero-length deltas for every live
//! entity the player has seen.
//!
//! A snake spawned since the last tick is only part of a baseline when the
//! player already holds its body: their own snake, or any snake after a full
//! read. Otherwise the next tick announces it whole.

use crate::engine::{Engine, EntityDeltas, EntityId, TickReport};
use shared::entity::{Block, BlockDelta, Entity, EntityKind};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Accumulated change for one entity, plus its final state once the engine
/// has removed it.
#[derive(Debug, Clone, Default)]
pub struct TrackedEntity {
    pub delta: BlockDelta,
    pub retired: Option<Arc<Entity>>,
}

impl From<BlockDelta> for TrackedEntity {
    fn from(delta: BlockDelta) -> Self {
        Self {
            delta,
            retired: None,
        }
    }
}

pub type TrackedMap = BTreeMap<EntityId, TrackedEntity>;

/// What a state read handed to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRead {
    /// Every live entity in full (0x03, 0xFE).
    Full,
    /// Only the accumulated changes (0x04, 0xFF).
    Delta,
}

#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    snakes: TrackedMap,
    kinds: BTreeMap<EntityKind, TrackedMap>,
}

impl DeltaTracker {
    /// Zero-length deltas for every entity currently in `engine`.
    pub fn baseline(engine: &Engine) -> Self {
        Self::baseline_where(engine, |_| true)
    }

    /// Baseline for a newly registered player, who holds nothing but the
    /// snake just spawned for them.
    pub fn for_player(engine: &Engine, own: EntityId) -> Self {
        let pending = engine.pending_snake_ids();
        Self::baseline_where(engine, |id| id == own || !pending.contains(&id))
    }

    fn baseline_where<F>(engine: &Engine, keep_snake: F) -> Self
    where
        F: Fn(EntityId) -> bool,
    {
        let snakes = engine
            .snake_ids()
            .iter()
            .filter(|id| keep_snake(**id))
            .map(|id| (*id, TrackedEntity::default()))
            .collect();
        let kinds = engine
            .kinds()
            .map(|(kind, ids)| {
                let tracked = ids
                    .iter()
                    .map(|id| (*id, TrackedEntity::default()))
                    .collect();
                (kind, tracked)
            })
            .collect();
        Self { snakes, kinds }
    }

    /// Starts a new sync window after `read` was sent to the owner of `own`.
    pub fn reset(&mut self, engine: &Engine, own: EntityId, read: StateRead) {
        let next = match read {
            StateRead::Full => Self::baseline(engine),
            StateRead::Delta => {
                let pending = engine.pending_snake_ids();
                let known = &self.snakes;
                Self::baseline_where(engine, |id| {
                    id == own || !pending.contains(&id) || known.contains_key(&id)
                })
            }
        };
        *self = next;
    }

    pub fn snakes(&self) -> &TrackedMap {
        &self.snakes
    }

    pub fn snake(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.snakes.get(&id)
    }

    pub fn kinds(&self) -> &BTreeMap<EntityKind, TrackedMap> {
        &self.kinds
    }

    /// Folds one tick into the window.
    ///
    /// New entities are seeded with all of their blocks unless already
    /// tracked. Changes to entities this tracker never learned about are
    /// dropped.
    pub fn merge_tick(&mut self, report: &TickReport) {
        let mut fresh = HashSet::new();
        seed(&mut self.snakes, &report.new_snakes, &mut fresh);
        for (kind, created) in &report.new_of_kinds {
            seed(self.kinds.entry(*kind).or_default(), created, &mut fresh);
        }

        merge(&mut self.snakes, &report.snakes, &fresh);
        for (kind, deltas) in &report.kinds {
            merge(self.kinds.entry(*kind).or_default(), deltas, &fresh);
        }

        for (id, entity) in &report.retired {
            let tracked = match entity.kind() {
                EntityKind::Snake => self.snakes.get_mut(id),
                kind => self.kinds.get_mut(&kind).and_then(|m| m.get_mut(id)),
            };
            if let Some(tracked) = tracked {
                tracked.retired = Some(Arc::clone(entity));
            }
        }
    }

    /// Every accumulated block, snakes first and then each kind in order.
    pub fn accumulated_blocks(&self) -> (Vec<Block>, Vec<Block>) {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let kinds = self.kinds.values().flat_map(|m| m.values());
        for tracked in self.snakes.values().chain(kinds) {
            added.extend_from_slice(&tracked.delta.added);
            removed.extend_from_slice(&tracked.delta.removed);
        }
        (added, removed)
    }
}

fn seed(tracked: &mut TrackedMap, created: &EntityDeltas, fresh: &mut HashSet<EntityId>) {
    for (id, delta) in created {
        if let Entry::Vacant(slot) = tracked.entry(*id) {
            slot.insert(TrackedEntity::from(delta.clone()));
            fresh.insert(*id);
        }
    }
}

fn merge(tracked: &mut TrackedMap, deltas: &EntityDeltas, fresh: &HashSet<EntityId>) {
    for (id, delta) in deltas {
        if fresh.contains(id) {
            continue;
        }
        if let Some(entry) = tracked.get_mut(id) {
            entry.delta.merge(&delta.added, &delta.removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use shared::GridMode;

    fn engine() -> Engine {
        Engine::new(&EngineSettings {
            width: 10,
            height: 10,
            mode: GridMode::Bounded,
            target_food: 0,
            seed: Some(3),
            walls: Vec::new(),
        })
    }

    #[test]
    fn test_baseline_is_empty_for_every_entity() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 5), "a").unwrap();
        let food = engine.place_food(Block::new(1, 1)).unwrap();

        let tracker = DeltaTracker::baseline(&engine);
        assert!(tracker.snake(snake).unwrap().delta.is_empty());
        assert!(tracker.kinds()[&EntityKind::Food][&food].delta.is_empty());
        assert!(tracker.kinds()[&EntityKind::Wall].is_empty());
        assert_eq!(tracker.accumulated_blocks(), (Vec::new(), Vec::new()));
    }

    #[test]
    fn test_merges_across_ticks() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 5), "a").unwrap();
        let mut tracker = DeltaTracker::baseline(&engine);

        tracker.merge_tick(&engine.tick());
        tracker.merge_tick(&engine.tick());

        let delta = &tracker.snake(snake).unwrap().delta;
        assert_eq!(delta.added, vec![Block::new(5, 4), Block::new(5, 3)]);
        assert_eq!(delta.removed, vec![Block::new(5, 7), Block::new(5, 6)]);
    }

    #[test]
    fn test_add_then_remove_cancels() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 5), "a").unwrap();
        let mut tracker = DeltaTracker::baseline(&engine);

        // after four moves the first added head has become the tail and is dropped
        for _ in 0..4 {
            tracker.merge_tick(&engine.tick());
        }
        let delta = &tracker.snake(snake).unwrap().delta;
        assert_eq!(
            delta.added,
            vec![Block::new(5, 3), Block::new(5, 2), Block::new(5, 1)]
        );
        assert_eq!(
            delta.removed,
            vec![Block::new(5, 7), Block::new(5, 6), Block::new(5, 5)]
        );
    }

    #[test]
    fn test_new_entity_seeded_once() {
        let mut engine = engine();
        let mut tracker = DeltaTracker::baseline(&engine);
        let snake = engine.place_snake(Block::new(5, 5), "late").unwrap();

        tracker.merge_tick(&engine.tick());
        let delta = &tracker.snake(snake).unwrap().delta;
        assert_eq!(
            delta.added,
            vec![Block::new(5, 4), Block::new(5, 5), Block::new(5, 6)]
        );
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_already_tracked_new_entity_not_reseeded() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 5), "own").unwrap();
        let mut tracker = DeltaTracker::baseline(&engine);

        tracker.merge_tick(&engine.tick());
        let delta = &tracker.snake(snake).unwrap().delta;
        assert_eq!(delta.added, vec![Block::new(5, 4)]);
        assert_eq!(delta.removed, vec![Block::new(5, 7)]);
    }

    #[test]
    fn test_unknown_entities_ignored() {
        let mut engine = engine();
        let mut tracker = DeltaTracker::baseline(&engine);
        let snake = engine.place_snake(Block::new(5, 5), "ghost").unwrap();
        engine.kill(snake);

        // killed before its first tick: never announced, so never tracked
        let report = engine.tick();
        tracker.merge_tick(&report);
        assert!(tracker.snake(snake).is_none());
        assert!(tracker.snakes().is_empty());
    }

    #[test]
    fn test_death_keeps_final_snapshot() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 1), "doomed").unwrap();
        let mut tracker = DeltaTracker::baseline(&engine);

        tracker.merge_tick(&engine.tick());
        tracker.merge_tick(&engine.tick());

        let tracked = tracker.snake(snake).unwrap();
        let retired = tracked.retired.as_ref().unwrap();
        assert!(!retired.alive);
        assert_eq!(retired.name(), Some("doomed"));
        // head moved to (5, 0) then the whole snake was removed
        assert!(tracked.delta.added.is_empty());
        assert_eq!(
            tracked.delta.removed,
            vec![Block::new(5, 3), Block::new(5, 1), Block::new(5, 2)]
        );
    }

    #[test]
    fn test_reset_starts_new_window() {
        let mut engine = engine();
        let snake = engine.place_snake(Block::new(5, 5), "a").unwrap();
        let mut tracker = DeltaTracker::baseline(&engine);
        tracker.merge_tick(&engine.tick());
        assert!(!tracker.snake(snake).unwrap().delta.is_empty());

        tracker.reset(&engine, snake, StateRead::Delta);
        assert!(tracker.snake(snake).unwrap().delta.is_empty());
    }

    #[test]
    fn test_new_player_skips_unannounced_snakes() {
        let mut engine = engine();
        let other = engine.place_snake(Block::new(2, 5), "other").unwrap();
        let own = engine.place_snake(Block::new(7, 5), "own").unwrap();

        let mut tracker = DeltaTracker::for_player(&engine, own);
        assert!(tracker.snake(own).is_some());
        assert!(tracker.snake(other).is_none());

        tracker.merge_tick(&engine.tick());
        let delta = &tracker.snake(other).unwrap().delta;
        assert_eq!(
            delta.added,
            vec![Block::new(2, 4), Block::new(2, 5), Block::new(2, 6)]
        );
        assert_eq!(tracker.snake(own).unwrap().delta.added, vec![Block::new(7, 4)]);
    }

    #[test]
    fn test_delta_reset_before_first_tick_keeps_new_snake_whole() {
        let mut engine = engine();
        let own = engine.place_snake(Block::new(2, 5), "b").unwrap();
        let mut tracker = DeltaTracker::for_player(&engine, own);
        tracker.merge_tick(&engine.tick());
        tracker.reset(&engine, own, StateRead::Delta);

        // registered after our last tick, then we read changes before the next one
        let late = engine.place_snake(Block::new(7, 5), "a").unwrap();
        tracker.reset(&engine, own, StateRead::Delta);
        assert!(tracker.snake(late).is_none());

        tracker.merge_tick(&engine.tick());
        let delta = &tracker.snake(late).unwrap().delta;
        assert_eq!(
            delta.added,
            vec![Block::new(7, 4), Block::new(7, 5), Block::new(7, 6)]
        );
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_full_reset_tracks_pending_snakes() {
        let mut engine = engine();
        let own = engine.place_snake(Block::new(2, 5), "b").unwrap();
        let mut tracker = DeltaTracker::for_player(&engine, own);
        tracker.merge_tick(&engine.tick());

        // a full read already showed the new snake's body, so only its moves follow
        let late = engine.place_snake(Block::new(7, 5), "a").unwrap();
        tracker.reset(&engine, own, StateRead::Full);
        assert!(tracker.snake(late).unwrap().delta.is_empty());

        tracker.merge_tick(&engine.tick());
        let delta = &tracker.snake(late).unwrap().delta;
        assert_eq!(delta.added, vec![Block::new(7, 4)]);
        assert_eq!(delta.removed, vec![Block::new(7, 7)]);

        // once announced, a delta reset keeps it
        tracker.reset(&engine, own, StateRead::Delta);
        assert!(tracker.snake(late).is_some());
    }

    #[test]
    fn test_food_lifecycle() {
        let mut engine = Engine::new(&EngineSettings {
            width: 10,
            height: 10,
            mode: GridMode::Bounded,
            target_food: 1,
            seed: Some(9),
            walls: Vec::new(),
        });
        let mut tracker = DeltaTracker::baseline(&engine);

        let report = engine.tick();
        let (food, created) = report.new_of_kinds[&EntityKind::Food][0].clone();
        tracker.merge_tick(&report);
        let tracked = &tracker.kinds()[&EntityKind::Food][&food];
        assert_eq!(tracked.delta, created);

        let (added, removed) = tracker.accumulated_blocks();
        assert_eq!(added, created.added);
        assert!(removed.is_empty());
    }
}
