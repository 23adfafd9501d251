//! Builds the binary replies for the four state commands.

use crate::engine::{Engine, EntityId};
use crate::tracker::{DeltaTracker, TrackedEntity};
use shared::codec::{
    encode_blocks_message, encode_partial_entity, encode_whole_entity, ListEncoder, NO_BLOCKS,
};
use shared::entity::{empty_metadata, Block, Entity};
use shared::CodecResult;

/// Who a state reply is addressed to.
#[derive(Debug, Clone, Copy)]
pub enum Viewer<'a> {
    /// No player id was given.
    Spectator,
    /// A registered player; `entity` is the live snake or its final snapshot.
    Player {
        snake: EntityId,
        entity: Option<&'a Entity>,
    },
}

impl Viewer<'_> {
    fn snake(&self) -> Option<EntityId> {
        match self {
            Viewer::Spectator => None,
            Viewer::Player { snake, .. } => Some(*snake),
        }
    }

    /// The alive flag sent in the reply header.
    pub fn alive(&self) -> bool {
        match self {
            Viewer::Spectator => true,
            Viewer::Player { entity, .. } => entity.map_or(false, |e| e.alive),
        }
    }

    fn encode_header<'b>(
        &self,
        out: &mut Vec<u8>,
        new: &'b [Block],
        old: &'b [Block],
    ) -> CodecResult<()> {
        match self {
            Viewer::Player {
                entity: Some(entity),
                ..
            } => encode_partial_entity(out, entity.alive, &entity.metadata, new, old),
            _ => encode_partial_entity(out, self.alive(), &empty_metadata(), new, old),
        }
    }
}

fn resolve<'a>(engine: &'a Engine, id: EntityId, tracked: &'a TrackedEntity) -> Option<&'a Entity> {
    engine.entity(id).or(tracked.retired.as_deref())
}

/// Viewer's snake whole, then every other snake whole, then one whole list
/// per kind.
pub fn encode_current_state(engine: &Engine, viewer: Viewer<'_>) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    match viewer {
        Viewer::Player {
            entity: Some(entity),
            ..
        } => encode_whole_entity(&mut out, entity)?,
        _ => viewer.encode_header(&mut out, NO_BLOCKS, NO_BLOCKS)?,
    }

    let own = viewer.snake();
    let mut list = ListEncoder::begin(&mut out);
    for (id, snake) in engine.snakes() {
        if Some(id) != own {
            list.push_whole(snake)?;
        }
    }
    list.finish()?;

    for (kind, _) in engine.kinds() {
        let mut list = ListEncoder::begin(&mut out);
        for (_, entity) in engine.members(kind) {
            list.push_whole(entity)?;
        }
        list.finish()?;
    }
    Ok(out)
}

/// Same layout as [`encode_current_state`], with the accumulated changes in
/// place of whole block lists.
pub fn encode_updated_state(
    engine: &Engine,
    viewer: Viewer<'_>,
    tracker: &DeltaTracker,
) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    let own = viewer.snake();
    match own.and_then(|id| tracker.snake(id)) {
        Some(tracked) => {
            viewer.encode_header(&mut out, &tracked.delta.added, &tracked.delta.removed)?
        }
        None => viewer.encode_header(&mut out, NO_BLOCKS, NO_BLOCKS)?,
    }

    let mut list = ListEncoder::begin(&mut out);
    for (id, tracked) in tracker.snakes() {
        if Some(*id) == own {
            continue;
        }
        if let Some(snake) = resolve(engine, *id, tracked) {
            list.push_partial(
                snake.alive,
                &snake.metadata,
                &tracked.delta.added,
                &tracked.delta.removed,
            )?;
        }
    }
    list.finish()?;

    for members in tracker.kinds().values() {
        let mut list = ListEncoder::begin(&mut out);
        for (id, tracked) in members {
            if let Some(entity) = resolve(engine, *id, tracked) {
                list.push_partial(
                    entity.alive,
                    &entity.metadata,
                    &tracked.delta.added,
                    &tracked.delta.removed,
                )?;
            }
        }
        list.finish()?;
    }
    Ok(out)
}

/// Alive flag plus every live block as new.
pub fn encode_current_blocks(engine: &Engine, alive: bool) -> CodecResult<Vec<u8>> {
    encode_blocks_message(alive, &engine.all_blocks(), NO_BLOCKS)
}

/// Alive flag plus everything the tracker accumulated, flattened.
pub fn encode_updated_blocks(tracker: &DeltaTracker, alive: bool) -> CodecResult<Vec<u8>> {
    let (added, removed) = tracker.accumulated_blocks();
    encode_blocks_message(alive, &added, &removed)
}
