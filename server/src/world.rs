//! The shared game: one engine plus the registered players.
//!
//! Locks are always taken in the order engine, player map, single player, and
//! a player guard is released before the player map is locked for writing.

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::{DispatchError, RegisterError};
use crate::player_manager::{Player, PlayerManager};
use crate::snapshot::{
    encode_current_blocks, encode_current_state, encode_updated_blocks, encode_updated_state,
    Viewer,
};
use crate::tracker::{DeltaTracker, StateRead};
use log::{debug, info};
use shared::{CodecResult, Direction, DirectionAck, EngineInfo, PlayerId};
use tokio::sync::RwLock;

/// Ticks between periodic debug summaries.
const SUMMARY_EVERY: u64 = 50;

pub struct World {
    engine: RwLock<Engine>,
    players: RwLock<PlayerManager>,
}

fn viewer<'a>(engine: &'a Engine, player: &'a Player) -> Viewer<'a> {
    let entity = engine.entity(player.snake).or_else(|| {
        player
            .tracker
            .snake(player.snake)
            .and_then(|tracked| tracked.retired.as_deref())
    });
    Viewer::Player {
        snake: player.snake,
        entity,
    }
}

impl World {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            engine: RwLock::new(Engine::new(&config.engine)),
            players: RwLock::new(PlayerManager::new(
                config.max_players,
                config.kill_after,
                config.kick_after,
            )),
        }
    }

    pub fn engine(&self) -> &RwLock<Engine> {
        &self.engine
    }

    pub fn players(&self) -> &RwLock<PlayerManager> {
        &self.players
    }

    /// Runs one simulation step and folds it into every player's tracker.
    /// Returns the tick number.
    pub async fn tick(&self) -> u64 {
        let mut engine = self.engine.write().await;
        let report = engine.tick();

        let mut players = self.players.write().await;
        players.merge_tick(&report).await;

        let sweep = players.sweep().await;
        for snake in sweep.kill {
            if engine.is_alive(snake) {
                info!("Killing snake {:?}: its player went silent", snake);
                engine.kill(snake);
            }
        }

        if report.tick % SUMMARY_EVERY == 0 {
            debug!(
                "Tick {}: {} snakes, {} food, {} players",
                report.tick,
                engine.snake_ids().len(),
                engine.food_count(),
                players.len()
            );
        }
        report.tick
    }

    pub async fn engine_info(&self) -> EngineInfo {
        self.engine.read().await.info()
    }

    /// Registers a player under a fresh random id.
    pub async fn register(&self, name: &str) -> Result<PlayerId, RegisterError> {
        self.register_as(PlayerId(rand::random()), name).await
    }

    pub async fn register_as(&self, id: PlayerId, name: &str) -> Result<PlayerId, RegisterError> {
        let mut engine = self.engine.write().await;
        let mut players = self.players.write().await;
        players.check_room(id)?;

        let snake = engine.spawn_snake(name).ok_or(RegisterError::NoSpace)?;
        let tracker = DeltaTracker::for_player(&engine, snake);
        if let Err(e) = players.insert(Player::new(id, name.to_string(), snake, tracker)) {
            engine.kill(snake);
            return Err(e);
        }
        Ok(id)
    }

    pub async fn set_direction(&self, id: PlayerId, direction: Direction) -> DirectionAck {
        let Some(handle) = self.players.read().await.get(id) else {
            return DirectionAck::UnknownPlayer;
        };
        let snake = {
            let mut player = handle.lock().await;
            player.touch();
            player.snake
        };
        if self.engine.write().await.steer(snake, direction) {
            DirectionAck::Accepted
        } else {
            DirectionAck::Rejected
        }
    }

    /// Full state. Without an id the reply is built for a spectator and no
    /// player state is touched.
    pub async fn current_state(&self, id: Option<PlayerId>) -> Result<Vec<u8>, DispatchError> {
        match id {
            Some(id) => {
                self.read_state(id, StateRead::Full, |engine, player| {
                    encode_current_state(engine, viewer(engine, player))
                })
                .await
            }
            None => {
                let engine = self.engine.read().await;
                Ok(encode_current_state(&engine, Viewer::Spectator)?)
            }
        }
    }

    pub async fn updated_state(&self, id: PlayerId) -> Result<Vec<u8>, DispatchError> {
        self.read_state(id, StateRead::Delta, |engine, player| {
            encode_updated_state(engine, viewer(engine, player), &player.tracker)
        })
        .await
    }

    pub async fn current_blocks(&self, id: Option<PlayerId>) -> Result<Vec<u8>, DispatchError> {
        match id {
            Some(id) => {
                self.read_state(id, StateRead::Full, |engine, player| {
                    encode_current_blocks(engine, viewer(engine, player).alive())
                })
                .await
            }
            None => {
                let engine = self.engine.read().await;
                Ok(encode_current_blocks(&engine, true)?)
            }
        }
    }

    pub async fn updated_blocks(&self, id: PlayerId) -> Result<Vec<u8>, DispatchError> {
        self.read_state(id, StateRead::Delta, |engine, player| {
            encode_updated_blocks(&player.tracker, viewer(engine, player).alive())
        })
        .await
    }

    /// Serializes a reply for a registered player, then starts their next
    /// sync window. A player whose snake is no longer alive is removed once
    /// the reply is built.
    async fn read_state<F>(
        &self,
        id: PlayerId,
        read: StateRead,
        encode: F,
    ) -> Result<Vec<u8>, DispatchError>
    where
        F: FnOnce(&Engine, &Player) -> CodecResult<Vec<u8>>,
    {
        let engine = self.engine.read().await;
        let handle = self
            .players
            .read()
            .await
            .get(id)
            .ok_or(DispatchError::UnknownPlayer(id))?;

        let mut player = handle.lock().await;
        player.touch();
        let bytes = encode(&*engine, &*player)?;
        let snake = player.snake;
        player.tracker.reset(&engine, snake, read);
        let alive = engine.is_alive(player.snake);
        drop(player);
        drop(engine);

        if !alive && self.players.write().await.remove(id) {
            info!("Player {} removed: its death has been reported", id);
        }
        Ok(bytes)
    }

    /// One line per player for the status report.
    pub async fn status_lines(&self) -> Vec<String> {
        let engine = self.engine.read().await;
        let players = self.players.read().await;
        let mut lines = Vec::with_capacity(players.len());
        for (id, player) in players.iter() {
            let player = player.lock().await;
            let state = if engine.is_alive(player.snake) {
                "alive"
            } else {
                "dead"
            };
            lines.push(format!(
                "{} {:<16} {:<5} last seen {:.1}s ago",
                id,
                player.name,
                state,
                player.last_seen.elapsed().as_secs_f32()
            ));
        }
        lines.sort();
        lines
    }
}
