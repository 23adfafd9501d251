//! Registered players and their liveness bookkeeping.
//!
//! This module tracks who is playing, including:
//! - Player registration under a random identifier, with a capacity limit
//! - The snake each player controls and their differential tracker
//! - Last-contact timestamps used to kill silent snakes and purge stale players
//!
//! Each player sits behind its own mutex so a dispatch task working on one
//! player never blocks the others, while the tick merge still excludes
//! concurrent reads of the same tracker.

use crate::engine::{EntityId, TickReport};
use crate::error::RegisterError;
use crate::tracker::DeltaTracker;
use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub type SharedPlayer = Arc<Mutex<Player>>;

/// A registered player and the state kept for their polls.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// The snake this player steers
    pub snake: EntityId,
    /// Changes accumulated since the last state read
    pub tracker: DeltaTracker,
    /// Last time any request referenced this player
    pub last_seen: Instant,
}

impl Player {
    pub fn new(id: PlayerId, name: String, snake: EntityId, tracker: DeltaTracker) -> Self {
        Self {
            id,
            name,
            snake,
            tracker,
            last_seen: Instant::now(),
        }
    }

    /// Records contact from the player.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks whether the player has been silent for longer than `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// What a timeout sweep decided.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Snakes whose players went quiet past either threshold
    pub kill: Vec<EntityId>,
    /// Players dropped for exceeding the kick threshold
    pub kicked: Vec<PlayerId>,
}

/// All registered players
///
/// Enforces the player limit and the two liveness thresholds.
#[derive(Debug)]
pub struct PlayerManager {
    players: HashMap<PlayerId, SharedPlayer>,
    max_players: usize,
    kill_after: Duration,
    kick_after: Duration,
}

impl PlayerManager {
    pub fn new(max_players: usize, kill_after: Duration, kick_after: Duration) -> Self {
        Self {
            players: HashMap::new(),
            max_players,
            kill_after,
            kick_after,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Checks that a player with this id could be added right now.
    pub fn check_room(&self, id: PlayerId) -> Result<(), RegisterError> {
        if self.contains(id) {
            return Err(RegisterError::IdCollision(id));
        }
        if self.is_full() {
            return Err(RegisterError::Full(self.max_players));
        }
        Ok(())
    }

    pub fn insert(&mut self, player: Player) -> Result<(), RegisterError> {
        self.check_room(player.id)?;
        info!(
            "Player {} '{}' registered with snake {:?}",
            player.id, player.name, player.snake
        );
        self.players
            .insert(player.id, Arc::new(Mutex::new(player)));
        Ok(())
    }

    pub fn get(&self, id: PlayerId) -> Option<SharedPlayer> {
        self.players.get(&id).cloned()
    }

    /// Removes a player. Returns true if the player was present.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &SharedPlayer)> {
        self.players.iter()
    }

    /// Folds a tick into every player's tracker.
    pub async fn merge_tick(&self, report: &TickReport) {
        for player in self.players.values() {
            player.lock().await.tracker.merge_tick(report);
        }
    }

    /// Purges players silent past the kick threshold and lists the snakes
    /// that must die for silence.
    pub async fn sweep(&mut self) -> Sweep {
        let mut sweep = Sweep::default();
        for (id, player) in &self.players {
            let player = player.lock().await;
            if player.is_timed_out(self.kick_after) {
                sweep.kicked.push(*id);
                sweep.kill.push(player.snake);
            } else if player.is_timed_out(self.kill_after) {
                sweep.kill.push(player.snake);
            }
        }
        for id in &sweep.kicked {
            if self.remove(*id) {
                info!("Player {} kicked after {:?} of silence", id, self.kick_after);
            }
        }
        sweep
    }
}
