//! Server and engine settings.

use shared::protocol::DEFAULT_PORT;
use shared::{Block, GridMode};
use std::str::FromStr;
use std::time::Duration;

/// A straight wall segment (or a single cell), written `X,Y` or `X,Y:X,Y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallSpec {
    pub from: Block,
    pub to: Block,
}

impl WallSpec {
    /// Cells covered by the segment, from `from` to `to` inclusive.
    pub fn blocks(&self) -> Vec<Block> {
        let dx = (self.to.x - self.from.x).signum();
        let dy = (self.to.y - self.from.y).signum();
        let len = (self.to.x - self.from.x)
            .abs()
            .max((self.to.y - self.from.y).abs());
        (0..=len)
            .map(|i| Block::new(self.from.x + dx * i, self.from.y + dy * i))
            .collect()
    }
}

fn parse_cell(s: &str) -> Result<Block, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x.trim().parse().map_err(|_| format!("bad x in '{}'", s))?;
    let y = y.trim().parse().map_err(|_| format!("bad y in '{}'", s))?;
    Ok(Block::new(x, y))
}

impl FromStr for WallSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = match s.split_once(':') {
            Some((from, to)) => (parse_cell(from)?, parse_cell(to)?),
            None => {
                let cell = parse_cell(s)?;
                (cell, cell)
            }
        };
        if from.x != to.x && from.y != to.y {
            return Err(format!("wall '{}' is neither horizontal nor vertical", s));
        }
        Ok(WallSpec { from, to })
    }
}

/// Grid and spawning settings for the simulation.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub width: u16,
    pub height: u16,
    pub mode: GridMode,
    /// Food items the engine keeps topping up to.
    pub target_food: usize,
    /// Seed for spawn placement; `None` seeds from the OS.
    pub seed: Option<u64>,
    pub walls: Vec<WallSpec>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            mode: GridMode::Wrapping,
            target_food: 2,
            seed: None,
            walls: Vec::new(),
        }
    }
}

/// Largest grid accepted. Spawning scans every cell under the engine lock.
pub const MAX_GRID_CELLS: u32 = 1 << 20;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick: Duration,
    pub engine: EngineSettings,
    pub max_players: usize,
    /// Silence after which a player's snake is killed.
    pub kill_after: Duration,
    /// Silence after which the player record is dropped.
    pub kick_after: Duration,
    pub status_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            tick: Duration::from_millis(200),
            engine: EngineSettings::default(),
            max_players: 5,
            kill_after: Duration::from_secs(10),
            kick_after: Duration::from_secs(20),
            status_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Checks the settings that would make the server misbehave at runtime.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.width == 0 || self.engine.height == 0 {
            return Err("grid dimensions must be non-zero".to_string());
        }
        let cells = u32::from(self.engine.width) * u32::from(self.engine.height);
        if cells > MAX_GRID_CELLS {
            return Err(format!(
                "grid of {} cells exceeds the limit of {}",
                cells, MAX_GRID_CELLS
            ));
        }
        if self.tick.is_zero() {
            return Err("tick interval must be non-zero".to_string());
        }
        if self.kick_after <= self.kill_after {
            return Err(format!(
                "kick time ({:?}) must exceed kill time ({:?})",
                self.kick_after, self.kill_after
            ));
        }
        Ok(())
    }
}
