//! TCP front end: accept loop, tick loop and status reporter.

use crate::config::ServerConfig;
use crate::dispatch::handle_connection;
use crate::error::{DispatchError, ServerError};
use crate::world::World;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Main server coordinating the simulation and client requests
pub struct Server {
    listener: TcpListener,
    world: Arc<World>,
    config: ServerConfig,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::InvalidConfig)?;
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            world: Arc::new(World::new(&config)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world)
    }

    /// Spawns the fixed-interval simulation loop
    fn spawn_tick_loop(&self) -> JoinHandle<()> {
        let world = Arc::clone(&self.world);
        let period = self.config.tick;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // late ticks run late; none are dropped or doubled up
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                world.tick().await;
            }
        })
    }

    /// Spawns the periodic player report
    fn spawn_status_reporter(&self) -> Option<JoinHandle<()>> {
        let period = self.config.status_interval;
        if period.is_zero() {
            return None;
        }
        let world = Arc::clone(&self.world);

        Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let lines = world.status_lines().await;
                if lines.is_empty() {
                    continue;
                }
                info!("{} player(s):", lines.len());
                for line in lines {
                    info!("  {}", line);
                }
            }
        }))
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        let ticks = self.spawn_tick_loop();
        let status = self.spawn_status_reporter();
        info!("Server started successfully");

        let result = self.accept_loop().await;

        ticks.abort();
        if let Some(status) = status {
            status.abort();
        }
        result
    }

    async fn accept_loop(&self) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let world = Arc::clone(&self.world);
            let timeout = self.config.request_timeout;
            tokio::spawn(async move {
                match handle_connection(&world, stream, timeout).await {
                    Ok(()) => {}
                    Err(DispatchError::Io(e)) => debug!("Connection from {} failed: {}", addr, e),
                    Err(e) => warn!("Dropped request from {}: {}", addr, e),
                }
            });
        }
    }
}
