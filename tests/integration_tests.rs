//! Integration tests for the snake server and its client library
//!
//! A real server listens on an ephemeral port while the tests talk to it over
//! TCP. The tick loop runs on a period far longer than any test, so ticks are
//! driven by hand through the shared world and every expectation is exact.

use client::{ClientError, ClientGameState, Occupant, SnekClient};
use server::config::{ServerConfig, WallSpec};
use server::network::Server;
use server::World;
use shared::{Block, Direction, DirectionAck, GridMode, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct TestServer {
    addr: String,
    world: Arc<World>,
}

impl TestServer {
    fn client(&self) -> SnekClient {
        SnekClient::new(self.addr.clone()).with_timeout(Duration::from_secs(2))
    }

    async fn ticks(&self, n: usize) {
        for _ in 0..n {
            self.world.tick().await;
        }
    }
}

fn test_config(mode: GridMode) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.bind_addr = "127.0.0.1:0".to_string();
    config.tick = Duration::from_secs(3600);
    config.status_interval = Duration::ZERO;
    config.engine.width = 20;
    config.engine.height = 20;
    config.engine.mode = mode;
    config.engine.seed = Some(2024);
    config.engine.walls = vec!["0,0:3,0".parse::<WallSpec>().unwrap()];
    config
}

async fn start(config: ServerConfig) -> TestServer {
    let server = Server::new(config).await.expect("Failed to start server");
    let addr = server.local_addr().unwrap().to_string();
    let world = server.world();
    tokio::spawn(server.run());
    TestServer { addr, world }
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    #[tokio::test]
    async fn engine_info_matches_configuration() {
        let server = start(test_config(GridMode::Bounded)).await;
        let info = server.client().engine_info().await.unwrap();

        assert_eq!(info.width, 20);
        assert_eq!(info.height, 20);
        assert_eq!(info.grid_mode(), Some(GridMode::Bounded));
    }

    #[tokio::test]
    async fn registered_player_sees_own_snake_first() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut client = server.client();
        client.register("alice").await.unwrap();

        let state = client.current_state().await.unwrap();
        assert!(state.player.alive);
        assert_eq!(state.player.name(), Some("alice"));
        assert_eq!(state.player.added.len(), 3);
        assert!(state.player.removed.is_empty());
        assert!(state.snakes.is_empty());

        // food first, then the configured wall
        assert_eq!(state.kinds.len(), 2);
        assert_eq!(state.kinds[1].len(), 1);
        assert_eq!(state.kinds[1][0].added.len(), 4);
    }

    #[tokio::test]
    async fn spectator_gets_placeholder_header() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut player = server.client();
        player.register("bob").await.unwrap();

        let state = server.client().current_state().await.unwrap();
        assert!(state.player.alive);
        assert_eq!(state.player.metadata, serde_json::json!({}));
        assert!(state.player.added.is_empty());
        assert_eq!(state.snakes.len(), 1);
        assert_eq!(state.snakes[0].name(), Some("bob"));
    }

    #[tokio::test]
    async fn updated_state_only_carries_changes() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut client = server.client();
        client.register("carol").await.unwrap();
        client.current_state().await.unwrap();

        server.ticks(1).await;
        let update = client.updated_state().await.unwrap();
        assert_eq!(update.player.added.len(), 1);
        assert_eq!(update.player.removed.len(), 1);
        // one food spawns per tick while below target
        assert_eq!(update.kinds[0].len(), 1);
        assert_eq!(update.kinds[0][0].added.len(), 1);
        // the wall is still listed, with nothing to change
        assert_eq!(update.kinds[1].len(), 1);
        assert!(update.kinds[1][0].added.is_empty());
        assert!(update.kinds[1][0].removed.is_empty());

        let again = client.updated_state().await.unwrap();
        assert!(again.player.added.is_empty());
        assert!(again.player.removed.is_empty());
        assert_eq!(again.kinds[0].len(), 1);
        for record in again.kinds.iter().flatten() {
            assert!(record.added.is_empty() && record.removed.is_empty());
        }
    }

    #[tokio::test]
    async fn direction_changes_are_acknowledged() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut client = server.client();
        client.register("dave").await.unwrap();

        assert!(matches!(
            client.set_direction(Direction::Down).await,
            Err(ClientError::DirectionRejected(DirectionAck::Rejected))
        ));
        client.set_direction(Direction::Left).await.unwrap();

        let mut stranger = server.client();
        stranger.set_player(Some(PlayerId(1)));
        assert!(matches!(
            stranger.set_direction(Direction::Left).await,
            Err(ClientError::DirectionRejected(DirectionAck::UnknownPlayer))
        ));
    }

    #[tokio::test]
    async fn unknown_player_gets_empty_reply() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut client = server.client();
        client.set_player(Some(PlayerId(42)));

        assert!(matches!(
            client.updated_state().await,
            Err(ClientError::EmptyReply)
        ));
        assert!(matches!(
            client.updated_blocks().await,
            Err(ClientError::EmptyReply)
        ));
    }

    #[tokio::test]
    async fn unknown_command_closes_without_reply() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut stream = TcpStream::connect(&server.addr).await.unwrap();
        stream.write_all(&[0x42, 1, 2, 3]).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn players_are_capped() {
        let mut config = test_config(GridMode::Wrapping);
        config.max_players = 2;
        let server = start(config).await;

        server.client().register("one").await.unwrap();
        server.client().register("two").await.unwrap();
        assert!(matches!(
            server.client().register("three").await,
            Err(ClientError::RegistrationRefused)
        ));
    }

    #[tokio::test]
    async fn local_state_follows_server() {
        // no food and no walls: two snakes heading up can never meet
        let mut config = test_config(GridMode::Wrapping);
        config.engine.walls.clear();
        config.engine.target_food = 0;
        let server = start(config).await;
        let mut client = server.client();
        client.register("erin").await.unwrap();
        let mut other = server.client();
        other.register("frank").await.unwrap();

        let mut game = ClientGameState::new(client.engine_info().await.unwrap());
        game.apply_full(&client.current_state().await.unwrap());

        for _ in 0..5 {
            server.ticks(1).await;
            game.apply_update(&client.updated_state().await.unwrap());
        }
        // the other player stays silent but well inside its kill time
        assert!(game.alive);

        let mut fresh = ClientGameState::new(client.engine_info().await.unwrap());
        fresh.apply_full(&client.current_state().await.unwrap());

        assert_eq!(game.head, fresh.head);
        for occupant in [Occupant::Own, Occupant::Snake, Occupant::Food, Occupant::Wall] {
            assert_eq!(game.count(occupant), fresh.count(occupant), "{:?}", occupant);
        }
    }

    #[tokio::test]
    async fn block_commands_track_changes() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut client = server.client();
        client.register("gina").await.unwrap();

        let all = client.current_blocks().await.unwrap();
        assert!(all.alive);
        // snake plus the wall, no food before the first tick
        assert_eq!(all.added.len(), 3 + 4);

        server.ticks(1).await;
        let changed = client.updated_blocks().await.unwrap();
        assert_eq!(changed.added.len(), 2);
        assert_eq!(changed.removed.len(), 1);
    }

    #[tokio::test]
    async fn dead_player_is_told_then_removed() {
        let mut config = test_config(GridMode::Bounded);
        config.engine.walls.clear();
        config.engine.target_food = 0;
        let server = start(config).await;
        let mut client = server.client();
        client.register("henry").await.unwrap();
        client.current_state().await.unwrap();

        // heading up, the snake leaves the bounded grid within 20 ticks
        server.ticks(20).await;
        let last = client.updated_state().await.unwrap();
        assert!(!last.player.alive);
        assert_eq!(last.player.name(), Some("henry"));
        assert!(!last.player.removed.is_empty());

        assert!(matches!(
            client.updated_state().await,
            Err(ClientError::EmptyReply)
        ));
    }

    #[tokio::test]
    async fn walls_are_obstacles_for_the_autopilot() {
        let server = start(test_config(GridMode::Wrapping)).await;
        let mut game = ClientGameState::new(server.client().engine_info().await.unwrap());
        game.apply_full(&server.client().current_state().await.unwrap());

        assert_eq!(game.occupants(Block::new(1, 0)), &[Occupant::Wall]);
        game.head = Some(Block::new(1, 1));
        game.heading = Direction::Up;
        assert_ne!(game.choose_direction(), Some(Direction::Up));
    }
}
