//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::combat::Scores;
use crate::game::control::ControlIntent;
use crate::game::entities::{ConnectionId, ObstacleId, ObstacleKind, ProjectileId, ShipId, Team, Upgrades};
use crate::game::layout::SpawnPoints;
use crate::game::room::{RoomId, RoomPhase};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join (or create) a named room, leaving any current room first
    JoinRoom { room_id: RoomId },

    /// Leave the current room
    LeaveRoom,

    /// Flip this player's ready flag
    ToggleReady { room_id: RoomId },

    /// Host-only request to start the match
    StartGame { room_id: RoomId },

    /// Steering, aiming or throttle for one owned ship
    ShipControl(ControlIntent),

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: ConnectionId,
        server_time: u64,
    },

    /// Confirmation of room join, sent to the joiner only
    JoinedRoom {
        room_id: RoomId,
        player_id: ConnectionId,
        team: Team,
        is_host: bool,
        player_count: usize,
        players_ready: bool,
        state: Box<RoomSnapshot>,
    },

    /// Someone else joined the room
    PlayerJoined {
        player_id: ConnectionId,
        player_count: usize,
        players_ready: bool,
    },

    /// Someone left the room or disconnected
    PlayerLeft {
        player_id: ConnectionId,
        player_count: usize,
        players_ready: bool,
    },

    /// Answer to the player who toggled ready
    PlayerReadyStatus {
        is_ready: bool,
        all_players_ready: bool,
        player_count: usize,
    },

    /// Readiness change seen by the other players
    PlayersReady {
        player_count: usize,
        players_ready: bool,
    },

    /// Match has started
    GameStarted { game_start_time: u64 },

    /// Full room state, sent every tick
    GameState(Box<RoomSnapshot>),

    /// A team reached the winning score
    GameOver { winner: Team, scores: Scores },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Everything a client needs to render one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub game_started: bool,
    pub game_start_time: Option<u64>,
    pub server_time: u64,
    pub scores: Scores,
    pub spawn_points: SpawnPoints,
    pub player_count: usize,
    pub players: Vec<PlayerSnapshot>,
    pub ships: Vec<ShipSnapshot>,
    pub cannonballs: Vec<CannonballSnapshot>,
    pub obstacles: Vec<ObstacleSnapshot>,
}

/// Roster entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: ConnectionId,
    pub team: Team,
    pub ready: bool,
    pub is_host: bool,
}

/// Ship state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub id: ShipId,
    pub owner_id: ConnectionId,
    pub team: Team,
    pub slot: u8,
    pub x: f32,
    pub y: f32,
    /// Heading in radians
    pub heading: f32,
    pub rudder_angle: f32,
    pub target_rudder_angle: f32,
    pub cannon_angle: f32,
    pub speed: f32,
    pub target_speed: f32,
    pub health: f32,
    pub max_health: f32,
    /// Cannon readiness, 0 = can fire
    pub reload_ms: u64,
    pub upgrades: Upgrades,
    pub kill_tier_progress: f32,
    pub tier: u8,
}

/// Cannonball state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannonballSnapshot {
    pub id: ProjectileId,
    pub shooter_id: ShipId,
    pub shooter_team: Team,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub speed: f32,
}

/// Obstacle state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    pub id: ObstacleId,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Only icebergs carry health
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    pub variant: u8,
}
