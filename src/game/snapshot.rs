//! Snapshot building and encoding

use std::sync::Arc;

use tracing::warn;

use crate::util::time::Millis;
use crate::ws::protocol::{
    CannonballSnapshot, ObstacleSnapshot, PlayerSnapshot, RoomSnapshot, ServerMsg, ShipSnapshot,
};

use super::entities::{Obstacle, Projectile, Ship};
use super::room::Room;

/// Builds room snapshots for network transmission
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Capture the full visible state of `room` at `now`
    pub fn build(room: &Room, now: Millis) -> RoomSnapshot {
        let registry = room.registry();
        RoomSnapshot {
            room_id: room.id().to_string(),
            phase: room.phase(),
            game_started: room.is_running(),
            game_start_time: room.game_start_time(),
            server_time: now,
            scores: room.scores(),
            spawn_points: *room.spawn_points(),
            player_count: room.player_count(),
            players: room
                .players()
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    team: p.team,
                    ready: p.ready,
                    is_host: p.is_host,
                })
                .collect(),
            ships: registry
                .ships
                .iter()
                .filter(|s| s.is_alive())
                .map(|s| ship_snapshot(s, now))
                .collect(),
            cannonballs: registry
                .projectiles
                .iter()
                .filter(|p| !p.dead)
                .map(cannonball_snapshot)
                .collect(),
            obstacles: registry
                .obstacles
                .iter()
                .filter(|o| !o.dead)
                .map(obstacle_snapshot)
                .collect(),
        }
    }

    /// Serialize a message once so it can be fanned out to many outboxes
    pub fn encode(msg: &ServerMsg) -> Option<Arc<str>> {
        match serde_json::to_string(msg) {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                warn!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }
}

fn ship_snapshot(ship: &Ship, now: Millis) -> ShipSnapshot {
    let ready_at = ship.last_shot.saturating_add(ship.shot_cooldown);
    ShipSnapshot {
        id: ship.id,
        owner_id: ship.owner,
        team: ship.team,
        slot: ship.slot,
        x: ship.x,
        y: ship.y,
        heading: ship.heading,
        rudder_angle: ship.rudder_angle,
        target_rudder_angle: ship.target_rudder_angle,
        cannon_angle: ship.cannon_angle,
        speed: ship.speed,
        target_speed: ship.target_speed,
        health: ship.health,
        max_health: ship.max_health,
        reload_ms: ready_at.saturating_sub(now),
        upgrades: ship.upgrades,
        kill_tier_progress: ship.kill_tier_progress,
        tier: ship.tier,
    }
}

fn cannonball_snapshot(p: &Projectile) -> CannonballSnapshot {
    CannonballSnapshot {
        id: p.id,
        shooter_id: p.shooter_id,
        shooter_team: p.shooter_team,
        x: p.x,
        y: p.y,
        angle: p.angle,
        speed: p.speed,
    }
}

fn obstacle_snapshot(o: &Obstacle) -> ObstacleSnapshot {
    ObstacleSnapshot {
        id: o.id,
        kind: o.kind,
        x: o.x,
        y: o.y,
        radius: o.radius,
        health: o.health,
        variant: o.variant,
    }
}

/// Broadcast volume, logged periodically by the scheduler
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub dropped_frames: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
    }

    pub fn avg_bytes(&self) -> u64 {
        if self.total_snapshots == 0 {
            0
        } else {
            self.total_bytes / self.total_snapshots
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn lobby_snapshot_lists_roster_and_terrain() {
        let mut room = Room::new("cove".to_string(), 3, 0);
        let host = Uuid::new_v4();
        room.add_player(host);

        let snap = SnapshotBuilder::build(&room, 0);
        assert_eq!(snap.room_id, "cove");
        assert!(!snap.game_started);
        assert_eq!(snap.game_start_time, None);
        assert_eq!(snap.player_count, 1);
        assert!(snap.players[0].is_host);
        assert!(snap.ships.is_empty());
        assert!((4..=9).contains(&snap.obstacles.len()));

        let json = serde_json::to_value(ServerMsg::GameState(Box::new(snap))).unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["phase"], "lobby");
        assert_eq!(json["obstacles"][0]["type"], "island");
    }

    #[test]
    fn running_snapshot_reports_reload() {
        let mut room = Room::new("cove".to_string(), 3, 1_000);
        let host = Uuid::new_v4();
        room.add_player(host);
        room.add_player(Uuid::new_v4());
        room.start_game(host, 1_000);
        room.tick(1_000);

        let snap = SnapshotBuilder::build(&room, 2_000);
        assert!(snap.game_started);
        assert_eq!(snap.game_start_time, Some(1_000));
        assert_eq!(snap.ships.len(), 2);
        assert_eq!(snap.ships[0].reload_ms, 4_000);
    }

    #[test]
    fn stats_average() {
        let mut stats = SnapshotStats::default();
        assert_eq!(stats.avg_bytes(), 0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.avg_bytes(), 200);
    }
}
