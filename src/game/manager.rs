//! Room lifecycle: creation on first join, membership, teardown when empty

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::util::time::Millis;

use super::control::ControlIntent;
use super::entities::ConnectionId;
use super::room::{Player, ReadyStatus, Room, RoomId, TickReport};

/// Result of a join request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined {
        player: Player,
        player_count: usize,
        players_ready: bool,
        /// The room this connection was in before, if any
        left: Option<Departure>,
    },
    /// Room already holds the maximum number of players
    RoomFull,
    /// Connection is already seated in this room
    AlreadyJoined,
}

/// A player leaving a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub player_count: usize,
    pub players_ready: bool,
    /// The room was empty afterwards and has been destroyed
    pub room_closed: bool,
}

/// Owns every room and the connection → room index
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    membership: HashMap<ConnectionId, RoomId>,
    max_players: usize,
    seeds: ChaCha8Rng,
}

impl RoomManager {
    pub fn new(max_players: usize) -> Self {
        Self::with_seed(max_players, rand::random())
    }

    /// Rooms created by this manager draw their seeds from `seed`
    pub fn with_seed(max_players: usize, seed: u64) -> Self {
        Self {
            rooms: HashMap::new(),
            membership: HashMap::new(),
            max_players,
            seeds: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomId> {
        self.membership.get(&connection_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.membership.len()
    }

    /// Connections seated in `room_id`
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.players().iter().map(|p| p.id).collect())
            .unwrap_or_default()
    }

    /// Seat `connection_id` in `room_id`, creating the room if needed. A
    /// connection already in another room leaves it first.
    pub fn join(&mut self, connection_id: ConnectionId, room_id: &str, now: Millis) -> JoinOutcome {
        if self.room_of(connection_id).is_some_and(|current| current == room_id) {
            return JoinOutcome::AlreadyJoined;
        }
        if self
            .rooms
            .get(room_id)
            .is_some_and(|room| room.player_count() >= self.max_players)
        {
            debug!(room_id, connection_id = %connection_id, "Join refused, room full");
            return JoinOutcome::RoomFull;
        }

        let left = self.leave(connection_id);

        let room = match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let seed: u64 = self.seeds.gen();
                info!(room_id, seed, "Room created");
                entry.insert(Room::new(room_id.to_string(), seed, now))
            }
        };

        let Some(player) = room.add_player(connection_id) else {
            return JoinOutcome::AlreadyJoined;
        };
        let player_count = room.player_count();
        let players_ready = room.all_players_ready();
        self.membership.insert(connection_id, room_id.to_string());

        JoinOutcome::Joined {
            player,
            player_count,
            players_ready,
            left,
        }
    }

    /// Remove `connection_id` from its room, destroying the room if it empties
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let room_id = self.membership.remove(&connection_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        room.remove_player(connection_id);

        let departure = Departure {
            player_count: room.player_count(),
            players_ready: room.all_players_ready(),
            room_closed: room.is_empty(),
            room_id,
        };
        if departure.room_closed {
            self.rooms.remove(&departure.room_id);
            info!(room_id = %departure.room_id, "Room destroyed");
        }
        Some(departure)
    }

    /// Toggle ready in the caller's own room
    pub fn toggle_ready(&mut self, connection_id: ConnectionId, room_id: &str) -> Option<ReadyStatus> {
        self.own_room_mut(connection_id, room_id)?
            .toggle_ready(connection_id)
    }

    /// Start the caller's own room; returns the start time on success
    pub fn start_game(&mut self, connection_id: ConnectionId, room_id: &str, now: Millis) -> Option<Millis> {
        let room = self.own_room_mut(connection_id, room_id)?;
        if room.start_game(connection_id, now) {
            room.game_start_time()
        } else {
            None
        }
    }

    /// Route a control intent to the caller's room
    pub fn control(&mut self, connection_id: ConnectionId, intent: &ControlIntent) -> bool {
        let Some(room_id) = self.membership.get(&connection_id) else {
            return false;
        };
        self.rooms
            .get_mut(room_id)
            .is_some_and(|room| room.apply_control(connection_id, intent))
    }

    /// Step every room to `now`, each by its own elapsed time
    pub fn tick_all(&mut self, now: Millis) -> Vec<(RoomId, TickReport)> {
        self.rooms
            .iter_mut()
            .map(|(id, room)| (id.clone(), room.tick(now)))
            .collect()
    }

    fn own_room_mut(&mut self, connection_id: ConnectionId, room_id: &str) -> Option<&mut Room> {
        if self.membership.get(&connection_id).map(String::as_str) != Some(room_id) {
            debug!(room_id, connection_id = %connection_id, "Command for a room the sender is not in");
            return None;
        }
        self.rooms.get_mut(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Team;
    use crate::game::room::RoomPhase;
    use uuid::Uuid;

    fn joined(outcome: JoinOutcome) -> (Player, Option<Departure>) {
        match outcome {
            JoinOutcome::Joined { player, left, .. } => (player, left),
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn first_join_creates_room_and_last_leave_destroys_it() {
        let mut manager = RoomManager::with_seed(2, 1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (pa, _) = joined(manager.join(a, "bay", 0));
        assert!(pa.is_host);
        assert_eq!(manager.room_count(), 1);
        joined(manager.join(b, "bay", 0));
        assert_eq!(manager.player_count(), 2);
        assert_eq!(manager.members("bay"), vec![a, b]);

        let first = manager.leave(a).unwrap();
        assert_eq!(first.player_count, 1);
        assert!(!first.room_closed);

        let last = manager.leave(b).unwrap();
        assert!(last.room_closed);
        assert_eq!(manager.room_count(), 0);
        assert!(manager.leave(b).is_none());
    }

    #[test]
    fn room_full_and_duplicate_join() {
        let mut manager = RoomManager::with_seed(2, 1);
        let a = Uuid::new_v4();
        joined(manager.join(a, "bay", 0));
        joined(manager.join(Uuid::new_v4(), "bay", 0));

        assert_eq!(manager.join(a, "bay", 0), JoinOutcome::AlreadyJoined);
        assert_eq!(manager.join(Uuid::new_v4(), "bay", 0), JoinOutcome::RoomFull);
        assert_eq!(manager.room("bay").unwrap().player_count(), 2);
    }

    #[test]
    fn switching_rooms_leaves_previous_one() {
        let mut manager = RoomManager::with_seed(2, 1);
        let a = Uuid::new_v4();
        joined(manager.join(a, "north", 0));

        let (player, left) = joined(manager.join(a, "south", 0));
        let left = left.unwrap();
        assert_eq!(left.room_id, "north");
        assert!(left.room_closed);
        assert!(manager.room("north").is_none());
        assert_eq!(manager.room_of(a).map(String::as_str), Some("south"));
        assert_eq!(player.team, Team::Team1);
    }

    #[test]
    fn commands_only_reach_own_room() {
        let mut manager = RoomManager::with_seed(2, 1);
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        joined(manager.join(host, "bay", 0));
        joined(manager.join(guest, "bay", 0));
        joined(manager.join(outsider, "lagoon", 0));

        assert!(manager.toggle_ready(outsider, "bay").is_none());
        assert!(manager.start_game(outsider, "bay", 10).is_none());
        assert!(manager.toggle_ready(guest, "bay").unwrap().is_ready);

        assert!(manager.start_game(guest, "bay", 10).is_none());
        assert_eq!(manager.start_game(host, "bay", 10), Some(10));
        assert_eq!(manager.start_game(host, "bay", 20), None);
        assert_eq!(manager.room("bay").unwrap().phase(), RoomPhase::Running);
        assert_eq!(manager.room("lagoon").unwrap().phase(), RoomPhase::Lobby);
    }

    #[test]
    fn tick_all_steps_every_room() {
        let mut manager = RoomManager::with_seed(2, 1);
        let host = Uuid::new_v4();
        joined(manager.join(host, "bay", 0));
        joined(manager.join(Uuid::new_v4(), "bay", 0));
        joined(manager.join(Uuid::new_v4(), "lagoon", 0));
        manager.start_game(host, "bay", 0);

        let mut reports = manager.tick_all(16);
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, "bay");
        assert_eq!(reports[0].1.ships_spawned, 2);
        assert_eq!(reports[1].1.ships_spawned, 0);
    }
}
