//! Read-only view of active rooms for the HTTP surface

use dashmap::DashMap;
use serde::Serialize;

use super::combat::Scores;
use super::manager::RoomManager;
use super::room::{RoomId, RoomPhase};

/// Public summary of one room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub player_count: usize,
    pub phase: RoomPhase,
    pub scores: Scores,
}

/// Registry of room summaries, written by the scheduler after each tick
pub struct RoomDirectory {
    rooms: DashMap<RoomId, RoomSummary>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomSummary> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// All rooms, sorted by id
    pub fn list(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count).sum()
    }

    /// Mirror the manager's rooms, dropping summaries of destroyed rooms
    pub fn refresh(&self, manager: &RoomManager) {
        self.rooms.retain(|id, _| manager.room(id).is_some());
        for room in manager.rooms() {
            let summary = RoomSummary {
                room_id: room.id().to_string(),
                player_count: room.player_count(),
                phase: room.phase(),
                scores: room.scores(),
            };
            self.rooms.insert(summary.room_id.clone(), summary);
        }
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
