//! Broadcast scheduler: the single task that owns every room

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{tick_interval, unix_millis, Millis};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::directory::RoomDirectory;
use super::entities::ConnectionId;
use super::manager::{Departure, JoinOutcome, RoomManager};
use super::snapshot::{SnapshotBuilder, SnapshotStats};

/// Queue of pre-serialized frames for one connection
pub type Outbox = mpsc::Sender<Arc<str>>;

/// Capacity of the command channel into the scheduler
const COMMAND_CAPACITY: usize = 1024;
/// How often broadcast volume is logged
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Requests from transport tasks
#[derive(Debug)]
pub enum RoomCommand {
    /// A socket opened; frames for it go to `outbox`
    Connect {
        connection_id: ConnectionId,
        outbox: Outbox,
    },
    /// A parsed client message
    Message {
        connection_id: ConnectionId,
        msg: ClientMsg,
    },
    /// The socket closed; treated as a leave
    Disconnect { connection_id: ConnectionId },
}

/// Scheduler settings
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_rate: u32,
    pub max_room_players: usize,
}

/// Cloneable sender side of the scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl SchedulerHandle {
    /// Queue a command. Returns false once the scheduler has stopped.
    pub async fn send(&self, command: RoomCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }
}

/// Owns the room manager and every connection's outbox. Transport tasks talk
/// to it only through [`RoomCommand`]s, so room state needs no locks.
pub struct Scheduler {
    manager: RoomManager,
    outboxes: HashMap<ConnectionId, Outbox>,
    commands: mpsc::Receiver<RoomCommand>,
    directory: Arc<RoomDirectory>,
    config: SchedulerConfig,
    stats: SnapshotStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, directory: Arc<RoomDirectory>) -> (Self, SchedulerHandle) {
        Self::with_manager(config, RoomManager::new(config.max_room_players), directory)
    }

    pub fn with_manager(
        config: SchedulerConfig,
        manager: RoomManager,
        directory: Arc<RoomDirectory>,
    ) -> (Self, SchedulerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let scheduler = Self {
            manager,
            outboxes: HashMap::new(),
            commands,
            directory,
            config,
            stats: SnapshotStats::default(),
        };
        (scheduler, SchedulerHandle { tx })
    }

    pub fn manager(&self) -> &RoomManager {
        &self.manager
    }

    /// Run the fixed-rate loop until every handle has been dropped
    pub async fn run(mut self) {
        info!(tick_rate = self.config.tick_rate, "Scheduler started");

        let mut ticker = interval(tick_interval(self.config.tick_rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_stats_log = tokio::time::Instant::now();

        loop {
            ticker.tick().await;
            let now = unix_millis();

            if !self.drain_commands(now) {
                break;
            }
            self.tick(now);

            if last_stats_log.elapsed() >= STATS_LOG_INTERVAL {
                last_stats_log = tokio::time::Instant::now();
                debug!(
                    snapshots = self.stats.total_snapshots,
                    avg_bytes = self.stats.avg_bytes(),
                    dropped_frames = self.stats.dropped_frames,
                    rooms = self.manager.room_count(),
                    "Broadcast stats"
                );
            }
        }

        info!("Scheduler stopped");
    }

    /// Apply every queued command. Returns false when the channel is closed.
    fn drain_commands(&mut self, now: Millis) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command, now),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    pub fn handle_command(&mut self, command: RoomCommand, now: Millis) {
        match command {
            RoomCommand::Connect {
                connection_id,
                outbox,
            } => {
                self.outboxes.insert(connection_id, outbox);
                self.send_to(
                    connection_id,
                    &ServerMsg::Welcome {
                        connection_id,
                        server_time: now,
                    },
                );
            }
            RoomCommand::Disconnect { connection_id } => {
                if let Some(departure) = self.manager.leave(connection_id) {
                    self.announce_departure(connection_id, &departure);
                }
                self.outboxes.remove(&connection_id);
                self.directory.refresh(&self.manager);
            }
            RoomCommand::Message { connection_id, msg } => {
                self.handle_message(connection_id, msg, now);
            }
        }
    }

    fn handle_message(&mut self, connection_id: ConnectionId, msg: ClientMsg, now: Millis) {
        match msg {
            ClientMsg::JoinRoom { room_id } => self.handle_join(connection_id, room_id, now),
            ClientMsg::LeaveRoom => {
                if let Some(departure) = self.manager.leave(connection_id) {
                    self.announce_departure(connection_id, &departure);
                    self.directory.refresh(&self.manager);
                }
            }
            ClientMsg::ToggleReady { room_id } => {
                let Some(status) = self.manager.toggle_ready(connection_id, &room_id) else {
                    return;
                };
                self.send_to(
                    connection_id,
                    &ServerMsg::PlayerReadyStatus {
                        is_ready: status.is_ready,
                        all_players_ready: status.all_players_ready,
                        player_count: status.player_count,
                    },
                );
                self.send_to_room(
                    &room_id,
                    Some(connection_id),
                    &ServerMsg::PlayersReady {
                        player_count: status.player_count,
                        players_ready: status.all_players_ready,
                    },
                );
            }
            ClientMsg::StartGame { room_id } => {
                if let Some(game_start_time) = self.manager.start_game(connection_id, &room_id, now) {
                    self.send_to_room(&room_id, None, &ServerMsg::GameStarted { game_start_time });
                }
            }
            ClientMsg::ShipControl(intent) => {
                if !self.manager.control(connection_id, &intent) {
                    debug!(connection_id = %connection_id, ship_id = %intent.ship_id, "Control ignored");
                }
            }
            ClientMsg::Ping { t } => self.send_to(connection_id, &ServerMsg::Pong { t }),
        }
    }

    fn handle_join(&mut self, connection_id: ConnectionId, room_id: String, now: Millis) {
        if room_id.trim().is_empty() {
            self.send_to(connection_id, &ServerMsg::error("invalid_room", "Room id must not be empty"));
            return;
        }

        match self.manager.join(connection_id, &room_id, now) {
            JoinOutcome::Joined {
                player,
                player_count,
                players_ready,
                left,
            } => {
                if let Some(departure) = left {
                    self.announce_departure(connection_id, &departure);
                }

                if let Some(room) = self.manager.room(&room_id) {
                    let state = Box::new(SnapshotBuilder::build(room, now));
                    self.send_to(
                        connection_id,
                        &ServerMsg::JoinedRoom {
                            room_id: room_id.clone(),
                            player_id: connection_id,
                            team: player.team,
                            is_host: player.is_host,
                            player_count,
                            players_ready,
                            state,
                        },
                    );
                }
                self.send_to_room(
                    &room_id,
                    Some(connection_id),
                    &ServerMsg::PlayerJoined {
                        player_id: connection_id,
                        player_count,
                        players_ready,
                    },
                );
                self.directory.refresh(&self.manager);
            }
            JoinOutcome::RoomFull => {
                warn!(room_id = %room_id, connection_id = %connection_id, "Room full");
                self.send_to(
                    connection_id,
                    &ServerMsg::error(
                        "room_full",
                        format!("Room {room_id} already has {} players", self.config.max_room_players),
                    ),
                );
            }
            JoinOutcome::AlreadyJoined => {
                debug!(room_id = %room_id, connection_id = %connection_id, "Already in room");
            }
        }
    }

    fn announce_departure(&mut self, connection_id: ConnectionId, departure: &Departure) {
        if departure.room_closed {
            return;
        }
        self.send_to_room(
            &departure.room_id,
            None,
            &ServerMsg::PlayerLeft {
                player_id: connection_id,
                player_count: departure.player_count,
                players_ready: departure.players_ready,
            },
        );
    }

    /// Step every room and publish its snapshot
    pub fn tick(&mut self, now: Millis) {
        for (room_id, report) in self.manager.tick_all(now) {
            if let Some(winner) = report.winner {
                let scores = self
                    .manager
                    .room(&room_id)
                    .map(|r| r.scores())
                    .unwrap_or_default();
                self.send_to_room(&room_id, None, &ServerMsg::GameOver { winner, scores });
            }
        }

        self.directory.refresh(&self.manager);

        let frames: Vec<(Vec<ConnectionId>, Arc<str>)> = self
            .manager
            .rooms()
            .filter_map(|room| {
                let msg = ServerMsg::GameState(Box::new(SnapshotBuilder::build(room, now)));
                let frame = SnapshotBuilder::encode(&msg)?;
                Some((room.players().iter().map(|p| p.id).collect(), frame))
            })
            .collect();

        for (members, frame) in frames {
            self.stats.record(frame.len());
            for member in members {
                self.push(member, frame.clone());
            }
        }
    }

    fn send_to(&mut self, connection_id: ConnectionId, msg: &ServerMsg) {
        if let Some(frame) = SnapshotBuilder::encode(msg) {
            self.push(connection_id, frame);
        }
    }

    /// Send to every member of `room_id`, optionally skipping one connection
    fn send_to_room(&mut self, room_id: &str, except: Option<ConnectionId>, msg: &ServerMsg) {
        let Some(frame) = SnapshotBuilder::encode(msg) else {
            return;
        };
        for member in self.manager.members(room_id) {
            if Some(member) != except {
                self.push(member, frame.clone());
            }
        }
    }

    /// Non-blocking enqueue; a full outbox drops the frame
    fn push(&mut self, connection_id: ConnectionId, frame: Arc<str>) {
        let Some(outbox) = self.outboxes.get(&connection_id) else {
            return;
        };
        match outbox.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.dropped_frames += 1;
                warn!(connection_id = %connection_id, "Outbox full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %connection_id, "Outbox closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::RoomPhase;
    use uuid::Uuid;

    fn scheduler() -> Scheduler {
        let config = SchedulerConfig {
            tick_rate: 60,
            max_room_players: 2,
        };
        let (scheduler, _handle) =
            Scheduler::with_manager(config, RoomManager::with_seed(2, 11), Arc::new(RoomDirectory::new()));
        scheduler
    }

    fn connect(scheduler: &mut Scheduler, capacity: usize) -> (ConnectionId, mpsc::Receiver<Arc<str>>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity);
        scheduler.handle_command(
            RoomCommand::Connect {
                connection_id: id,
                outbox: tx,
            },
            0,
        );
        (id, rx)
    }

    fn message(scheduler: &mut Scheduler, connection_id: ConnectionId, msg: ClientMsg, now: Millis) {
        scheduler.handle_command(RoomCommand::Message { connection_id, msg }, now);
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    fn types(frames: &[serde_json::Value]) -> Vec<&str> {
        frames.iter().map(|f| f["type"].as_str().unwrap()).collect()
    }

    #[test]
    fn join_flow_notifies_both_sides() {
        let mut s = scheduler();
        let (a, mut rx_a) = connect(&mut s, 16);
        let (b, mut rx_b) = connect(&mut s, 16);

        message(&mut s, a, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        message(&mut s, b, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);

        let frames_a = drain(&mut rx_a);
        assert_eq!(types(&frames_a), vec!["welcome", "joined_room", "player_joined"]);
        assert_eq!(frames_a[1]["is_host"], true);
        assert_eq!(frames_a[1]["team"], "team1");
        assert_eq!(frames_a[2]["player_count"], 2);

        let frames_b = drain(&mut rx_b);
        assert_eq!(types(&frames_b), vec!["welcome", "joined_room"]);
        assert_eq!(frames_b[1]["team"], "team2");
        assert_eq!(frames_b[1]["state"]["player_count"], 2);
    }

    #[test]
    fn third_player_gets_room_full() {
        let mut s = scheduler();
        let mut rxs = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (id, rx) = connect(&mut s, 16);
            message(&mut s, id, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
            ids.push(id);
            rxs.push(rx);
        }

        let frames = drain(&mut rxs[2]);
        assert_eq!(frames[1]["type"], "error");
        assert_eq!(frames[1]["code"], "room_full");
        assert_eq!(s.manager().room("bay").unwrap().player_count(), 2);
        assert!(s.manager().room_of(ids[2]).is_none());
    }

    #[test]
    fn ready_start_and_snapshot_broadcast() {
        let mut s = scheduler();
        let (a, mut rx_a) = connect(&mut s, 64);
        let (b, mut rx_b) = connect(&mut s, 64);
        message(&mut s, a, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        message(&mut s, b, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        drain(&mut rx_a);
        drain(&mut rx_b);

        message(&mut s, b, ClientMsg::ToggleReady { room_id: "bay".into() }, 0);
        assert_eq!(types(&drain(&mut rx_b)), vec!["player_ready_status"]);
        assert_eq!(types(&drain(&mut rx_a)), vec!["players_ready"]);

        message(&mut s, b, ClientMsg::StartGame { room_id: "bay".into() }, 10);
        assert!(drain(&mut rx_a).is_empty());

        message(&mut s, a, ClientMsg::StartGame { room_id: "bay".into() }, 10);
        let started = drain(&mut rx_b);
        assert_eq!(started[0]["type"], "game_started");
        assert_eq!(started[0]["game_start_time"], 10);
        drain(&mut rx_a);

        s.tick(20);
        let frames = drain(&mut rx_a);
        assert_eq!(types(&frames), vec!["game_state"]);
        assert_eq!(frames[0]["ships"].as_array().unwrap().len(), 2);
        assert_eq!(frames[0]["game_started"], true);
        assert_eq!(s.manager().room("bay").unwrap().phase(), RoomPhase::Running);
    }

    #[test]
    fn disconnect_is_a_leave() {
        let mut s = scheduler();
        let (a, mut rx_a) = connect(&mut s, 16);
        let (b, _rx_b) = connect(&mut s, 16);
        message(&mut s, a, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        message(&mut s, b, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        drain(&mut rx_a);

        s.handle_command(RoomCommand::Disconnect { connection_id: b }, 5);
        let frames = drain(&mut rx_a);
        assert_eq!(frames[0]["type"], "player_left");
        assert_eq!(frames[0]["player_count"], 1);
        assert_eq!(s.directory.get("bay").unwrap().player_count, 1);
    }

    #[test]
    fn full_outbox_drops_frames_without_blocking() {
        let mut s = scheduler();
        let (a, mut rx_a) = connect(&mut s, 2);
        message(&mut s, a, ClientMsg::JoinRoom { room_id: "bay".into() }, 0);
        for now in 1..10 {
            s.tick(now);
        }
        assert_eq!(drain(&mut rx_a).len(), 2);
        assert!(s.stats.dropped_frames > 0);
    }

    #[test]
    fn ping_is_answered() {
        let mut s = scheduler();
        let (a, mut rx_a) = connect(&mut s, 4);
        message(&mut s, a, ClientMsg::Ping { t: 77 }, 0);
        let frames = drain(&mut rx_a);
        assert_eq!(frames[1]["type"], "pong");
        assert_eq!(frames[1]["t"], 77);
    }
}
