//! Room state and the authoritative per-room tick

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::util::time::{delta_seconds, Millis};

use super::combat::{CombatSystem, Kill, Scores, RESPAWN_DELAY_MS};
use super::control::{ControlIntake, ControlIntent};
use super::entities::{Compaction, ConnectionId, EntityRegistry, ShipId, ShipSpawn, Team};
use super::layout::{ObstacleGenerator, SpawnPoints};
use super::physics::{PhysicsSystem, ShipStats};
use super::timers::TimerQueue;

/// Client-chosen room name
pub type RoomId = String;

/// Number of staggered spawn waves at match start
pub const SPAWN_WAVES: u8 = 5;
/// Delay between two spawn waves
pub const SPAWN_WAVE_INTERVAL_MS: Millis = 3_000;
/// Ships appear within this distance of their base on each axis
pub const SPAWN_JITTER: f32 = 30.0;
/// Players needed before a match can start or everyone counts as ready
pub const MIN_PLAYERS: usize = 2;

/// Room phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Accepting joins and ready toggles
    Lobby,
    /// Match in progress
    Running,
    /// A team reached the winning score; simulation is frozen
    Ended,
}

/// A seat in the room roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ConnectionId,
    pub team: Team,
    pub ready: bool,
    pub is_host: bool,
}

/// Result of a ready toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyStatus {
    pub is_ready: bool,
    pub all_players_ready: bool,
    pub player_count: usize,
}

/// Deferred room actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomTimer {
    SpawnWave { wave: u8 },
    Respawn { owner: ConnectionId, team: Team },
}

/// What happened during one room tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub ships_spawned: usize,
    pub kills: Vec<Kill>,
    pub removed: Compaction,
    /// Set on the tick the match ends
    pub winner: Option<Team>,
}

/// One match: roster, entity registry, score and pending timers
pub struct Room {
    id: RoomId,
    players: Vec<Player>,
    pub(crate) registry: EntityRegistry,
    scores: Scores,
    phase: RoomPhase,
    game_start_time: Option<Millis>,
    last_update: Millis,
    spawn_points: SpawnPoints,
    timers: TimerQueue<RoomTimer>,
    stats: ShipStats,
    rng: ChaCha8Rng,
}

impl Room {
    /// Create a room with randomly chosen bases and generated terrain
    pub fn new(id: RoomId, seed: u64, now: Millis) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spawn_points = SpawnPoints::choose(&mut rng);
        let plans = ObstacleGenerator::default().generate(&mut rng, &spawn_points);

        let mut registry = EntityRegistry::new();
        for plan in plans {
            registry.add_obstacle(plan.kind, plan.position, plan.radius, plan.variant);
        }

        debug!(
            room_id = %id,
            seed,
            obstacles = registry.obstacles.len(),
            "Room created"
        );

        Self {
            id,
            players: Vec::new(),
            registry,
            scores: Scores::default(),
            phase: RoomPhase::Lobby,
            game_start_time: None,
            last_update: now,
            spawn_points,
            timers: TimerQueue::new(),
            stats: ShipStats::default(),
            rng,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RoomPhase::Running
    }

    pub fn game_start_time(&self) -> Option<Millis> {
        self.game_start_time
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn spawn_points(&self) -> &SpawnPoints {
        &self.spawn_points
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Seat a new player. The first player into a room without a host hosts it;
    /// team1 goes to whoever joins while team1 is empty, everyone else is team2.
    /// Returns `None` if the connection is already seated.
    pub fn add_player(&mut self, id: ConnectionId) -> Option<Player> {
        if self.player(id).is_some() {
            return None;
        }

        let is_host = !self.players.iter().any(|p| p.is_host);
        let team = if self.players.iter().any(|p| p.team == Team::Team1) {
            Team::Team2
        } else {
            Team::Team1
        };

        let player = Player {
            id,
            team,
            ready: false,
            is_host,
        };
        self.players.push(player.clone());

        info!(
            room_id = %self.id,
            connection_id = %id,
            team = %team,
            is_host,
            player_count = self.players.len(),
            "Player joined room"
        );
        Some(player)
    }

    /// Drop a player and every ship they own
    pub fn remove_player(&mut self, id: ConnectionId) -> bool {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return false;
        };
        self.players.remove(index);
        let sunk = self.registry.remove_ships_owned_by(id);

        info!(
            room_id = %self.id,
            connection_id = %id,
            ships_removed = sunk,
            player_count = self.players.len(),
            "Player left room"
        );
        true
    }

    pub fn toggle_ready(&mut self, id: ConnectionId) -> Option<ReadyStatus> {
        let player = self.players.iter_mut().find(|p| p.id == id)?;
        player.ready = !player.ready;
        let is_ready = player.ready;

        Some(ReadyStatus {
            is_ready,
            all_players_ready: self.all_players_ready(),
            player_count: self.players.len(),
        })
    }

    pub fn all_players_ready(&self) -> bool {
        self.players.len() >= MIN_PLAYERS && self.players.iter().all(|p| p.ready)
    }

    /// Start the match if `by` is the host, the room is in the lobby and
    /// enough players are seated. Returns false (and changes nothing) otherwise.
    pub fn start_game(&mut self, by: ConnectionId, now: Millis) -> bool {
        let is_host = self.player(by).is_some_and(|p| p.is_host);
        if self.phase != RoomPhase::Lobby || !is_host || self.players.len() < MIN_PLAYERS {
            debug!(
                room_id = %self.id,
                connection_id = %by,
                phase = ?self.phase,
                is_host,
                player_count = self.players.len(),
                "Start request rejected"
            );
            return false;
        }

        self.phase = RoomPhase::Running;
        self.game_start_time = Some(now);
        for wave in 0..SPAWN_WAVES {
            self.timers.schedule(
                now + wave as Millis * SPAWN_WAVE_INTERVAL_MS,
                RoomTimer::SpawnWave { wave },
            );
        }

        info!(room_id = %self.id, player_count = self.players.len(), "Match started");
        true
    }

    /// Route a control intent to a ship the sender owns. Foreign or unknown
    /// ships, and rooms that are not running, ignore the request.
    pub fn apply_control(&mut self, from: ConnectionId, intent: &ControlIntent) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.registry.owned_ship_mut(from, intent.ship_id) {
            Some(ship) => ControlIntake::apply(ship, intent, &self.stats),
            None => false,
        }
    }

    /// Advance the room to `now`: fire due timers, then simulate the elapsed time
    pub fn tick(&mut self, now: Millis) -> TickReport {
        let mut report = TickReport::default();
        let dt = delta_seconds(self.last_update, now);
        self.last_update = now;

        self.fire_timers(now, &mut report);

        if !self.is_running() {
            return report;
        }

        let step = PhysicsSystem::step(&mut self.registry, &self.stats, dt, now);

        let collisions = CombatSystem::resolve(&mut self.registry, &mut self.scores);
        for kill in &collisions.kills {
            info!(
                room_id = %self.id,
                victim = %kill.victim_id,
                killer = %kill.killer_id,
                team1 = self.scores.team1,
                team2 = self.scores.team2,
                "Ship sunk"
            );
            self.timers.schedule(
                now + RESPAWN_DELAY_MS,
                RoomTimer::Respawn {
                    owner: kill.victim_owner,
                    team: kill.victim_team,
                },
            );
        }
        report.removed = self.registry.compact();

        if step.shots_fired > 0
            || collisions.ship_hits > 0
            || collisions.obstacle_hits > 0
            || report.removed != Compaction::default()
        {
            debug!(
                room_id = %self.id,
                shots = step.shots_fired,
                wall_bounces = step.wall_bounces,
                ship_hits = collisions.ship_hits,
                obstacle_hits = collisions.obstacle_hits,
                groundings = collisions.groundings,
                ships_removed = report.removed.ships,
                projectiles_removed = report.removed.projectiles,
                obstacles_removed = report.removed.obstacles,
                "Tick activity"
            );
        }
        report.kills = collisions.kills;

        if let Some(winner) = self.scores.winner() {
            self.phase = RoomPhase::Ended;
            report.winner = Some(winner);
            info!(
                room_id = %self.id,
                winner = %winner,
                team1 = self.scores.team1,
                team2 = self.scores.team2,
                "Match ended"
            );
        }

        report
    }

    /// Drain due timers. Each one re-checks that the match is still running
    /// when it fires; stale ones are discarded.
    fn fire_timers(&mut self, now: Millis, report: &mut TickReport) {
        while let Some((fire_at, timer)) = self.timers.pop_due(now) {
            if !self.is_running() {
                debug!(room_id = %self.id, fire_at, ?timer, "Dropping timer, match not running");
                continue;
            }

            match timer {
                RoomTimer::SpawnWave { wave } => {
                    let roster: Vec<(ConnectionId, Team)> =
                        self.players.iter().map(|p| (p.id, p.team)).collect();
                    for (owner, team) in roster {
                        if self.spawn_ship(owner, team, now).is_some() {
                            report.ships_spawned += 1;
                        }
                    }
                    debug!(room_id = %self.id, wave, ships = self.registry.ships.len(), "Spawn wave");
                }
                RoomTimer::Respawn { owner, team } => {
                    if self.player(owner).is_some() && self.spawn_ship(owner, team, now).is_some() {
                        report.ships_spawned += 1;
                    }
                }
            }
        }
    }

    /// Launch a ship near the team's base, facing the enemy base
    fn spawn_ship(&mut self, owner: ConnectionId, team: Team, now: Millis) -> Option<ShipId> {
        let base = self.spawn_points.for_team(team);
        let mut position = base;
        position.x += self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER);
        position.y += self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER);

        self.registry.spawn_ship(ShipSpawn {
            owner,
            team,
            position,
            heading: self.spawn_points.heading_for(team),
            now,
        })
    }
}
