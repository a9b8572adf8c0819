//! Entity registry: ships, projectiles and obstacles owned by one room

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::time::Millis;

/// Stable identity of a transport connection (one per player)
pub type ConnectionId = Uuid;

/// World width in world units
pub const WORLD_WIDTH: f32 = 1000.0;
/// World height in world units
pub const WORLD_HEIGHT: f32 = 700.0;

/// Most ships a single player may have afloat at once
pub const MAX_SHIPS_PER_PLAYER: u8 = 5;

macro_rules! entity_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

entity_id!(ShipId, "ship");
entity_id!(ProjectileId, "cannonball");
entity_id!(ObstacleId, "obstacle");

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Team1,
    Team2,
}

impl Team {
    pub fn opponent(self) -> Self {
        match self {
            Team::Team1 => Team::Team2,
            Team::Team2 => Team::Team1,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Team1 => f.write_str("team1"),
            Team::Team2 => f.write_str("team2"),
        }
    }
}

/// A position in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Bearing in radians from this point toward `other`
    pub fn bearing_to(&self, other: Point) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Per-ship upgrade counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Upgrades {
    pub health: u32,
    pub damage: u32,
    pub rate_of_fire: u32,
    pub speed: u32,
}

impl Upgrades {
    pub fn total(&self) -> u32 {
        self.health + self.damage + self.rate_of_fire + self.speed
    }
}

/// Tier from upgrades plus kill progress, capped at 5
pub fn tier_for(upgrades: &Upgrades, kill_tier_progress: f32) -> u8 {
    let progress = upgrades.total() as f32 + kill_tier_progress;
    ((progress / 2.0).floor() as u8).saturating_add(1).min(5)
}

/// An authoritative ship
#[derive(Debug, Clone)]
pub struct Ship {
    pub id: ShipId,
    pub owner: ConnectionId,
    pub team: Team,
    /// Per-owner slot 1..=5, reused once the ship sinks
    pub slot: u8,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub rudder_angle: f32,
    pub target_rudder_angle: f32,
    pub cannon_angle: f32,
    pub speed: f32,
    pub target_speed: f32,

    // Combat
    pub health: f32,
    pub max_health: f32,
    pub last_shot: Millis,
    pub shot_cooldown: Millis,
    pub spawn_time: Millis,

    // Progression
    pub upgrades: Upgrades,
    pub kill_tier_progress: f32,
    pub tier: u8,
}

impl Ship {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Credit one kill toward the next tier
    pub fn award_kill(&mut self) {
        self.kill_tier_progress += super::combat::KILL_TIER_PROGRESS;
        self.tier = tier_for(&self.upgrades, self.kill_tier_progress);
    }
}

/// A cannonball in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub shooter_id: ShipId,
    pub shooter_team: Team,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub speed: f32,
    pub dead: bool,
}

/// Obstacle kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    /// Never destroyed
    Island,
    /// Shrinks under fire and eventually breaks up
    Iceberg,
}

/// Terrain
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Only icebergs carry health
    pub health: Option<i32>,
    /// Cosmetic sprite index, ignored by the simulation
    pub variant: u8,
    pub dead: bool,
}

/// Everything a spawn needs besides the ids the registry hands out
#[derive(Debug, Clone, Copy)]
pub struct ShipSpawn {
    pub owner: ConnectionId,
    pub team: Team,
    pub position: Point,
    pub heading: f32,
    pub now: Millis,
}

/// Counts of entities removed by one compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compaction {
    pub ships: usize,
    pub projectiles: usize,
    pub obstacles: usize,
}

/// Mutable world state of one room.
///
/// Entities are stored in plain vectors and flagged dead in place during a
/// tick; [`EntityRegistry::compact`] drops them once at the end of the tick so
/// ids stay resolvable while collisions cross-reference shooters.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    pub ships: Vec<Ship>,
    pub projectiles: Vec<Projectile>,
    pub obstacles: Vec<Obstacle>,
    next_ship_id: u64,
    next_projectile_id: u64,
    next_obstacle_id: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            next_ship_id: 1,
            next_projectile_id: 1,
            next_obstacle_id: 1,
            ..Default::default()
        }
    }

    /// Lowest free slot for `owner`, or `None` when all five are afloat
    pub fn free_slot(&self, owner: ConnectionId) -> Option<u8> {
        (1..=MAX_SHIPS_PER_PLAYER).find(|slot| {
            !self
                .ships
                .iter()
                .any(|s| s.owner == owner && s.is_alive() && s.slot == *slot)
        })
    }

    /// Spawn a fresh ship. Returns `None` if the owner already has five afloat.
    pub fn spawn_ship(&mut self, spawn: ShipSpawn) -> Option<ShipId> {
        let slot = self.free_slot(spawn.owner)?;
        let id = ShipId(self.next_ship_id);
        self.next_ship_id += 1;

        let stats = super::physics::ShipStats::default();
        let max_health = super::combat::SHIP_MAX_HEALTH;
        self.ships.push(Ship {
            id,
            owner: spawn.owner,
            team: spawn.team,
            slot,
            x: spawn.position.x.clamp(0.0, WORLD_WIDTH),
            y: spawn.position.y.clamp(0.0, WORLD_HEIGHT),
            heading: spawn.heading,
            rudder_angle: 0.0,
            target_rudder_angle: 0.0,
            cannon_angle: spawn.heading,
            speed: stats.base_speed,
            target_speed: stats.base_speed,
            health: max_health,
            max_health,
            last_shot: spawn.now,
            shot_cooldown: super::combat::SHOT_COOLDOWN_MS,
            spawn_time: spawn.now,
            upgrades: Upgrades::default(),
            kill_tier_progress: 0.0,
            tier: 1,
        });
        Some(id)
    }

    pub fn spawn_projectile(
        &mut self,
        shooter_id: ShipId,
        shooter_team: Team,
        origin: Point,
        angle: f32,
        speed: f32,
    ) -> ProjectileId {
        let id = ProjectileId(self.next_projectile_id);
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile {
            id,
            shooter_id,
            shooter_team,
            x: origin.x,
            y: origin.y,
            angle,
            speed,
            dead: false,
        });
        id
    }

    pub fn add_obstacle(
        &mut self,
        kind: ObstacleKind,
        position: Point,
        radius: f32,
        variant: u8,
    ) -> ObstacleId {
        let id = ObstacleId(self.next_obstacle_id);
        self.next_obstacle_id += 1;
        let health = match kind {
            ObstacleKind::Island => None,
            ObstacleKind::Iceberg => Some(super::combat::ICEBERG_HEALTH),
        };
        self.obstacles.push(Obstacle {
            id,
            kind,
            x: position.x,
            y: position.y,
            radius,
            health,
            variant,
            dead: false,
        });
        id
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id == id)
    }

    pub fn ship_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.id == id)
    }

    /// A live ship, only if `owner` owns it
    pub fn owned_ship_mut(&mut self, owner: ConnectionId, id: ShipId) -> Option<&mut Ship> {
        self.ships
            .iter_mut()
            .find(|s| s.id == id && s.owner == owner && s.is_alive())
    }

    pub fn ships_owned_by(&self, owner: ConnectionId) -> usize {
        self.ships
            .iter()
            .filter(|s| s.owner == owner && s.is_alive())
            .count()
    }

    /// Drop every ship belonging to `owner`, returning how many were removed
    pub fn remove_ships_owned_by(&mut self, owner: ConnectionId) -> usize {
        let before = self.ships.len();
        self.ships.retain(|s| s.owner != owner);
        before - self.ships.len()
    }

    /// End-of-tick cleanup of sunk ships, spent projectiles and broken obstacles
    pub fn compact(&mut self) -> Compaction {
        let ships = self.ships.len();
        let projectiles = self.projectiles.len();
        let obstacles = self.obstacles.len();

        self.ships.retain(Ship::is_alive);
        self.projectiles.retain(|p| !p.dead);
        self.obstacles.retain(|o| !o.dead);

        Compaction {
            ships: ships - self.ships.len(),
            projectiles: projectiles - self.projectiles.len(),
            obstacles: obstacles - self.obstacles.len(),
        }
    }
}
