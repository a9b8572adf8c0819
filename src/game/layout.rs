//! Arena layout - team spawn points and procedural obstacle placement

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entities::{ObstacleKind, Point, Team};

/// Islands keep at least this far from either spawn point
pub const MIN_SPAWN_DISTANCE: f32 = 150.0;
/// Extra spacing between islands on top of the new island's radius
pub const ISLAND_SPACING: f32 = 200.0;
/// Placement attempts per island before the best candidate is taken
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 20;

/// Candidate team bases; one pair is drawn per room
const SPAWN_LAYOUTS: [(Point, Point); 3] = [
    (Point::new(100.0, 620.0), Point::new(900.0, 80.0)),
    (Point::new(100.0, 80.0), Point::new(900.0, 620.0)),
    (Point::new(80.0, 350.0), Point::new(920.0, 350.0)),
];

/// The team bases of one room
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoints {
    pub team1: Point,
    pub team2: Point,
}

impl Default for SpawnPoints {
    fn default() -> Self {
        let (team1, team2) = SPAWN_LAYOUTS[0];
        Self { team1, team2 }
    }
}

impl SpawnPoints {
    pub fn choose<R: Rng>(rng: &mut R) -> Self {
        let (team1, team2) = SPAWN_LAYOUTS[rng.gen_range(0..SPAWN_LAYOUTS.len())];
        Self { team1, team2 }
    }

    pub fn for_team(&self, team: Team) -> Point {
        match team {
            Team::Team1 => self.team1,
            Team::Team2 => self.team2,
        }
    }

    /// Ships leave port facing the enemy base
    pub fn heading_for(&self, team: Team) -> f32 {
        self.for_team(team).bearing_to(self.for_team(team.opponent()))
    }
}

/// Tuning for obstacle generation
#[derive(Debug, Clone)]
pub struct ObstacleConfig {
    pub islands: std::ops::RangeInclusive<usize>,
    pub icebergs: std::ops::RangeInclusive<usize>,
    pub island_area: (std::ops::Range<f32>, std::ops::Range<f32>),
    pub iceberg_area: (std::ops::Range<f32>, std::ops::Range<f32>),
    pub island_radius: std::ops::Range<f32>,
    pub iceberg_radius: std::ops::Range<f32>,
    pub island_variants: u8,
    pub iceberg_variants: u8,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            islands: 2..=4,
            icebergs: 2..=5,
            island_area: (200.0..800.0, 150.0..550.0),
            iceberg_area: (150.0..850.0, 100.0..600.0),
            island_radius: 30.0..50.0,
            iceberg_radius: 20.0..35.0,
            island_variants: 6,
            iceberg_variants: 12,
        }
    }
}

/// An obstacle to be registered with a room
#[derive(Debug, Clone, PartialEq)]
pub struct ObstaclePlan {
    pub kind: ObstacleKind,
    pub position: Point,
    pub radius: f32,
    pub variant: u8,
}

/// Outcome of placing one island
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub position: Point,
    pub attempts: u32,
    /// False when the attempt budget ran out and the best candidate was kept
    pub satisfied: bool,
}

/// Generates the terrain of a room
pub struct ObstacleGenerator {
    config: ObstacleConfig,
}

impl ObstacleGenerator {
    pub fn new(config: ObstacleConfig) -> Self {
        Self { config }
    }

    /// Islands first (constrained), then icebergs (anywhere in their area)
    pub fn generate<R: Rng>(&self, rng: &mut R, spawns: &SpawnPoints) -> Vec<ObstaclePlan> {
        let cfg = &self.config;
        let island_count = rng.gen_range(cfg.islands.clone());
        let iceberg_count = rng.gen_range(cfg.icebergs.clone());
        let mut plans: Vec<ObstaclePlan> = Vec::with_capacity(island_count + iceberg_count);

        for _ in 0..island_count {
            let radius = rng.gen_range(cfg.island_radius.clone());
            let placement = self.place_island(rng, spawns, &plans, radius);
            if !placement.satisfied {
                debug!(
                    attempts = placement.attempts,
                    x = placement.position.x,
                    y = placement.position.y,
                    "Island placed without meeting spacing constraints"
                );
            }
            plans.push(ObstaclePlan {
                kind: ObstacleKind::Island,
                position: placement.position,
                radius,
                variant: rng.gen_range(0..cfg.island_variants),
            });
        }

        for _ in 0..iceberg_count {
            let (xs, ys) = &cfg.iceberg_area;
            plans.push(ObstaclePlan {
                kind: ObstacleKind::Iceberg,
                position: Point::new(rng.gen_range(xs.clone()), rng.gen_range(ys.clone())),
                radius: rng.gen_range(cfg.iceberg_radius.clone()),
                variant: rng.gen_range(0..cfg.iceberg_variants),
            });
        }

        plans
    }

    /// Try up to [`MAX_PLACEMENT_ATTEMPTS`] positions for an island of `radius`.
    /// Never fails: if no candidate satisfies every constraint, the one that
    /// violates them least is returned.
    pub fn place_island<R: Rng>(
        &self,
        rng: &mut R,
        spawns: &SpawnPoints,
        placed: &[ObstaclePlan],
        radius: f32,
    ) -> Placement {
        let (xs, ys) = &self.config.island_area;
        let mut best: Option<(Point, f32)> = None;

        for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
            let candidate = Point::new(rng.gen_range(xs.clone()), rng.gen_range(ys.clone()));
            let slack = island_slack(candidate, radius, spawns, placed);

            if slack >= 0.0 {
                return Placement {
                    position: candidate,
                    attempts: attempt,
                    satisfied: true,
                };
            }
            if best.map_or(true, |(_, s)| slack > s) {
                best = Some((candidate, slack));
            }
        }

        let (position, _) = best.unwrap_or((Point::new(xs.start, ys.start), f32::MIN));
        Placement {
            position,
            attempts: MAX_PLACEMENT_ATTEMPTS,
            satisfied: false,
        }
    }
}

impl Default for ObstacleGenerator {
    fn default() -> Self {
        Self::new(ObstacleConfig::default())
    }
}

/// Smallest margin by which `candidate` clears its constraints (negative = violated)
fn island_slack(candidate: Point, radius: f32, spawns: &SpawnPoints, placed: &[ObstaclePlan]) -> f32 {
    let spawn_slack = (candidate.distance_to(spawns.team1) - MIN_SPAWN_DISTANCE)
        .min(candidate.distance_to(spawns.team2) - MIN_SPAWN_DISTANCE);

    placed
        .iter()
        .filter(|p| p.kind == ObstacleKind::Island)
        .map(|p| candidate.distance_to(p.position) - (radius + ISLAND_SPACING))
        .fold(spawn_slack, f32::min)
}
