//! Combat system - firing readiness, collisions, damage and scoring

use serde::{Deserialize, Serialize};

use crate::util::time::Millis;

use super::entities::{ConnectionId, EntityRegistry, ShipId, Team};

/// Health every ship spawns with
pub const SHIP_MAX_HEALTH: f32 = 3.0;
/// Minimum time between two shots of one ship
pub const SHOT_COOLDOWN_MS: Millis = 5_000;
/// A freshly spawned ship holds fire this long
pub const SPAWN_GRACE_MS: Millis = 5_000;
/// Cannonball speed in units per second
pub const PROJECTILE_SPEED: f32 = 150.0;
/// Cannonballs leave the barrel this far from the hull centre
pub const MUZZLE_OFFSET: f32 = 25.0;
/// Cannonballs survive this far outside the world before being dropped
pub const PROJECTILE_OOB_MARGIN: f32 = 10.0;
/// Centre distance at which a cannonball strikes a ship
pub const SHIP_HIT_RADIUS: f32 = 12.0;
/// Damage of one cannonball hit
pub const PROJECTILE_DAMAGE: f32 = 1.0;
/// Hull clearance added to an obstacle radius for grounding checks
pub const SHIP_OBSTACLE_CLEARANCE: f32 = 12.0;
/// Damage per tick while grounded (flat, not time-scaled)
pub const GROUNDING_DAMAGE: f32 = 0.01;
/// Push-back per tick while grounded (flat, not time-scaled)
pub const GROUNDING_PUSH: f32 = 2.0;
/// Added to an obstacle radius for cannonball impact checks
pub const OBSTACLE_HIT_MARGIN: f32 = 3.0;
/// Iceberg starting health
pub const ICEBERG_HEALTH: i32 = 3;
/// Radius an iceberg loses per hit
pub const ICEBERG_SHRINK: f32 = 5.0;
/// An iceberg at or below this radius breaks up
pub const ICEBERG_MIN_RADIUS: f32 = 10.0;
/// Kill credit toward the next tier
pub const KILL_TIER_PROGRESS: f32 = 0.5;
/// First team to this many kills wins
pub const WIN_SCORE: u32 = 15;
/// Delay between a sinking and the replacement ship
pub const RESPAWN_DELAY_MS: Millis = 3_000;

/// Team kill counters; never decrease
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub team1: u32,
    pub team2: u32,
}

impl Scores {
    pub fn credit(&mut self, team: Team) {
        match team {
            Team::Team1 => self.team1 += 1,
            Team::Team2 => self.team2 += 1,
        }
    }

    /// The team that reached the win threshold, if any
    pub fn winner(&self) -> Option<Team> {
        if self.team1 >= WIN_SCORE {
            Some(Team::Team1)
        } else if self.team2 >= WIN_SCORE {
            Some(Team::Team2)
        } else {
            None
        }
    }
}

/// A ship sunk by cannon fire this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kill {
    pub victim_id: ShipId,
    pub victim_owner: ConnectionId,
    pub victim_team: Team,
    pub killer_id: ShipId,
    pub killer_team: Team,
}

/// What a single collision phase did
#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    pub kills: Vec<Kill>,
    pub ship_hits: usize,
    pub obstacle_hits: usize,
    pub groundings: usize,
}

/// Combat system for collision passes and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Ships fire on their own once past the spawn grace and off cooldown
    pub fn can_fire(ship: &super::entities::Ship, now: Millis) -> bool {
        now.saturating_sub(ship.spawn_time) >= SPAWN_GRACE_MS
            && now.saturating_sub(ship.last_shot) >= ship.shot_cooldown
    }

    /// Run the three collision passes and credit kills to `scores`.
    ///
    /// Passes see the entities that were live when resolution started; flags
    /// set during a pass only take effect at compaction, so the outcome does
    /// not depend on entity order.
    pub fn resolve(registry: &mut EntityRegistry, scores: &mut Scores) -> CollisionReport {
        let mut report = CollisionReport::default();
        let live_projectiles: Vec<bool> = registry.projectiles.iter().map(|p| !p.dead).collect();

        report.groundings = Self::ship_obstacle_pass(registry);
        Self::projectile_ship_pass(registry, &live_projectiles, &mut report);
        report.obstacle_hits = Self::projectile_obstacle_pass(registry, &live_projectiles);

        for kill in &report.kills {
            scores.credit(kill.killer_team);
            if let Some(killer) = registry.ship_mut(kill.killer_id) {
                killer.award_kill();
            }
        }

        report
    }

    /// Grounded ships take chip damage and are shoved off the obstacle
    fn ship_obstacle_pass(registry: &mut EntityRegistry) -> usize {
        let mut groundings = 0;
        for ship in registry.ships.iter_mut() {
            for obstacle in registry.obstacles.iter().filter(|o| !o.dead) {
                let dx = ship.x - obstacle.x;
                let dy = ship.y - obstacle.y;
                let distance = (dx * dx + dy * dy).sqrt();

                if distance < obstacle.radius + SHIP_OBSTACLE_CLEARANCE {
                    ship.health -= GROUNDING_DAMAGE;
                    let (nx, ny) = if distance > f32::EPSILON {
                        (dx / distance, dy / distance)
                    } else {
                        (1.0, 0.0)
                    };
                    ship.x += nx * GROUNDING_PUSH;
                    ship.y += ny * GROUNDING_PUSH;
                    groundings += 1;
                }
            }
        }
        groundings
    }

    fn projectile_ship_pass(
        registry: &mut EntityRegistry,
        live_projectiles: &[bool],
        report: &mut CollisionReport,
    ) {
        let ships = &mut registry.ships;
        for (projectile, _) in registry
            .projectiles
            .iter_mut()
            .zip(live_projectiles)
            .filter(|(_, live)| **live)
        {
            for ship in ships.iter_mut() {
                if ship.team == projectile.shooter_team {
                    continue;
                }

                let dx = projectile.x - ship.x;
                let dy = projectile.y - ship.y;
                if (dx * dx + dy * dy).sqrt() < SHIP_HIT_RADIUS {
                    // A sinking hull still stops the ball; only the first hit below zero scores
                    let was_alive = ship.is_alive();
                    projectile.dead = true;
                    ship.health -= PROJECTILE_DAMAGE;
                    report.ship_hits += 1;

                    if was_alive && !ship.is_alive() {
                        report.kills.push(Kill {
                            victim_id: ship.id,
                            victim_owner: ship.owner,
                            victim_team: ship.team,
                            killer_id: projectile.shooter_id,
                            killer_team: projectile.shooter_team,
                        });
                    }
                }
            }
        }
    }

    fn projectile_obstacle_pass(registry: &mut EntityRegistry, live_projectiles: &[bool]) -> usize {
        let mut hits = 0;
        let obstacles = &mut registry.obstacles;
        for (projectile, _) in registry
            .projectiles
            .iter_mut()
            .zip(live_projectiles)
            .filter(|(_, live)| **live)
        {
            for obstacle in obstacles.iter_mut().filter(|o| !o.dead) {
                let dx = projectile.x - obstacle.x;
                let dy = projectile.y - obstacle.y;
                if (dx * dx + dy * dy).sqrt() >= obstacle.radius + OBSTACLE_HIT_MARGIN {
                    continue;
                }

                projectile.dead = true;
                hits += 1;

                if let Some(health) = obstacle.health.as_mut() {
                    *health -= 1;
                    obstacle.radius -= ICEBERG_SHRINK;
                    if *health <= 0 || obstacle.radius <= ICEBERG_MIN_RADIUS {
                        obstacle.dead = true;
                    }
                }
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{ObstacleKind, Point, ShipSpawn};
    use assert_approx_eq::assert_approx_eq;
    use uuid::Uuid;

    fn spawn(registry: &mut EntityRegistry, team: Team, x: f32, y: f32) -> ShipId {
        registry
            .spawn_ship(ShipSpawn {
                owner: Uuid::new_v4(),
                team,
                position: Point::new(x, y),
                heading: 0.0,
                now: 0,
            })
            .unwrap()
    }

    fn shoot_at(registry: &mut EntityRegistry, shooter: ShipId, team: Team, x: f32, y: f32) {
        registry.spawn_projectile(shooter, team, Point::new(x, y), 0.0, PROJECTILE_SPEED);
    }

    #[test]
    fn grounding_is_flat_per_tick() {
        let mut registry = EntityRegistry::new();
        let ship = spawn(&mut registry, Team::Team1, 540.0, 350.0);
        registry.add_obstacle(ObstacleKind::Island, Point::new(500.0, 350.0), 30.0, 0);

        let mut scores = Scores::default();
        let report = CombatSystem::resolve(&mut registry, &mut scores);
        assert_eq!(report.groundings, 1);

        let ship = registry.ship(ship).unwrap();
        assert_approx_eq!(ship.health, 2.99);
        assert_approx_eq!(ship.x, 542.0);
        assert_approx_eq!(ship.y, 350.0);
        assert_eq!(registry.obstacles.len(), 1);
    }

    #[test]
    fn same_team_fire_is_ignored() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        let friend = spawn(&mut registry, Team::Team1, 500.0, 350.0);
        shoot_at(&mut registry, shooter, Team::Team1, 505.0, 350.0);

        let report = CombatSystem::resolve(&mut registry, &mut Scores::default());
        assert_eq!(report.ship_hits, 0);
        assert_eq!(registry.ship(friend).unwrap().health, 3.0);
        assert!(!registry.projectiles[0].dead);
    }

    #[test]
    fn hit_just_inside_radius_only() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        let target = spawn(&mut registry, Team::Team2, 500.0, 350.0);
        shoot_at(&mut registry, shooter, Team::Team1, 512.0, 350.0);
        shoot_at(&mut registry, shooter, Team::Team1, 511.9, 350.0);

        CombatSystem::resolve(&mut registry, &mut Scores::default());
        assert_eq!(registry.ship(target).unwrap().health, 2.0);
        assert!(!registry.projectiles[0].dead);
        assert!(registry.projectiles[1].dead);
    }

    #[test]
    fn kill_scores_once_and_awards_progress() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        let target = spawn(&mut registry, Team::Team2, 500.0, 350.0);
        registry.ship_mut(target).unwrap().health = 1.0;
        // Two balls land on the same tick; only the first sinks it, both are spent
        shoot_at(&mut registry, shooter, Team::Team1, 505.0, 350.0);
        shoot_at(&mut registry, shooter, Team::Team1, 495.0, 350.0);

        let mut scores = Scores::default();
        let report = CombatSystem::resolve(&mut registry, &mut scores);
        assert_eq!(report.kills.len(), 1);
        assert_eq!(report.kills[0].victim_id, target);
        assert_eq!(report.kills[0].killer_id, shooter);
        assert_eq!(scores, Scores { team1: 1, team2: 0 });
        assert_eq!(report.ship_hits, 2);
        assert!(registry.projectiles.iter().all(|p| p.dead));

        let killer = registry.ship(shooter).unwrap();
        assert_approx_eq!(killer.kill_tier_progress, 0.5);
        assert_eq!(killer.tier, 1);

        registry.compact();
        assert!(registry.ship(target).is_none());
    }

    #[test]
    fn grounded_wreck_still_stops_fire_without_scoring() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        let wreck = spawn(&mut registry, Team::Team2, 540.0, 350.0);
        registry.add_obstacle(ObstacleKind::Island, Point::new(500.0, 350.0), 30.0, 0);
        registry.ship_mut(wreck).unwrap().health = 0.005;
        // Grounding pushes the wreck to x = 542 and sinks it before the ball lands
        shoot_at(&mut registry, shooter, Team::Team1, 547.0, 350.0);

        let mut scores = Scores::default();
        let report = CombatSystem::resolve(&mut registry, &mut scores);
        assert!(registry.projectiles[0].dead);
        assert_eq!(report.ship_hits, 1);
        assert!(report.kills.is_empty());
        assert_eq!(scores, Scores::default());
        assert_eq!(registry.ship(shooter).unwrap().kill_tier_progress, 0.0);
    }

    #[test]
    fn four_kills_raise_the_tier() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        for _ in 0..4 {
            registry.ship_mut(shooter).unwrap().award_kill();
        }
        let ship = registry.ship(shooter).unwrap();
        assert_approx_eq!(ship.kill_tier_progress, 2.0);
        assert_eq!(ship.tier, 2);

        for _ in 0..2 {
            registry.ship_mut(shooter).unwrap().award_kill();
        }
        let ship = registry.ship(shooter).unwrap();
        assert_approx_eq!(ship.kill_tier_progress, 3.0);
        assert_eq!(ship.tier, 2);

        for _ in 0..2 {
            registry.ship_mut(shooter).unwrap().award_kill();
        }
        let ship = registry.ship(shooter).unwrap();
        assert_approx_eq!(ship.kill_tier_progress, 4.0);
        assert_eq!(ship.tier, 3);
    }

    #[test]
    fn iceberg_breaks_on_health_and_radius_together() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        registry.add_obstacle(ObstacleKind::Iceberg, Point::new(500.0, 350.0), 12.0, 0);
        registry.obstacles[0].health = Some(1);
        shoot_at(&mut registry, shooter, Team::Team1, 500.0, 350.0);

        CombatSystem::resolve(&mut registry, &mut Scores::default());
        let berg = &registry.obstacles[0];
        assert_eq!(berg.health, Some(0));
        assert_approx_eq!(berg.radius, 7.0);
        assert!(berg.dead);
    }

    #[test]
    fn iceberg_breaks_on_radius_alone() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        registry.add_obstacle(ObstacleKind::Iceberg, Point::new(500.0, 350.0), 12.0, 0);
        shoot_at(&mut registry, shooter, Team::Team1, 500.0, 350.0);

        CombatSystem::resolve(&mut registry, &mut Scores::default());
        let berg = &registry.obstacles[0];
        assert_eq!(berg.health, Some(2));
        assert!(berg.dead);
    }

    #[test]
    fn iceberg_breaks_on_health_alone() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        registry.add_obstacle(ObstacleKind::Iceberg, Point::new(500.0, 350.0), 40.0, 0);
        registry.obstacles[0].health = Some(1);
        shoot_at(&mut registry, shooter, Team::Team1, 500.0, 350.0);

        CombatSystem::resolve(&mut registry, &mut Scores::default());
        let berg = &registry.obstacles[0];
        assert_approx_eq!(berg.radius, 35.0);
        assert!(berg.dead);
        assert_eq!(registry.compact().obstacles, 1);
    }

    #[test]
    fn islands_absorb_fire_forever() {
        let mut registry = EntityRegistry::new();
        let shooter = spawn(&mut registry, Team::Team1, 100.0, 100.0);
        registry.add_obstacle(ObstacleKind::Island, Point::new(500.0, 350.0), 30.0, 0);
        for _ in 0..10 {
            shoot_at(&mut registry, shooter, Team::Team1, 510.0, 350.0);
        }

        let report = CombatSystem::resolve(&mut registry, &mut Scores::default());
        assert_eq!(report.obstacle_hits, 10);
        assert!(registry.projectiles.iter().all(|p| p.dead));
        assert!(!registry.obstacles[0].dead);
        assert_approx_eq!(registry.obstacles[0].radius, 30.0);
    }

    #[test]
    fn winner_at_fifteen_not_fourteen() {
        let mut scores = Scores {
            team1: 14,
            team2: 3,
        };
        assert_eq!(scores.winner(), None);
        scores.credit(Team::Team1);
        assert_eq!(scores.winner(), Some(Team::Team1));
        assert_eq!(scores.team1, 15);
    }
}
