//! Ship physics, boundary handling and autonomous firing

use std::f32::consts::{FRAC_PI_4, PI};

use crate::util::time::Millis;

use super::combat::{CombatSystem, MUZZLE_OFFSET, PROJECTILE_OOB_MARGIN, PROJECTILE_SPEED};
use super::entities::{EntityRegistry, Point, Projectile, Ship, WORLD_HEIGHT, WORLD_WIDTH};

/// Ship handling constants
#[derive(Debug, Clone, Copy)]
pub struct ShipStats {
    /// Speed a freshly spawned ship sails at
    pub base_speed: f32,
    /// Upper bound for target speed
    pub max_speed: f32,
    /// Maximum rudder deflection either side (radians)
    pub max_rudder: f32,
    /// How fast the rudder swings toward its target (radians per second)
    pub rudder_rate: f32,
    /// How fast speed converges on target speed (units per second squared)
    pub acceleration: f32,
    /// Heading change per radian of rudder per second
    pub turn_rate: f32,
}

impl Default for ShipStats {
    fn default() -> Self {
        Self {
            base_speed: 25.0,
            max_speed: 50.0,
            max_rudder: FRAC_PI_4,
            rudder_rate: 2.0,
            acceleration: 10.0,
            turn_rate: 0.8,
        }
    }
}

/// Which walls a ship touched this step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    pub x_wall: bool,
    pub y_wall: bool,
}

/// What one physics step did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub shots_fired: usize,
    /// Ships that hit a wall and were turned back
    pub wall_bounces: usize,
}

/// Physics system for advancing ships and projectiles one step
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Move `current` toward `target` by at most `max_step`
    pub fn approach(current: f32, target: f32, max_step: f32) -> f32 {
        let diff = target - current;
        current + diff.signum() * diff.abs().min(max_step)
    }

    /// Advance a ship by `dt` seconds and apply the wall bounce
    pub fn update_ship(ship: &mut Ship, stats: &ShipStats, dt: f32) -> Bounce {
        ship.rudder_angle =
            Self::approach(ship.rudder_angle, ship.target_rudder_angle, stats.rudder_rate * dt);
        ship.speed = Self::approach(ship.speed, ship.target_speed, stats.acceleration * dt);

        ship.heading += ship.rudder_angle * stats.turn_rate * dt;
        ship.x += ship.heading.cos() * ship.speed * dt;
        ship.y += ship.heading.sin() * ship.speed * dt;

        Self::bounce(ship)
    }

    /// Clamp a ship back inside the world and reflect its heading.
    /// x-walls mirror to `PI - heading`, y-walls to `-heading`; steering input is dropped.
    pub fn bounce(ship: &mut Ship) -> Bounce {
        let mut bounce = Bounce::default();

        if ship.x < 0.0 || ship.x > WORLD_WIDTH {
            ship.x = ship.x.clamp(0.0, WORLD_WIDTH);
            ship.heading = PI - ship.heading;
            ship.rudder_angle = 0.0;
            ship.target_rudder_angle = 0.0;
            bounce.x_wall = true;
        }

        if ship.y < 0.0 || ship.y > WORLD_HEIGHT {
            ship.y = ship.y.clamp(0.0, WORLD_HEIGHT);
            ship.heading = -ship.heading;
            ship.rudder_angle = 0.0;
            ship.target_rudder_angle = 0.0;
            bounce.y_wall = true;
        }

        bounce
    }

    /// Advance a projectile and flag it once it leaves the world plus margin
    pub fn update_projectile(projectile: &mut Projectile, dt: f32) {
        projectile.x += projectile.angle.cos() * projectile.speed * dt;
        projectile.y += projectile.angle.sin() * projectile.speed * dt;

        let m = PROJECTILE_OOB_MARGIN;
        if projectile.x < -m
            || projectile.x > WORLD_WIDTH + m
            || projectile.y < -m
            || projectile.y > WORLD_HEIGHT + m
        {
            projectile.dead = true;
        }
    }

    /// Integrate every ship, fire the ones whose cannons are ready, then move
    /// every projectile (including the ones just fired).
    pub fn step(registry: &mut EntityRegistry, stats: &ShipStats, dt: f32, now: Millis) -> StepReport {
        let mut report = StepReport::default();
        let mut shots = Vec::new();

        for ship in registry.ships.iter_mut() {
            let bounce = Self::update_ship(ship, stats, dt);
            if bounce.x_wall || bounce.y_wall {
                report.wall_bounces += 1;
            }

            if CombatSystem::can_fire(ship, now) {
                let origin = Point::new(
                    ship.x + ship.cannon_angle.cos() * MUZZLE_OFFSET,
                    ship.y + ship.cannon_angle.sin() * MUZZLE_OFFSET,
                );
                shots.push((ship.id, ship.team, origin, ship.cannon_angle));
                ship.last_shot = now;
            }
        }

        report.shots_fired = shots.len();
        for (shooter_id, team, origin, angle) in shots {
            registry.spawn_projectile(shooter_id, team, origin, angle, PROJECTILE_SPEED);
        }

        for projectile in registry.projectiles.iter_mut() {
            Self::update_projectile(projectile, dt);
        }

        report
    }
}
