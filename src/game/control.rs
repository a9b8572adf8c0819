//! Control intake - clamps steering, aiming and throttle commands

use serde::{Deserialize, Serialize};

use super::entities::{Ship, ShipId};
use super::physics::ShipStats;

/// What a ship-control message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    /// Absolute target rudder angle
    Rudder,
    /// Relative change to the target rudder angle
    RudderAdjust,
    /// Absolute cannon aim, any direction
    Cannon,
    /// Absolute target speed
    Speed,
    /// Relative change to the target speed
    SpeedAdjust,
}

/// A control request addressed to one ship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlIntent {
    pub action: ControlAction,
    pub ship_id: ShipId,
    pub value: f32,
}

/// Applies control intents to ships
pub struct ControlIntake;

impl ControlIntake {
    /// Apply `intent` to `ship`. Ownership is checked by the caller.
    /// Returns false for non-finite values, which are dropped.
    pub fn apply(ship: &mut Ship, intent: &ControlIntent, stats: &ShipStats) -> bool {
        if !intent.value.is_finite() {
            return false;
        }

        let rudder_limit = stats.max_rudder;
        match intent.action {
            ControlAction::Rudder => {
                ship.target_rudder_angle = intent.value.clamp(-rudder_limit, rudder_limit);
            }
            ControlAction::RudderAdjust => {
                ship.target_rudder_angle =
                    (ship.target_rudder_angle + intent.value).clamp(-rudder_limit, rudder_limit);
            }
            ControlAction::Cannon => {
                ship.cannon_angle = intent.value;
            }
            ControlAction::Speed => {
                ship.target_speed = intent.value.clamp(0.0, stats.max_speed);
            }
            ControlAction::SpeedAdjust => {
                ship.target_speed = (ship.target_speed + intent.value).clamp(0.0, stats.max_speed);
            }
        }
        true
    }
}
