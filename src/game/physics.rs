//! Platformer physics: fixed-step integration and landing resolution

use super::registry::Player;
use super::world::{Platform, World};

/// Movement tuning shared by every player
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    /// Downward acceleration, px/s²
    pub gravity: f64,
    /// Horizontal speed while a direction key is held, px/s
    pub move_speed: f64,
    /// Vertical velocity applied on jump, px/s (negative is up)
    pub jump_velocity: f64,
    /// Deepest a player's bottom edge may sink into a platform top and still land on it
    pub landing_tolerance: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 2000.0,
            move_speed: 300.0,
            jump_velocity: -650.0,
            landing_tolerance: 40.0,
        }
    }
}

/// Physics system for advancing players one tick at a time
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a player by `dt` seconds
    pub fn step(
        player: &mut Player,
        world: &World,
        platforms: &[Platform],
        config: &PhysicsConfig,
        dt: f64,
    ) {
        player.vx = player.inputs.horizontal_axis() * config.move_speed;

        if player.inputs.jump_pressed && player.on_ground {
            player.vy = config.jump_velocity;
            player.on_ground = false;
            player.inputs.jump_pressed = false;
        }

        // Semi-implicit Euler: velocity first, then position
        player.vy += config.gravity * dt;
        player.x += player.vx * dt;
        player.y += player.vy * dt;

        if player.bottom() > world.height {
            player.y = world.height - player.h;
            player.vy = 0.0;
            player.on_ground = true;
        }

        Self::resolve_landings(player, platforms, config);
    }

    /// Snap the player onto any platform it has fallen into from above.
    ///
    /// Platforms are checked in order and each one that qualifies moves the
    /// player, so the last qualifying platform decides the final position.
    /// Only the penetration depth separates a landing from a side hit: a
    /// shallow sideways overlap while falling also counts as a landing.
    pub fn resolve_landings(player: &mut Player, platforms: &[Platform], config: &PhysicsConfig) {
        for platform in platforms {
            if !platform.overlaps(player.x, player.y, player.w, player.h) {
                continue;
            }

            let penetration = player.bottom() - platform.y;
            if player.vy >= 0.0 && penetration < config.landing_tolerance {
                player.y = platform.y - player.h;
                player.vy = 0.0;
                player.on_ground = true;
            }
        }
    }
}
