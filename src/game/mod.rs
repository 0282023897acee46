//! Game simulation modules

pub mod physics;
pub mod registry;
pub mod session;
pub mod world;

pub use physics::PhysicsConfig;
pub use registry::{Player, PlayerId};
pub use session::{GameHandle, GameSession};
pub use world::{Level, Platform, World};

use serde::{Deserialize, Serialize};

/// Last known input state of a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    /// Edge-triggered: cleared by the simulation once the jump fires
    pub jump_pressed: bool,
}

/// Partial input update sent by a client. Absent fields keep their previous value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_pressed: Option<bool>,
}

impl InputState {
    /// Overlay the fields present in `patch`
    pub fn merge(&mut self, patch: InputPatch) {
        if let Some(left) = patch.left {
            self.left = left;
        }
        if let Some(right) = patch.right {
            self.right = right;
        }
        if let Some(jump_pressed) = patch.jump_pressed {
            self.jump_pressed = jump_pressed;
        }
    }

    /// -1, 0 or 1 depending on which direction keys are held
    pub fn horizontal_axis(&self) -> f64 {
        f64::from(u8::from(self.right)) - f64::from(u8::from(self.left))
    }
}
