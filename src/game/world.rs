//! Static level geometry: world bounds and platforms

use serde::{Deserialize, Serialize};

/// World bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub width: f64,
    pub height: f64,
    /// Reference line the platforms and spawn point are laid out from
    pub ground_y: f64,
}

impl Default for World {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 700.0,
            ground_y: 520.0,
        }
    }
}

/// Axis-aligned platform rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Platform {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Strict overlap test against another rectangle; touching edges do not overlap
    pub fn overlaps(&self, x: f64, y: f64, w: f64, h: f64) -> bool {
        x + w > self.x && x < self.x + self.w && y + h > self.y && y < self.y + self.h
    }
}

/// The single level every player shares. Never mutated after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub world: World,
    pub platforms: Vec<Platform>,
}

impl Level {
    pub fn new(world: World, platforms: Vec<Platform>) -> Self {
        Self { world, platforms }
    }
}

impl Default for Level {
    fn default() -> Self {
        let world = World::default();
        let g = world.ground_y;
        let platforms = vec![
            // Ground slab spanning the full width
            Platform::new(0.0, g + 10.0, world.width, 200.0),
            Platform::new(300.0, g - 60.0, 160.0, 20.0),
            Platform::new(520.0, g - 140.0, 140.0, 20.0),
            Platform::new(720.0, g - 220.0, 160.0, 20.0),
            Platform::new(980.0, g - 120.0, 140.0, 20.0),
        ];
        Self::new(world, platforms)
    }
}
