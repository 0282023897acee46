//! Player registry: one player entity per live connection

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::world::World;
use super::{InputPatch, InputState};

/// Connection identifier, shared by the player spawned for it
pub type PlayerId = Uuid;

/// Player bounding box width
pub const PLAYER_WIDTH: f64 = 34.0;
/// Player bounding box height
pub const PLAYER_HEIGHT: f64 = 44.0;

/// Authoritative player state, sent to clients as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,

    // Position and movement
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
    pub h: f64,

    /// CSS color string, fixed at spawn
    pub color: String,
    pub on_ground: bool,
    pub inputs: InputState,
}

impl Player {
    pub fn new(id: PlayerId, x: f64, y: f64, color: String) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            w: PLAYER_WIDTH,
            h: PLAYER_HEIGHT,
            color,
            on_ground: false,
            inputs: InputState::default(),
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// All players currently in the world, keyed by connection id.
///
/// Iteration is ordered by id, so the same set of players always
/// produces the same snapshot order.
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    world: World,
    rng: ChaCha8Rng,
}

impl PlayerRegistry {
    pub fn new(world: World) -> Self {
        Self::with_rng(world, ChaCha8Rng::from_entropy())
    }

    /// Registry with a deterministic spawn/color sequence
    #[cfg(test)]
    pub fn with_seed(world: World, seed: u64) -> Self {
        Self::with_rng(world, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(world: World, rng: ChaCha8Rng) -> Self {
        Self {
            players: BTreeMap::new(),
            world,
            rng,
        }
    }

    /// Insert a fresh player for `id` near the left edge of the ground.
    /// An existing player with the same id is replaced.
    pub fn spawn(&mut self, id: PlayerId) -> &Player {
        let x = self.rng.gen_range(60.0..100.0);
        let y = self.world.ground_y - 40.0;
        let hue: f64 = self.rng.gen_range(0.0..360.0);
        let color = format!("hsl({hue},70%,55%)");

        self.players.insert(id, Player::new(id, x, y, color));
        &self.players[&id]
    }

    /// Merge a partial input update. Unknown ids are ignored.
    pub fn apply_input(&mut self, id: PlayerId, patch: InputPatch) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.inputs.merge(patch);
                true
            }
            None => false,
        }
    }

    /// Remove a player, returning it if it was present
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Every player, in id order
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    /// Every player keyed by id
    pub fn roster(&self) -> BTreeMap<PlayerId, Player> {
        self.players.clone()
    }

    #[cfg(test)]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::with_seed(World::default(), 7)
    }

    #[test]
    fn spawn_places_player_near_left_ground() {
        let mut registry = registry();
        for _ in 0..50 {
            let id = Uuid::new_v4();
            let player = registry.spawn(id).clone();

            assert_eq!(player.id, id);
            assert!((60.0..100.0).contains(&player.x), "x = {}", player.x);
            assert_eq!(player.y, 480.0);
            assert_eq!((player.vx, player.vy), (0.0, 0.0));
            assert_eq!((player.w, player.h), (PLAYER_WIDTH, PLAYER_HEIGHT));
            assert!(!player.on_ground);
            assert_eq!(player.inputs, InputState::default());
            assert!(player.color.starts_with("hsl("), "color = {}", player.color);
            assert!(player.color.ends_with(",70%,55%)"), "color = {}", player.color);
        }
        assert_eq!(registry.len(), 50);
    }

    #[test]
    fn same_seed_spawns_identically() {
        let id = Uuid::new_v4();
        let a = registry().spawn(id).clone();
        let b = registry().spawn(id).clone();
        assert_eq!(a, b);
    }

    #[test]
    fn input_merges_across_updates() {
        let mut registry = registry();
        let id = Uuid::new_v4();
        registry.spawn(id);

        assert!(registry.apply_input(
            id,
            InputPatch {
                left: Some(true),
                ..Default::default()
            }
        ));
        assert!(registry.apply_input(
            id,
            InputPatch {
                right: Some(true),
                ..Default::default()
            }
        ));

        let inputs = registry.get(id).unwrap().inputs;
        assert!(inputs.left);
        assert!(inputs.right);
        assert!(!inputs.jump_pressed);
    }

    #[test]
    fn unknown_ids_leave_registry_unchanged() {
        let mut registry = registry();
        let id = Uuid::new_v4();
        registry.spawn(id);
        let before = registry.snapshot();

        let stranger = Uuid::new_v4();
        assert!(!registry.apply_input(
            stranger,
            InputPatch {
                left: Some(true),
                ..Default::default()
            }
        ));
        assert!(registry.remove(stranger).is_none());

        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = registry();
        let id = Uuid::new_v4();
        registry.spawn(id);

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_and_roster_agree() {
        let mut registry = registry();
        let ids: Vec<PlayerId> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            registry.spawn(*id);
        }

        let snapshot = registry.snapshot();
        let roster = registry.roster();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(roster.len(), 4);

        // Snapshot follows id order
        let mut sorted = ids.clone();
        sorted.sort();
        let snapshot_ids: Vec<PlayerId> = snapshot.iter().map(|p| p.id).collect();
        assert_eq!(snapshot_ids, sorted);

        for player in &snapshot {
            assert_eq!(roster.get(&player.id), Some(player));
        }
    }

    #[test]
    fn player_wire_shape() {
        let id = Uuid::nil();
        let player = Player::new(id, 70.0, 480.0, "hsl(10,70%,55%)".to_string());
        let json = serde_json::to_value(&player).unwrap();

        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["onGround"], false);
        assert_eq!(json["w"], 34.0);
        assert_eq!(
            json["inputs"],
            serde_json::json!({ "left": false, "right": false, "jumpPressed": false })
        );
    }
}
