//! Game session: the authoritative tick loop and its event inbox

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::util::time::{tick_delta, tick_duration, Timer};
use crate::ws::protocol::{InitData, ServerMsg};

use super::physics::{PhysicsConfig, PhysicsSystem};
use super::registry::{PlayerId, PlayerRegistry};
use super::world::Level;
use super::InputPatch;

/// Connection events routed into the session
#[derive(Debug)]
pub enum SessionEvent {
    /// A client connected; the init message goes back on `reply`
    Join {
        id: PlayerId,
        reply: oneshot::Sender<ServerMsg>,
    },
    Input {
        id: PlayerId,
        patch: InputPatch,
    },
    Leave {
        id: PlayerId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Game session is no longer running")]
    Closed,
}

/// Cloneable handle used by connections to talk to the session
#[derive(Clone)]
pub struct GameHandle {
    events_tx: mpsc::Sender<SessionEvent>,
    broadcast_tx: broadcast::Sender<String>,
    player_count: Arc<AtomicUsize>,
}

impl GameHandle {
    /// Receive every frame broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Spawn a player for `id` and get its init message back
    pub async fn join(&self, id: PlayerId) -> Result<ServerMsg, SessionError> {
        let (reply, init) = oneshot::channel();
        self.send(SessionEvent::Join { id, reply }).await?;
        init.await.map_err(|_| SessionError::Closed)
    }

    pub async fn input(&self, id: PlayerId, patch: InputPatch) -> Result<(), SessionError> {
        self.send(SessionEvent::Input { id, patch }).await
    }

    pub async fn leave(&self, id: PlayerId) -> Result<(), SessionError> {
        self.send(SessionEvent::Leave { id }).await
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// The single shared world. Owns the registry; nothing else mutates it.
pub struct GameSession {
    level: Level,
    physics: PhysicsConfig,
    registry: PlayerRegistry,
    tick: u64,
    events_rx: mpsc::Receiver<SessionEvent>,
    broadcast_tx: broadcast::Sender<String>,
    player_count: Arc<AtomicUsize>,
}

impl GameSession {
    pub fn new(level: Level, physics: PhysicsConfig) -> (Self, GameHandle) {
        let registry = PlayerRegistry::new(level.world);
        Self::with_registry(level, physics, registry)
    }

    /// Session over a caller-provided registry (e.g. a seeded one)
    pub fn with_registry(
        level: Level,
        physics: PhysicsConfig,
        registry: PlayerRegistry,
    ) -> (Self, GameHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(registry.len()));

        let handle = GameHandle {
            events_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
        };

        let session = Self {
            level,
            physics,
            registry,
            tick: 0,
            events_rx,
            broadcast_tx,
            player_count,
        };

        (session, handle)
    }

    /// Run the tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            platforms = self.level.platforms.len(),
            tick_micros = tick_duration().as_micros() as u64,
            "Game session started"
        );

        let mut ticker = interval(tick_duration());
        // Late ticks push the schedule back instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = Timer::new();
                    self.run_tick();
                    let elapsed = timer.elapsed();
                    if elapsed > tick_duration() {
                        debug!(
                            tick = self.tick,
                            elapsed_micros = elapsed.as_micros() as u64,
                            "Tick overran its budget"
                        );
                    }
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }

        info!(tick = self.tick, "Game session stopped");
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join { id, reply } => self.handle_join(id, reply),
            SessionEvent::Input { id, patch } => {
                if !self.registry.apply_input(id, patch) {
                    debug!(player_id = %id, "Input for unknown player ignored");
                }
            }
            SessionEvent::Leave { id } => self.handle_leave(id),
        }
    }

    fn handle_join(&mut self, id: PlayerId, reply: oneshot::Sender<ServerMsg>) {
        let player = self.registry.spawn(id);
        info!(
            player_id = %id,
            x = player.x,
            y = player.y,
            color = %player.color,
            "Player joined"
        );
        self.update_player_count();

        let init = ServerMsg::Init(InitData {
            id,
            world: self.level.world,
            platforms: self.level.platforms.clone(),
        });
        if reply.send(init).is_err() {
            debug!(player_id = %id, "Connection gone before init was delivered");
        }

        self.broadcast(&ServerMsg::Players(self.registry.roster()));
    }

    fn handle_leave(&mut self, id: PlayerId) {
        if self.registry.remove(id).is_none() {
            return;
        }

        info!(player_id = %id, remaining = self.registry.len(), "Player left");
        if self.registry.is_empty() {
            debug!(tick = self.tick, "World is empty");
        }
        self.update_player_count();
        self.broadcast(&ServerMsg::Players(self.registry.roster()));
    }

    /// Step every player, then publish the resulting state
    fn run_tick(&mut self) {
        self.tick += 1;
        let dt = tick_delta();

        for player in self.registry.players_mut() {
            PhysicsSystem::step(
                player,
                &self.level.world,
                &self.level.platforms,
                &self.physics,
                dt,
            );
        }

        self.broadcast(&ServerMsg::State(self.registry.snapshot()));
    }

    /// Fire-and-forget send to every subscriber
    fn broadcast(&self, msg: &ServerMsg) {
        match msg.encode() {
            // No receivers is not an error worth reporting
            Ok(frame) => {
                let _ = self.broadcast_tx.send(frame);
            }
            Err(e) => error!(error = %e, "Failed to encode broadcast"),
        }
    }

    fn update_player_count(&self) {
        self.player_count
            .store(self.registry.len(), Ordering::Relaxed);
    }
}
