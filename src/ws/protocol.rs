//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON text message of the form `{"type": ..., "data": ...}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::{InputPatch, Platform, Player, PlayerId, World};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Any subset of the input flags; merged into the sender's player
    Input(InputPatch),
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a newly connected client
    Init(InitData),

    /// Every player keyed by id (sent on join and leave)
    Players(BTreeMap<PlayerId, Player>),

    /// Every player after a simulation tick
    State(Vec<Player>),
}

/// Payload of [`ServerMsg::Init`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitData {
    pub id: PlayerId,
    pub world: World,
    pub platforms: Vec<Platform>,
}

impl ServerMsg {
    /// Encode as a JSON text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ClientMsg {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
