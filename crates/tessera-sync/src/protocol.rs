//! Messages exchanged with the authority.
//!
//! Block positions travel as raw integers (`p`, `q` chunk; `x`, `y`, `z`, `w` block and type)
//! so the wire shape does not depend on internal coordinate types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_world::{PlayerState, Version};

pub type ClientId = i32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    FetchChunk {
        p: i32,
        q: i32,
        version: Option<Version>,
    },
    UpdateBlock {
        id: ClientId,
        p: i32,
        q: i32,
        x: i32,
        y: i32,
        z: i32,
        w: i32,
    },
    UpdateState {
        id: ClientId,
        state: PlayerState,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    FetchChunk {
        blocks: Vec<[i32; 4]>,
        version: Version,
    },
    UpdateBlock {
        version: Version,
    },
    UpdateState {
        players: BTreeMap<ClientId, PlayerState>,
    },
    Error(String),
}

/// Pushed by the authority without a matching request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    UpdateBlock {
        id: ClientId,
        p: i32,
        q: i32,
        x: i32,
        y: i32,
        z: i32,
        w: i32,
    },
    RemovePlayer {
        id: ClientId,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Hello { client_id: ClientId },
    Request { seq: u64, body: Request },
    Response { seq: u64, body: Response },
    Notify(Notification),
}
