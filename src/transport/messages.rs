//! Wire messages between the session and its clients

use serde::{Deserialize, Serialize};

use crate::actions::{ChangeRecord, PrivilegedAction};
use crate::board::{GameState, Victory};
use crate::core::types::FactionId;

/// Server to client. Tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state, sent on connect and on reload. `awaiting_ack` names the
    /// batch the session is still waiting on, if any.
    Snapshot {
        state: GameState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        awaiting_ack: Option<u64>,
    },
    /// Records to animate, with the state they lead to. `appended` marks a
    /// privileged batch queued behind a batch that is still playing. Only an
    /// acknowledgement naming the newest `seq` resumes play, and it covers
    /// every batch before it.
    Batch {
        seq: u64,
        records: Vec<ChangeRecord>,
        appended: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commentary: Option<String>,
        state: GameState,
    },
    TurnStarted {
        faction: FactionId,
        round: u32,
        turn: u32,
        replay: bool,
    },
    GameOver { victory: Victory },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Client to server. Tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Privileged { action: PrivilegedAction },
    AnimationComplete { seq: u64 },
    ClientReloaded,
}
