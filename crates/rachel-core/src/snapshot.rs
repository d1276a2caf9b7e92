//! Versioned snapshot serialization for external persistence.
//!
//! The core exposes pure serialize/deserialize over `GameState`; storage I/O
//! belongs to the collaborator consuming these documents.

use crate::game::GameState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(flatten)]
    game: GameState,
}

/// Serialize a game state to a versioned JSON document.
pub fn to_json(game: &GameState) -> Result<String, SnapshotError> {
    let doc = Snapshot {
        version: SNAPSHOT_VERSION,
        game: game.clone(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Restore a game state from a versioned JSON document.
pub fn from_json(json: &str) -> Result<GameState, SnapshotError> {
    let doc: Snapshot = serde_json::from_str(json)?;
    if doc.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(doc.version));
    }
    Ok(doc.game)
}
