//! Cross-device completion relay.
//!
//! A paired device (a watch, another desktop) reports completions and
//! snoozes as small JSON messages. They feed the same resolution path as
//! local actions, so a remote completion is indistinguishable from pressing
//! Done here, duplicates included.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::trigger::EntityId;

/// Longest snooze a paired device may ask for: one day.
pub const MAX_REMOTE_SNOOZE_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RemoteMessage {
    #[serde(rename_all = "camelCase")]
    TaskCompleted { entity_id: EntityId },
    #[serde(rename_all = "camelCase")]
    Snooze { entity_id: EntityId, minutes: i64 },
}

impl RemoteMessage {
    /// Decode one message from the wire.
    pub fn parse(json: &str) -> Result<Self, ValidationError> {
        let message: RemoteMessage = serde_json::from_str(json)
            .map_err(|e| ValidationError::InvalidRemoteMessage(e.to_string()))?;
        if message.entity_id().as_str().is_empty() {
            return Err(ValidationError::InvalidRemoteMessage("empty entityId".into()));
        }
        if let RemoteMessage::Snooze { minutes, .. } = &message {
            if !(1..=MAX_REMOTE_SNOOZE_MINUTES).contains(minutes) {
                return Err(ValidationError::InvalidSnooze { minutes: *minutes });
            }
        }
        Ok(message)
    }

    pub fn entity_id(&self) -> &EntityId {
        match self {
            RemoteMessage::TaskCompleted { entity_id } | RemoteMessage::Snooze { entity_id, .. } => {
                entity_id
            }
        }
    }
}
