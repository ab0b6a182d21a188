use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::model::{DraftPick, DraftRoom};
use crate::errors::{AppError, Result};

/// Commands the socket server accepts from clients. Every event name is
/// carried literally on the wire as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientCommand {
    JoinDraft {
        draft_id: String,
        user_id: String,
        team_id: String,
    },
    MakePick {
        player_id: String,
        player_name: String,
        position: String,
    },
    ToggleAutopick {
        enabled: bool,
    },
    DraftChat {
        message: String,
    },
    PauseDraft {},
    ResumeDraft {},
}

impl ClientCommand {
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| AppError::ParseError { msg: e.to_string() })
    }
}

/// Events fanned out to every socket subscribed to a room, plus the
/// `error` event sent back only to the originating connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
    DraftState(DraftRoom),
    PickMade(DraftPick),
    TimerStarted {
        time_remaining: u64,
        end_time: DateTime<Utc>,
    },
    TimerUpdate {
        time_remaining: u64,
    },
    RoundComplete {
        round: u32,
        next_round: u32,
    },
    DraftCompleted(DraftRoom),
    DraftPaused {
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    DraftResumed {
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        team_id: String,
        is_online: bool,
        timestamp: DateTime<Utc>,
    },
    ParticipantLeft {
        team_id: String,
        is_online: bool,
        timestamp: DateTime<Utc>,
    },
    AutopickToggled {
        team_id: String,
        enabled: bool,
    },
    ChatMessage {
        id: String,
        team_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn error(err: &AppError) -> Self {
        ServerEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    /// Encode for a websocket text frame. Serialization of these types
    /// cannot fail in practice; a failure still yields a valid frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"event\":\"error\",\"data\":{{\"code\":\"PARSE_ERROR\",\"message\":\"{}\"}}}}",
                e
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_draft_command() {
        let frame = r#"{"event":"join-draft","data":{"draftId":"d1","userId":"u1","teamId":"t1"}}"#;
        let command = ClientCommand::parse(frame).unwrap();
        assert!(matches!(
            command,
            ClientCommand::JoinDraft { draft_id, user_id, team_id }
                if draft_id == "d1" && user_id == "u1" && team_id == "t1"
        ));
    }

    #[test]
    fn parses_make_pick_command() {
        let frame = r#"{"event":"make-pick","data":{"playerId":"p9","playerName":"Some Player","position":"WR"}}"#;
        let command = ClientCommand::parse(frame).unwrap();
        assert!(matches!(
            command,
            ClientCommand::MakePick { player_id, .. } if player_id == "p9"
        ));
    }

    #[test]
    fn parses_pause_with_empty_payload() {
        let command = ClientCommand::parse(r#"{"event":"pause-draft","data":{}}"#).unwrap();
        assert!(matches!(command, ClientCommand::PauseDraft {}));
    }

    #[test]
    fn rejects_unknown_event() {
        assert!(ClientCommand::parse(r#"{"event":"trade-pick","data":{}}"#).is_err());
        assert!(ClientCommand::parse("not json").is_err());
    }

    #[test]
    fn server_events_use_wire_names() {
        let encoded = ServerEvent::TimerUpdate { time_remaining: 42 }.to_json();
        assert_eq!(encoded, r#"{"event":"timer-update","data":{"timeRemaining":42}}"#);

        let encoded = ServerEvent::AutopickToggled {
            team_id: "t1".to_string(),
            enabled: true,
        }
        .to_json();
        assert_eq!(
            encoded,
            r#"{"event":"autopick-toggled","data":{"teamId":"t1","enabled":true}}"#
        );
    }

    #[test]
    fn error_event_carries_code_and_message() {
        let err = AppError::NotYourTurn {
            team_id: "t2".to_string(),
        };
        let encoded = ServerEvent::error(&err).to_json();
        assert!(encoded.contains("\"code\":\"NOT_YOUR_TURN\""));
        assert!(encoded.contains("t2"));
    }
}
