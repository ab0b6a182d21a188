use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    RoomNotFound { room_id: String },
    UnknownParticipant { team_id: String, room_id: String },
    DraftNotActive { status: String },
    NotYourTurn { team_id: String },
    PlayerAlreadyDrafted { player_id: String },
    InvalidRoomSpec { msg: String },
    InvalidTransition { msg: String },
    PickRejected { msg: String },
    TimerInternalError { msg: String },
    LockError { msg: String },
    ParseError { msg: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable code carried in the `error` socket event.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RoomNotFound { .. } => "ROOM_NOT_FOUND",
            AppError::UnknownParticipant { .. } => "UNKNOWN_PARTICIPANT",
            AppError::DraftNotActive { .. } => "DRAFT_NOT_ACTIVE",
            AppError::NotYourTurn { .. } => "NOT_YOUR_TURN",
            AppError::PlayerAlreadyDrafted { .. } => "PLAYER_ALREADY_DRAFTED",
            AppError::InvalidRoomSpec { .. } => "INVALID_ROOM_SPEC",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::PickRejected { .. } => "PICK_REJECTED",
            AppError::TimerInternalError { .. } => "TIMER_INTERNAL_ERROR",
            AppError::LockError { .. } => "LOCK_ERROR",
            AppError::ParseError { .. } => "PARSE_ERROR",
        }
    }
}

impl std::error::Error for AppError {}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::RoomNotFound { room_id } => {
                write!(f, "no draft room found with id '{}'", room_id)
            }
            AppError::UnknownParticipant { team_id, room_id } => {
                write!(f, "team '{}' is not a participant of room '{}'", team_id, room_id)
            }
            AppError::DraftNotActive { status } => {
                write!(f, "the draft is not active (current status '{}')", status)
            }
            AppError::NotYourTurn { team_id } => {
                write!(f, "team '{}' is not on the clock", team_id)
            }
            AppError::PlayerAlreadyDrafted { player_id } => {
                write!(f, "player '{}' has already been drafted", player_id)
            }
            AppError::InvalidRoomSpec { msg } => write!(f, "invalid room spec: '{}'", msg),
            AppError::InvalidTransition { msg } => write!(f, "invalid transition: '{}'", msg),
            AppError::PickRejected { msg } => write!(f, "pick rejected: '{}'", msg),
            AppError::TimerInternalError { msg } => write!(f, "timer error: '{}'", msg),
            AppError::LockError { msg } => write!(f, "lock error: '{}'", msg),
            AppError::ParseError { msg } => write!(f, "parse error: '{}'", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::RoomNotFound { .. } | AppError::UnknownParticipant { .. } => {
                StatusCode::NOT_FOUND
            }
            AppError::DraftNotActive { .. }
            | AppError::NotYourTurn { .. }
            | AppError::PlayerAlreadyDrafted { .. }
            | AppError::InvalidTransition { .. }
            | AppError::PickRejected { .. } => StatusCode::CONFLICT,
            AppError::InvalidRoomSpec { .. } | AppError::ParseError { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::TimerInternalError { .. } | AppError::LockError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
