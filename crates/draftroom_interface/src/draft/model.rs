use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Scheduled,
    Active,
    Paused,
    Completed,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoomStatus::Scheduled => write!(f, "scheduled"),
            RoomStatus::Active => write!(f, "active"),
            RoomStatus::Paused => write!(f, "paused"),
            RoomStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub snake_order: bool,
    /// Seconds each team has on the clock.
    pub time_per_pick: u64,
    pub autopick_after_timeout: bool,
    pub pause_on_disconnect: bool,
    pub allow_trades: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            snake_order: true,
            time_per_pick: 90,
            autopick_after_timeout: true,
            pause_on_disconnect: false,
            allow_trades: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftParticipant {
    pub team_id: String,
    pub team_name: String,
    /// 1-based position within the round 1 draft order.
    pub draft_position: u32,
    pub is_online: bool,
    pub autopick_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPick {
    pub id: String,
    pub room_id: String,
    pub team_id: String,
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub round: u32,
    pub pick_in_round: u32,
    pub overall_pick: u32,
    pub timestamp: DateTime<Utc>,
    pub autopick: bool,
}

/// Wall-clock view of the running countdown, carried in room snapshots.
/// `remaining_seconds` is refreshed from the armed deadline whenever a
/// snapshot is taken. The cancellable task driving it lives with the
/// room handle, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickTimer {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub remaining_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSpec {
    pub team_id: String,
    pub team_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSpec {
    pub id: String,
    pub league_id: String,
    pub participants: Vec<ParticipantSpec>,
    /// Team ids in round 1 pick order.
    pub draft_order: Vec<String>,
    pub total_rounds: u32,
    #[serde(default)]
    pub settings: RoomSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickRequest {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
}

/// Outcome of advancing the room to the next pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAdvance {
    /// The draft continues; `completed_round` is set when the advance
    /// crossed a round boundary.
    Next { completed_round: Option<u32> },
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRoom {
    pub id: String,
    pub league_id: String,
    pub status: RoomStatus,
    pub participants: Vec<DraftParticipant>,
    pub draft_order: Vec<String>,
    pub current_round: u32,
    /// Draft-wide 1-based pick counter; never reset between rounds.
    pub current_pick: u32,
    pub total_rounds: u32,
    pub picks: Vec<DraftPick>,
    pub settings: RoomSettings,
    pub timer: Option<PickTimer>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DraftRoom {
    /// Validate a room spec and build the initial `scheduled` room.
    pub fn from_spec(spec: RoomSpec) -> Result<Self> {
        if spec.participants.is_empty() {
            return Err(AppError::InvalidRoomSpec {
                msg: "a draft room needs at least one participant".to_string(),
            });
        }
        if spec.draft_order.len() != spec.participants.len() {
            return Err(AppError::InvalidRoomSpec {
                msg: format!(
                    "draft order has {} entries for {} participants",
                    spec.draft_order.len(),
                    spec.participants.len()
                ),
            });
        }
        if spec.total_rounds == 0 {
            return Err(AppError::InvalidRoomSpec {
                msg: "total rounds must be at least 1".to_string(),
            });
        }
        if spec.settings.time_per_pick == 0 {
            return Err(AppError::InvalidRoomSpec {
                msg: "time per pick must be at least 1 second".to_string(),
            });
        }

        let team_ids: HashSet<&str> = spec
            .participants
            .iter()
            .map(|p| p.team_id.as_str())
            .collect();
        if team_ids.len() != spec.participants.len() {
            return Err(AppError::InvalidRoomSpec {
                msg: "participant team ids must be unique".to_string(),
            });
        }
        let order_ids: HashSet<&str> = spec.draft_order.iter().map(String::as_str).collect();
        if order_ids != team_ids {
            return Err(AppError::InvalidRoomSpec {
                msg: "draft order must list every participant team exactly once".to_string(),
            });
        }

        let participants = spec
            .participants
            .into_iter()
            .map(|p| {
                // Position within draft_order; membership was validated above.
                let draft_position = spec
                    .draft_order
                    .iter()
                    .position(|id| *id == p.team_id)
                    .unwrap_or_default() as u32
                    + 1;
                DraftParticipant {
                    team_id: p.team_id,
                    team_name: p.team_name,
                    draft_position,
                    is_online: false,
                    autopick_enabled: false,
                }
            })
            .collect();

        Ok(Self {
            id: spec.id,
            league_id: spec.league_id,
            status: RoomStatus::Scheduled,
            participants,
            draft_order: spec.draft_order,
            current_round: 1,
            current_pick: 1,
            total_rounds: spec.total_rounds,
            picks: Vec::new(),
            settings: spec.settings,
            timer: None,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            completed_at: None,
        })
    }

    pub fn picks_per_round(&self) -> u32 {
        self.participants.len() as u32
    }

    /// 1-based position of the current pick within its round.
    pub fn pick_in_round(&self) -> u32 {
        ((self.current_pick - 1) % self.picks_per_round()) + 1
    }

    /// The participant entitled to the current pick. Even rounds reverse
    /// the draft order when snake mode is on.
    pub fn current_drafting_team(&self) -> Option<&DraftParticipant> {
        let pick_in_round = self.pick_in_round();
        let effective_position = if self.settings.snake_order && self.current_round % 2 == 0 {
            self.picks_per_round() - pick_in_round + 1
        } else {
            pick_in_round
        };

        self.participants
            .iter()
            .find(|p| p.draft_position == effective_position)
    }

    pub fn participant(&self, team_id: &str) -> Option<&DraftParticipant> {
        self.participants.iter().find(|p| p.team_id == team_id)
    }

    pub fn participant_mut(&mut self, team_id: &str) -> Option<&mut DraftParticipant> {
        self.participants.iter_mut().find(|p| p.team_id == team_id)
    }

    pub fn is_player_drafted(&self, player_id: &str) -> bool {
        self.picks.iter().any(|pick| pick.player_id == player_id)
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.status != RoomStatus::Active {
            return Err(AppError::DraftNotActive {
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_on_the_clock(&self, team_id: &str) -> Result<()> {
        match self.current_drafting_team() {
            Some(team) if team.team_id == team_id => Ok(()),
            _ => Err(AppError::NotYourTurn {
                team_id: team_id.to_string(),
            }),
        }
    }

    /// Append the current pick for `team_id`. Validates status, turn and
    /// player uniqueness; does not advance the turn.
    pub fn record_pick(&mut self, team_id: &str, request: &PickRequest, autopick: bool) -> Result<DraftPick> {
        self.ensure_active()?;
        self.ensure_on_the_clock(team_id)?;
        if self.is_player_drafted(&request.player_id) {
            return Err(AppError::PlayerAlreadyDrafted {
                player_id: request.player_id.clone(),
            });
        }

        let pick = DraftPick {
            id: format!("{}-{}", self.id, self.current_pick),
            room_id: self.id.clone(),
            team_id: team_id.to_string(),
            player_id: request.player_id.clone(),
            player_name: request.player_name.clone(),
            position: request.position.clone(),
            round: self.current_round,
            pick_in_round: self.pick_in_round(),
            overall_pick: self.current_pick,
            timestamp: Utc::now(),
            autopick,
        };

        self.picks.push(pick.clone());
        Ok(pick)
    }

    /// Move to the next pick, rolling the round counter forward and
    /// completing the draft once every round has been played out.
    pub fn advance(&mut self) -> TurnAdvance {
        let previous_round = self.current_round;
        self.current_pick += 1;

        let total_picks = self.total_rounds * self.picks_per_round();
        if self.current_pick > total_picks {
            // current_round == total_rounds + 1 marks completion.
            self.current_round = self.total_rounds + 1;
            self.status = RoomStatus::Completed;
            self.completed_at = Some(Utc::now());
            self.timer = None;
            return TurnAdvance::Completed;
        }

        self.current_round = (self.current_pick - 1) / self.picks_per_round() + 1;
        TurnAdvance::Next {
            completed_round: (self.current_round > previous_round).then_some(previous_round),
        }
    }
}
