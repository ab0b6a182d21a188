use std::cmp;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;

use draftroom_interface::draft::model::{
    DraftPick, DraftRoom, PickRequest, PickTimer, RoomSpec, RoomStatus, TurnAdvance,
};
use draftroom_interface::draft::protocol::ServerEvent;
use draftroom_interface::draft::service::{
    AutoPickStrategyHandle, DraftService, RosterLegalityCheckHandle,
};
use draftroom_interface::errors::{AppError, Result};

use crate::connections::ConnectionTracker;
use crate::rooms::{RoomHandle, RoomStore, TimerTask};

/// In-memory draft room orchestrator. Owns the room registry and the
/// per-room pick timers; the hosting process controls its lifecycle
/// through `new` and `shutdown`.
#[derive(Clone)]
pub struct DraftOrchestrator {
    core: Arc<OrchestratorCore>,
}

impl DraftOrchestrator {
    pub fn new(autopick: AutoPickStrategyHandle, roster_check: RosterLegalityCheckHandle) -> Self {
        Self {
            core: Arc::new(OrchestratorCore {
                rooms: RoomStore::new(),
                connections: ConnectionTracker::new(),
                autopick,
                roster_check,
            }),
        }
    }
}

struct OrchestratorCore {
    rooms: RoomStore,
    connections: ConnectionTracker,
    autopick: AutoPickStrategyHandle,
    roster_check: RosterLegalityCheckHandle,
}

impl OrchestratorCore {
    /// Arm a fresh pick timer for the team on the clock. Must be called
    /// with the room's state lock held; any previously armed timer is
    /// invalidated and aborted.
    fn arm_timer(self: &Arc<Self>, room: &Arc<RoomHandle>, state: &mut DraftRoom) -> Result<()> {
        let seconds = state.settings.time_per_pick;
        let start_time = Utc::now();
        let end_time = start_time + chrono::Duration::seconds(seconds as i64);
        state.timer = Some(PickTimer {
            start_time,
            end_time,
            remaining_seconds: seconds,
        });

        let seq = room.begin_timer()?;
        let deadline = Instant::now() + Duration::from_secs(seconds);
        let handle = tokio::spawn(run_timer(
            Arc::clone(self),
            Arc::clone(room),
            seq,
            deadline,
        ));
        room.install_timer(TimerTask { seq, handle, deadline })?;

        room.broadcast(&ServerEvent::TimerStarted {
            time_remaining: seconds,
            end_time,
        });
        Ok(())
    }

    /// Move the room past a committed pick: roll the round counter, finish
    /// the draft, or put the next team on the clock. The caller holds the
    /// state lock and has already cancelled the previous timer.
    fn advance_room(self: &Arc<Self>, room: &Arc<RoomHandle>, state: &mut DraftRoom) -> Result<()> {
        match state.advance() {
            TurnAdvance::Completed => {
                tracing::info!(
                    room_id = %state.id,
                    picks = state.picks.len(),
                    "draft completed"
                );
                room.broadcast(&ServerEvent::DraftCompleted(state.clone()));
            }
            TurnAdvance::Next { completed_round } => {
                if let Some(round) = completed_round {
                    room.broadcast(&ServerEvent::RoundComplete {
                        round,
                        next_round: round + 1,
                    });
                }
                self.arm_timer(room, state)?;
                room.broadcast(&ServerEvent::DraftState(state.clone()));
            }
        }
        Ok(())
    }

    /// Pause the room if it is active; a no-op otherwise. The caller holds
    /// the state lock. Pausing never touches committed picks, which makes
    /// it the safe resolution for any timer-path fault.
    fn pause_locked(&self, room: &RoomHandle, state: &mut DraftRoom, reason: &str) -> Result<()> {
        if state.status != RoomStatus::Active {
            return Ok(());
        }

        room.cancel_timer()?;
        state.timer = None;
        state.status = RoomStatus::Paused;
        state.paused_at = Some(Utc::now());

        tracing::info!(room_id = %state.id, reason, "draft paused");
        room.broadcast(&ServerEvent::DraftPaused {
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Expiry callback for timer generation `seq`. Anything that armed or
    /// cancelled a timer since then bumped the sequence, in which case this
    /// callback lost the race and must do nothing.
    async fn handle_timer_expired(self: &Arc<Self>, room: &Arc<RoomHandle>, seq: u64) -> Result<()> {
        let mut state = room.lock().await;

        if !room.is_current_timer(seq)? {
            return Ok(());
        }
        room.clear_timer()?;
        state.timer = None;

        if state.status != RoomStatus::Active {
            return Ok(());
        }

        let team = state
            .current_drafting_team()
            .cloned()
            .ok_or_else(|| AppError::TimerInternalError {
                msg: "no participant is on the clock".to_string(),
            })?;

        if state.settings.autopick_after_timeout || team.autopick_enabled {
            let choice =
                self.autopick
                    .choose(&state)
                    .ok_or_else(|| AppError::TimerInternalError {
                        msg: format!(
                            "auto-pick strategy returned no player for team '{}'",
                            team.team_id
                        ),
                    })?;
            let request = PickRequest {
                player_id: choice.player_id,
                player_name: choice.player_name,
                position: choice.position,
            };
            let pick = state.record_pick(&team.team_id, &request, true)?;

            tracing::info!(
                room_id = %state.id,
                team_id = %team.team_id,
                player_id = %pick.player_id,
                "pick clock expired, picked automatically"
            );
            room.broadcast(&ServerEvent::PickMade(pick));
            self.advance_room(room, &mut state)?;
        } else {
            self.pause_locked(room, &mut state, "timer_expired_no_autopick")?;
        }
        Ok(())
    }
}

/// Clone the room state for callers outside the exclusive section. The
/// stored `remaining_seconds` is only accurate at arm time, so it is
/// recomputed here from the armed deadline. Callers hold the state lock.
fn snapshot_with_clock(room: &RoomHandle, state: &DraftRoom) -> Result<DraftRoom> {
    let mut snapshot = state.clone();
    if let Some(timer) = snapshot.timer.as_mut() {
        if let Some(deadline) = room.timer_deadline()? {
            timer.remaining_seconds = deadline.saturating_duration_since(Instant::now()).as_secs();
        }
    }
    Ok(snapshot)
}

/// Countdown task for one armed timer. Remaining time is always recomputed
/// from the absolute deadline, so per-second emissions never accumulate
/// drift the way re-armed one-second timeouts would.
async fn run_timer(
    core: Arc<OrchestratorCore>,
    room: Arc<RoomHandle>,
    seq: u64,
    deadline: Instant,
) {
    let mut last_reported = 0u64;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let next_tick = cmp::min(deadline, now + Duration::from_secs(1));
        tokio::time::sleep_until(next_tick).await;

        let remaining = deadline.saturating_duration_since(Instant::now()).as_secs();
        if remaining == 0 {
            break;
        }
        if remaining != last_reported {
            last_reported = remaining;
            room.broadcast(&ServerEvent::TimerUpdate {
                time_remaining: remaining,
            });
        }
    }

    if let Err(err) = core.handle_timer_expired(&room, seq).await {
        // A fault here must not leave the room in an undefined running
        // state; pausing preserves every committed pick.
        tracing::error!(error = %err, "timer expiry handling failed, pausing the room");
        let mut state = room.lock().await;
        if let Err(err) = core.pause_locked(&room, &mut state, "timer_fault") {
            tracing::error!(error = %err, room_id = %state.id, "failed to pause faulted room");
        }
    }
}

#[async_trait]
impl DraftService for DraftOrchestrator {
    async fn create_room(&self, spec: RoomSpec) -> Result<DraftRoom> {
        let room = DraftRoom::from_spec(spec)?;
        tracing::info!(
            room_id = %room.id,
            league_id = %room.league_id,
            teams = room.participants.len(),
            rounds = room.total_rounds,
            "draft room created"
        );
        let handle = self.core.rooms.insert(room)?;
        let state = handle.lock().await;
        Ok(state.clone())
    }

    async fn start_draft(&self, room_id: &str) -> Result<DraftRoom> {
        let room = self.core.rooms.get(room_id)?;
        let mut state = room.lock().await;

        if state.status != RoomStatus::Scheduled {
            return Err(AppError::InvalidTransition {
                msg: format!(
                    "room '{}' cannot start from status '{}'",
                    room_id, state.status
                ),
            });
        }

        state.status = RoomStatus::Active;
        state.started_at = Some(Utc::now());
        self.core.arm_timer(&room, &mut state)?;
        room.broadcast(&ServerEvent::DraftState(state.clone()));

        tracing::info!(room_id = %state.id, "draft started");
        Ok(state.clone())
    }

    async fn delete_room(&self, room_id: &str) -> Result<bool> {
        match self.core.rooms.remove(room_id)? {
            Some(room) => {
                // A stale expiry callback against the removed room is
                // rejected by the sequence bump.
                room.cancel_timer()?;
                tracing::info!(room_id, "draft room deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_rooms(&self) -> Result<Vec<String>> {
        self.core.rooms.ids()
    }

    async fn room_snapshot(&self, room_id: &str) -> Result<DraftRoom> {
        let room = self.core.rooms.get(room_id)?;
        let state = room.lock().await;
        snapshot_with_clock(&room, &state)
    }

    async fn join_room(
        &self,
        room_id: &str,
        user_id: &str,
        team_id: &str,
        socket_addr: SocketAddr,
    ) -> Result<(broadcast::Receiver<String>, DraftRoom)> {
        let room = self.core.rooms.get(room_id)?;
        let first_connection = self.core.connections.register(user_id, socket_addr)?;

        let mut state = room.lock().await;
        if let Some(participant) = state.participant_mut(team_id) {
            if !participant.is_online {
                participant.is_online = true;
                room.broadcast(&ServerEvent::ParticipantJoined {
                    team_id: team_id.to_string(),
                    is_online: true,
                    timestamp: Utc::now(),
                });
            }
        }

        tracing::debug!(
            room_id,
            user_id,
            team_id,
            %socket_addr,
            first_connection,
            "socket joined draft room"
        );
        let snapshot = snapshot_with_clock(&room, &state)?;
        Ok((room.subscribe(), snapshot))
    }

    async fn leave_room(
        &self,
        room_id: &str,
        user_id: &str,
        team_id: &str,
        socket_addr: SocketAddr,
    ) -> Result<()> {
        let last_connection = self.core.connections.deregister(user_id, socket_addr)?;
        if !last_connection {
            return Ok(());
        }

        // The room may already be gone; a dangling socket teardown is fine.
        let room = match self.core.rooms.get(room_id) {
            Ok(room) => room,
            Err(AppError::RoomNotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };

        let mut state = room.lock().await;
        if let Some(participant) = state.participant_mut(team_id) {
            participant.is_online = false;
        }
        room.broadcast(&ServerEvent::ParticipantLeft {
            team_id: team_id.to_string(),
            is_online: false,
            timestamp: Utc::now(),
        });

        if state.settings.pause_on_disconnect {
            self.core
                .pause_locked(&room, &mut state, "participant_disconnected")?;
        }
        Ok(())
    }

    async fn make_pick(
        &self,
        room_id: &str,
        team_id: &str,
        request: PickRequest,
    ) -> Result<DraftPick> {
        let room = self.core.rooms.get(room_id)?;
        let mut state = room.lock().await;

        state.ensure_active()?;
        state.ensure_on_the_clock(team_id)?;
        if state.is_player_drafted(&request.player_id) {
            return Err(AppError::PlayerAlreadyDrafted {
                player_id: request.player_id,
            });
        }
        self.core
            .roster_check
            .check(&state, team_id, &request.player_id)
            .map_err(|err| match err {
                AppError::PickRejected { .. } => err,
                other => AppError::PickRejected {
                    msg: other.to_string(),
                },
            })?;

        let pick = state.record_pick(team_id, &request, false)?;
        room.cancel_timer()?;
        state.timer = None;

        tracing::info!(
            room_id,
            team_id,
            player_id = %pick.player_id,
            overall_pick = pick.overall_pick,
            "pick made"
        );
        room.broadcast(&ServerEvent::PickMade(pick.clone()));
        self.core.advance_room(&room, &mut state)?;

        Ok(pick)
    }

    async fn toggle_autopick(&self, room_id: &str, team_id: &str, enabled: bool) -> Result<()> {
        let room = self.core.rooms.get(room_id)?;
        let mut state = room.lock().await;

        let participant =
            state
                .participant_mut(team_id)
                .ok_or_else(|| AppError::UnknownParticipant {
                    team_id: team_id.to_string(),
                    room_id: room_id.to_string(),
                })?;
        participant.autopick_enabled = enabled;

        // The running timer is unaffected; the flag is read at expiry.
        room.broadcast(&ServerEvent::AutopickToggled {
            team_id: team_id.to_string(),
            enabled,
        });
        Ok(())
    }

    async fn pause_draft(&self, room_id: &str, reason: &str) -> Result<()> {
        let room = self.core.rooms.get(room_id)?;
        let mut state = room.lock().await;
        self.core.pause_locked(&room, &mut state, reason)
    }

    async fn resume_draft(&self, room_id: &str) -> Result<()> {
        let room = self.core.rooms.get(room_id)?;
        let mut state = room.lock().await;

        if state.status != RoomStatus::Paused {
            return Ok(());
        }

        state.status = RoomStatus::Active;
        state.paused_at = None;
        // Remaining time from before the pause is deliberately discarded;
        // the clock restarts at the full per-pick allowance.
        self.core.arm_timer(&room, &mut state)?;

        tracing::info!(room_id, "draft resumed");
        room.broadcast(&ServerEvent::DraftResumed {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn send_chat(&self, room_id: &str, team_id: &str, message: &str) -> Result<()> {
        let room = self.core.rooms.get(room_id)?;

        room.broadcast(&ServerEvent::ChatMessage {
            id: Utc::now().timestamp_millis().to_string(),
            team_id: team_id.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn shutdown(&self) {
        match self.core.rooms.drain() {
            Ok(rooms) => {
                for room in rooms {
                    if let Err(err) = room.cancel_timer() {
                        tracing::error!(error = %err, "failed to cancel a timer during shutdown");
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to drain rooms during shutdown"),
        }
        if let Err(err) = self.core.connections.clear() {
            tracing::error!(error = %err, "failed to clear connections during shutdown");
        }
        tracing::info!("draft orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::autopick::{AllowAllRosterCheck, BestAvailableAutoPick};
    use draftroom_interface::draft::model::{ParticipantSpec, RoomSettings};
    use draftroom_interface::draft::service::PlayerChoice;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn pick_request(player_id: &str) -> PickRequest {
        PickRequest {
            player_id: player_id.to_string(),
            player_name: format!("Player {}", player_id),
            position: "QB".to_string(),
        }
    }

    fn spec(teams: &[&str], total_rounds: u32, settings: RoomSettings) -> RoomSpec {
        RoomSpec {
            id: "d1".to_string(),
            league_id: "l1".to_string(),
            participants: teams
                .iter()
                .map(|id| ParticipantSpec {
                    team_id: id.to_string(),
                    team_name: format!("Team {}", id),
                })
                .collect(),
            draft_order: teams.iter().map(|id| id.to_string()).collect(),
            total_rounds,
            settings,
        }
    }

    fn orchestrator() -> DraftOrchestrator {
        DraftOrchestrator::new(
            Arc::new(BestAvailableAutoPick::new(vec![PlayerChoice {
                player_id: "ranked-1".to_string(),
                player_name: "Ranked One".to_string(),
                position: "RB".to_string(),
            }])),
            Arc::new(AllowAllRosterCheck),
        )
    }

    async fn settle() {
        // Let spawned timer tasks run to their next await point.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn drain_events(rx: &mut broadcast::Receiver<String>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn room_lifecycle_round_trip() {
        let svc = orchestrator();

        let room = svc
            .create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();
        assert_eq!(room.status, RoomStatus::Scheduled);
        assert_eq!(svc.list_rooms().await.unwrap(), vec!["d1".to_string()]);

        assert!(svc.delete_room("d1").await.unwrap());
        assert!(!svc.delete_room("d1").await.unwrap());
        assert!(matches!(
            svc.room_snapshot("d1").await.unwrap_err(),
            AppError::RoomNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn start_requires_a_scheduled_room() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();

        let started = svc.start_draft("d1").await.unwrap();
        assert_eq!(started.status, RoomStatus::Active);
        assert!(started.timer.is_some());

        assert!(matches!(
            svc.start_draft("d1").await.unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_validation_covers_turn_status_and_uniqueness() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();

        // No picks before the draft starts.
        assert!(matches!(
            svc.make_pick("d1", "T1", pick_request("P1")).await.unwrap_err(),
            AppError::DraftNotActive { .. }
        ));

        svc.start_draft("d1").await.unwrap();

        assert!(matches!(
            svc.make_pick("d1", "T2", pick_request("P1")).await.unwrap_err(),
            AppError::NotYourTurn { .. }
        ));

        svc.make_pick("d1", "T1", pick_request("P1")).await.unwrap();
        assert!(matches!(
            svc.make_pick("d1", "T2", pick_request("P1")).await.unwrap_err(),
            AppError::PlayerAlreadyDrafted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_picks_yield_one_success() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();
        svc.start_draft("d1").await.unwrap();

        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.make_pick("d1", "T1", pick_request("P1")).await })
        };
        let second = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.make_pick("d1", "T1", pick_request("P2")).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let turn_errors = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::NotYourTurn { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(turn_errors, 1);

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.picks.len(), 1);
        assert_eq!(state.current_pick, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_picks_from_two_teams_yield_one_success() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2", "T3"], 2, RoomSettings::default()))
            .await
            .unwrap();
        svc.start_draft("d1").await.unwrap();

        // T3 is never on the clock after a single advance, so whichever
        // order the tasks run in, only T1's pick can land.
        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.make_pick("d1", "T1", pick_request("P1")).await })
        };
        let second = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.make_pick("d1", "T3", pick_request("P2")).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AppError::NotYourTurn { .. })));

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.picks.len(), 1);
        assert_eq!(state.picks[0].team_id, "T1");
        assert_eq!(state.current_pick, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reports_time_left_on_the_clock() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 90,
            autopick_after_timeout: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.timer.as_ref().unwrap().remaining_seconds, 50);

        // A client joining mid-countdown sees the same live value.
        let (_rx, joined) = svc.join_room("d1", "u1", "T2", addr(4000)).await.unwrap();
        assert_eq!(joined.timer.as_ref().unwrap().remaining_seconds, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_autopicks_when_room_policy_allows() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            autopick_after_timeout: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.picks.len(), 1);
        assert!(state.picks[0].autopick);
        assert_eq!(state.picks[0].team_id, "T1");
        assert_eq!(state.picks[0].player_id, "ranked-1");
        assert_eq!(state.current_pick, 2);
        assert_eq!(state.status, RoomStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_pauses_when_nobody_autopicks() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            autopick_after_timeout: false,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();

        let (mut rx, _) = svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.status, RoomStatus::Paused);
        assert!(state.picks.is_empty());
        assert_eq!(state.current_pick, 1);

        let paused_reason = drain_events(&mut rx).into_iter().find_map(|event| match event {
            ServerEvent::DraftPaused { reason, .. } => reason,
            _ => None,
        });
        assert_eq!(
            paused_reason.as_deref(),
            Some("timer_expired_no_autopick")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn participant_toggle_enables_autopick_on_expiry() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            autopick_after_timeout: false,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.toggle_autopick("d1", "T1", true).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.status, RoomStatus::Active);
        assert_eq!(state.picks.len(), 1);
        assert!(state.picks[0].autopick);
    }

    #[tokio::test]
    async fn toggle_autopick_rejects_an_unknown_team() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();

        assert!(matches!(
            svc.toggle_autopick("d1", "T9", true).await.unwrap_err(),
            AppError::UnknownParticipant { .. }
        ));

        let state = svc.room_snapshot("d1").await.unwrap();
        assert!(state.participants.iter().all(|p| !p.autopick_enabled));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_the_timer_at_full_duration() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 60,
            autopick_after_timeout: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        svc.pause_draft("d1", "commissioner_pause").await.unwrap();

        let paused = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(paused.status, RoomStatus::Paused);
        assert!(paused.timer.is_none());
        assert!(paused.paused_at.is_some());

        svc.resume_draft("d1").await.unwrap();
        let resumed = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(resumed.timer.as_ref().unwrap().remaining_seconds, 60);

        // The 45 seconds left before the pause do not apply: nothing
        // expires until a full fresh allowance elapses.
        tokio::time::sleep(Duration::from_secs(50)).await;
        settle().await;
        assert!(svc.room_snapshot("d1").await.unwrap().picks.is_empty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(svc.room_snapshot("d1").await.unwrap().picks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn made_pick_cancels_the_running_timer() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            autopick_after_timeout: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        svc.make_pick("d1", "T1", pick_request("P1")).await.unwrap();

        // Cross the original deadline; the cancelled timer must not fire.
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;

        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.picks.len(), 1);
        assert!(!state.picks[0].autopick);
        assert_eq!(state.current_pick, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_cancels_any_outstanding_timer() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            autopick_after_timeout: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        assert!(svc.delete_room("d1").await.unwrap());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert!(matches!(
            svc.room_snapshot("d1").await.unwrap_err(),
            AppError::RoomNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn join_is_idempotent_per_connection() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();

        let (_rx1, first) = svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();
        let (_rx2, second) = svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();

        assert_eq!(first.participants.len(), second.participants.len());
        assert!(second.participant("T1").unwrap().is_online);
    }

    #[tokio::test(start_paused = true)]
    async fn last_disconnect_pauses_when_policy_says_so() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 600,
            pause_on_disconnect: true,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();

        // Two tabs for the same user: closing one keeps the draft running.
        svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();
        let (mut rx, _) = svc.join_room("d1", "u1", "T1", addr(4001)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        svc.leave_room("d1", "u1", "T1", addr(4000)).await.unwrap();
        assert_eq!(
            svc.room_snapshot("d1").await.unwrap().status,
            RoomStatus::Active
        );

        svc.leave_room("d1", "u1", "T1", addr(4001)).await.unwrap();
        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.status, RoomStatus::Paused);
        assert!(!state.participant("T1").unwrap().is_online);

        let paused_reason = drain_events(&mut rx).into_iter().find_map(|event| match event {
            ServerEvent::DraftPaused { reason, .. } => reason,
            _ => None,
        });
        assert_eq!(paused_reason.as_deref(), Some("participant_disconnected"));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_follow_the_pick_sequence() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 1, RoomSettings::default()))
            .await
            .unwrap();
        let (mut rx, _) = svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        svc.make_pick("d1", "T1", pick_request("P1")).await.unwrap();
        svc.make_pick("d1", "T2", pick_request("P2")).await.unwrap();

        let events = drain_events(&mut rx);
        let picks_made = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::PickMade(_)))
            .count();
        assert_eq!(picks_made, 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::DraftCompleted(room) if room.status == RoomStatus::Completed)));

        // A one-round, two-team room is complete after two picks.
        let state = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(state.status, RoomStatus::Completed);
        assert!(state.timer.is_none());
        assert!(matches!(
            svc.make_pick("d1", "T1", pick_request("P3")).await.unwrap_err(),
            AppError::DraftNotActive { .. }
        ));
    }

    #[tokio::test]
    async fn chat_fans_out_without_touching_state() {
        let svc = orchestrator();
        svc.create_room(spec(&["T1", "T2"], 2, RoomSettings::default()))
            .await
            .unwrap();
        let (mut rx, before) = svc.join_room("d1", "u1", "T1", addr(4000)).await.unwrap();

        svc.send_chat("d1", "T1", "good luck everyone").await.unwrap();

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            ServerEvent::ChatMessage { team_id, message, .. }
                if team_id == "T1" && message == "good luck everyone"
        )));

        let after = svc.room_snapshot("d1").await.unwrap();
        assert_eq!(before.current_pick, after.current_pick);
        assert_eq!(before.picks.len(), after.picks.len());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_rooms_and_timers() {
        let svc = orchestrator();
        let settings = RoomSettings {
            time_per_pick: 5,
            ..RoomSettings::default()
        };
        svc.create_room(spec(&["T1", "T2"], 2, settings)).await.unwrap();
        svc.start_draft("d1").await.unwrap();

        svc.shutdown().await;

        assert!(svc.list_rooms().await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
    }
}
