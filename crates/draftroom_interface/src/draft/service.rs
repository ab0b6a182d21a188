use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::draft::model::{DraftPick, DraftRoom, PickRequest, RoomSpec};
use crate::errors::Result;

/// The draft room orchestrator surface. Room lifecycle operations are
/// driven over REST; everything keyed by a `SocketAddr` comes from the
/// websocket layer, which captures the caller's identity at join time.
#[async_trait]
pub trait DraftService {
    // Room lifecycle (REST).
    async fn create_room(&self, spec: RoomSpec) -> Result<DraftRoom>;
    async fn start_draft(&self, room_id: &str) -> Result<DraftRoom>;
    async fn delete_room(&self, room_id: &str) -> Result<bool>;
    async fn list_rooms(&self) -> Result<Vec<String>>;
    async fn room_snapshot(&self, room_id: &str) -> Result<DraftRoom>;

    // Socket commands.
    async fn join_room(
        &self,
        room_id: &str,
        user_id: &str,
        team_id: &str,
        socket_addr: SocketAddr,
    ) -> Result<(broadcast::Receiver<String>, DraftRoom)>;
    async fn leave_room(
        &self,
        room_id: &str,
        user_id: &str,
        team_id: &str,
        socket_addr: SocketAddr,
    ) -> Result<()>;
    async fn make_pick(
        &self,
        room_id: &str,
        team_id: &str,
        request: PickRequest,
    ) -> Result<DraftPick>;
    async fn toggle_autopick(&self, room_id: &str, team_id: &str, enabled: bool) -> Result<()>;
    async fn pause_draft(&self, room_id: &str, reason: &str) -> Result<()>;
    async fn resume_draft(&self, room_id: &str) -> Result<()>;
    async fn send_chat(&self, room_id: &str, team_id: &str, message: &str) -> Result<()>;

    /// Cancel every outstanding timer and drop all rooms.
    async fn shutdown(&self);
}

pub type DraftServiceHandle = Arc<dyn DraftService + Send + Sync>;

/// Player handed back by an auto-pick strategy.
#[derive(Debug, Clone)]
pub struct PlayerChoice {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
}

/// Chooses a player when a pick must be made on a participant's behalf.
/// Called inside the room's exclusive section, so it must return quickly.
pub trait AutoPickStrategy: Send + Sync {
    fn choose(&self, room: &DraftRoom) -> Option<PlayerChoice>;
}

pub type AutoPickStrategyHandle = Arc<dyn AutoPickStrategy>;

/// External roster legality decision, also called inside the room's
/// exclusive section. Rejections surface as `PickRejected` to the caller.
pub trait RosterLegalityCheck: Send + Sync {
    fn check(&self, room: &DraftRoom, team_id: &str, player_id: &str) -> Result<()>;
}

pub type RosterLegalityCheckHandle = Arc<dyn RosterLegalityCheck>;
