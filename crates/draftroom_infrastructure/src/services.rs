use std::sync::Arc;

use axum::extract::FromRef;

use draftroom_interface::draft::service::{
    AutoPickStrategyHandle, DraftServiceHandle, RosterLegalityCheckHandle,
};

pub mod autopick;
pub mod draft_service;

use autopick::{AllowAllRosterCheck, BestAvailableAutoPick};
use draft_service::DraftOrchestrator;

#[derive(FromRef, Clone)]
pub struct ServiceRegistry {
    pub draft_service: DraftServiceHandle,
}

impl ServiceRegistry {
    /// Wires the orchestrator with the default collaborators. Hosts with a
    /// real player pool or roster rules inject their own via `with_parts`.
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(BestAvailableAutoPick::default()),
            Arc::new(AllowAllRosterCheck),
        )
    }

    pub fn with_parts(
        autopick: AutoPickStrategyHandle,
        roster_check: RosterLegalityCheckHandle,
    ) -> Self {
        let draft_service = Arc::new(DraftOrchestrator::new(autopick, roster_check));

        Self { draft_service }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
