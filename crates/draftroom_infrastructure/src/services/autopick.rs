use rand::seq::SliceRandom;
use rand::thread_rng;

use draftroom_interface::draft::model::DraftRoom;
use draftroom_interface::draft::service::{AutoPickStrategy, PlayerChoice, RosterLegalityCheck};
use draftroom_interface::errors::Result;

// How many of the top remaining players the strategy picks between.
const JITTER_WINDOW: usize = 3;

/// Best-available auto-pick over a ranked player pool, with a small random
/// jitter between near-equal ranks so every autopicking room does not end
/// up with identical rosters. With an exhausted (or empty) pool it falls
/// back to a placeholder player keyed by the overall pick number, which
/// keeps the no-double-draft invariant intact.
#[derive(Default)]
pub struct BestAvailableAutoPick {
    ranked_pool: Vec<PlayerChoice>,
}

impl BestAvailableAutoPick {
    pub fn new(ranked_pool: Vec<PlayerChoice>) -> Self {
        Self { ranked_pool }
    }
}

impl AutoPickStrategy for BestAvailableAutoPick {
    fn choose(&self, room: &DraftRoom) -> Option<PlayerChoice> {
        let available: Vec<&PlayerChoice> = self
            .ranked_pool
            .iter()
            .filter(|player| !room.is_player_drafted(&player.player_id))
            .take(JITTER_WINDOW)
            .collect();

        match available.choose(&mut thread_rng()) {
            Some(player) => Some((*player).clone()),
            None => Some(PlayerChoice {
                player_id: format!("autopick-{}-{}", room.id, room.current_pick),
                player_name: format!("Auto Pick {}", room.current_pick),
                position: "BN".to_string(),
            }),
        }
    }
}

/// Roster legality is an external concern; the default accepts every pick.
pub struct AllowAllRosterCheck;

impl RosterLegalityCheck for AllowAllRosterCheck {
    fn check(&self, _room: &DraftRoom, _team_id: &str, _player_id: &str) -> Result<()> {
        Ok(())
    }
}
