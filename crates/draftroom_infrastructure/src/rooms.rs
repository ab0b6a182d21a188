use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use draftroom_interface::draft::model::DraftRoom;
use draftroom_interface::draft::protocol::ServerEvent;
use draftroom_interface::errors::{AppError, Result};

const ROOM_CHANNEL_CAPACITY: usize = 100;

/// Countdown task armed for the current pick. The sequence number ties an
/// expiry callback to the arm that spawned it, so a cancelled timer that
/// has already fired is detected and dropped instead of acting on a room
/// that moved on.
pub struct TimerTask {
    pub seq: u64,
    pub handle: JoinHandle<()>,
    pub deadline: Instant,
}

/// One live draft room. The tokio mutex around the state is the room's
/// exclusive section: every mutation (pick, advance, pause, resume, timer
/// expiry) must hold it, which serializes commands in arrival order.
pub struct RoomHandle {
    state: Mutex<DraftRoom>,
    tx: broadcast::Sender<String>,
    timer: StdMutex<Option<TimerTask>>,
    timer_seq: AtomicU64,
}

impl RoomHandle {
    pub fn new(room: DraftRoom) -> Self {
        Self {
            state: Mutex::new(room),
            tx: broadcast::channel(ROOM_CHANNEL_CAPACITY).0,
            timer: StdMutex::new(None),
            timer_seq: AtomicU64::new(0),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, DraftRoom> {
        self.state.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Fan an event out to every socket subscribed to this room. A send
    /// error only means nobody is listening right now.
    pub fn broadcast(&self, event: &ServerEvent) {
        let _ = self.tx.send(event.to_json());
    }

    /// Invalidate and abort whatever timer is armed, then reserve the next
    /// sequence number. Callers must hold the room's state lock.
    pub fn begin_timer(&self) -> Result<u64> {
        let seq = self.timer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slot = self
            .timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;
        if let Some(task) = slot.take() {
            task.handle.abort();
        }
        Ok(seq)
    }

    pub fn install_timer(&self, task: TimerTask) -> Result<()> {
        let mut slot = self
            .timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;
        if let Some(previous) = slot.replace(task) {
            previous.handle.abort();
        }
        Ok(())
    }

    /// Deadline of the armed timer, if any. Snapshots read this to report
    /// how much of the pick allowance is actually left.
    pub fn timer_deadline(&self) -> Result<Option<Instant>> {
        let slot = self
            .timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;
        Ok(slot.as_ref().map(|task| task.deadline))
    }

    /// True while `seq` is still the armed timer generation.
    pub fn is_current_timer(&self, seq: u64) -> Result<bool> {
        let slot = self
            .timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;
        Ok(slot.as_ref().map(|task| task.seq) == Some(seq))
    }

    /// Drop the armed timer without aborting it; used by the expiry task
    /// itself once it has claimed its generation.
    pub fn clear_timer(&self) -> Result<()> {
        self.timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .take();
        Ok(())
    }

    /// Abort and drop the armed timer. Stale expiry callbacks that already
    /// fired are rejected by the sequence bump.
    pub fn cancel_timer(&self) -> Result<()> {
        self.timer_seq.fetch_add(1, Ordering::SeqCst);
        let task = self
            .timer
            .lock()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .take();
        if let Some(task) = task {
            task.handle.abort();
        }
        Ok(())
    }
}

/// Registry of all active rooms. Only map-level insert/lookup/remove is
/// guarded here; room field mutation goes through each room's own lock.
#[derive(Default)]
pub struct RoomStore {
    rooms: RwLock<HashMap<String, Arc<RoomHandle>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room: DraftRoom) -> Result<Arc<RoomHandle>> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;

        if rooms.contains_key(&room.id) {
            return Err(AppError::InvalidRoomSpec {
                msg: format!("a room with id '{}' already exists", room.id),
            });
        }

        let handle = Arc::new(RoomHandle::new(room.clone()));
        rooms.insert(room.id, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, room_id: &str) -> Result<Arc<RoomHandle>> {
        self.rooms
            .read()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .get(room_id)
            .cloned()
            .ok_or(AppError::RoomNotFound {
                room_id: room_id.to_string(),
            })
    }

    pub fn remove(&self, room_id: &str) -> Result<Option<Arc<RoomHandle>>> {
        Ok(self
            .rooms
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .remove(room_id))
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .rooms
            .read()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .keys()
            .cloned()
            .collect())
    }

    /// Remove every room, returning the handles so outstanding timers can
    /// be cancelled.
    pub fn drain(&self) -> Result<Vec<Arc<RoomHandle>>> {
        Ok(self
            .rooms
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .drain()
            .map(|(_, handle)| handle)
            .collect())
    }
}
