//! Room registry: tenant-isolated broadcast groups
//!
//! Rooms are created lazily on first authenticated join and discarded
//! when the last device leaves. The registry map has its own short-lived
//! lock for lookup/insert/remove; everything per-room happens under that
//! room's lock only, so one tenant's traffic never contends on another's.
//!
//! Lock order is registry → room, and no lock is ever held across an
//! await (room operations are synchronous; the async edges are the
//! per-device mpsc channels).
//!
//! Backpressure: each device has a bounded outbound queue. Of the
//! drop-oldest-or-disconnect options, overflow disconnects the slow
//! device — it reconnects and catches up from the room snapshot, which
//! dropping frames silently would only postpone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use rz_core::config::RelayConfig;
use rz_core::types::{DeviceId, PrincipalId};

use crate::error::{RelayError, RelayResult};

/// Tunables lifted from [`RelayConfig`].
#[derive(Debug, Clone)]
pub struct RelayLimits {
    pub room_capacity: usize,
    pub outbound_queue_depth: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        let cfg = RelayConfig::default();
        Self { room_capacity: cfg.room_capacity, outbound_queue_depth: cfg.outbound_queue_depth }
    }
}

impl From<&RelayConfig> for RelayLimits {
    fn from(cfg: &RelayConfig) -> Self {
        Self { room_capacity: cfg.room_capacity, outbound_queue_depth: cfg.outbound_queue_depth }
    }
}

/// Counters surfaced through the daemon's metrics endpoint.
#[derive(Debug, Default)]
pub struct RelayStats {
    frames_forwarded: AtomicU64,
    auth_failures: AtomicU64,
}

impl RelayStats {
    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn auth_failures(&self) -> u64 {
        self.auth_failures.load(Ordering::Relaxed)
    }

    pub fn note_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }
}

struct RoomState {
    devices: HashMap<DeviceId, mpsc::Sender<Bytes>>,
    /// Append-only update log replayed to new joiners. The relay cannot
    /// merge CRDT state it cannot read, so the log *is* the snapshot;
    /// durable compaction is an external collaborator's job.
    snapshot: Vec<Bytes>,
}

struct Room {
    name: String,
    owner: PrincipalId,
    state: Mutex<RoomState>,
}

impl Room {
    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A cheap identifier for a joined connection, used to publish and leave.
#[derive(Clone)]
pub struct DeviceHandle {
    pub device_id: DeviceId,
    room: Arc<Room>,
}

impl DeviceHandle {
    pub fn room_name(&self) -> &str {
        &self.room.name
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("device_id", &self.device_id)
            .field("room", &self.room.name)
            .finish()
    }
}

/// Result of a successful join: the catch-up snapshot plus the outbound
/// frame queue this device must drain.
pub struct JoinedDevice {
    pub handle: DeviceHandle,
    pub snapshot: Vec<Bytes>,
    pub outbound: mpsc::Receiver<Bytes>,
}

/// All rooms known to this relay process.
pub struct RoomRegistry {
    limits: RelayLimits,
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    next_device: AtomicU64,
    stats: RelayStats,
}

impl RoomRegistry {
    pub fn new(limits: RelayLimits) -> Self {
        Self {
            limits,
            rooms: Mutex::new(HashMap::new()),
            next_device: AtomicU64::new(1),
            stats: RelayStats::default(),
        }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Join `room_name` as a device of `principal`.
    ///
    /// The room is created on first join with the joining principal as
    /// owner; thereafter the token's principal must equal that owner —
    /// this check, not the room name, is what separates tenants.
    pub fn join(&self, room_name: &str, principal: &PrincipalId) -> RelayResult<JoinedDevice> {
        let mut rooms = self.lock_rooms();

        let room = match rooms.get(room_name) {
            Some(room) => {
                if &room.owner != principal {
                    return Err(RelayError::OwnerMismatch { room: room_name.to_string() });
                }
                room.clone()
            }
            None => {
                let room = Arc::new(Room {
                    name: room_name.to_string(),
                    owner: principal.clone(),
                    state: Mutex::new(RoomState { devices: HashMap::new(), snapshot: Vec::new() }),
                });
                rooms.insert(room_name.to_string(), room.clone());
                debug!(room = room_name, owner = %principal, "room created");
                room
            }
        };

        let mut state = room.lock();
        if state.devices.len() >= self.limits.room_capacity {
            // A fresh room can never hit this, so no empty room leaks here.
            return Err(RelayError::CapacityExceeded {
                room: room_name.to_string(),
                limit: self.limits.room_capacity,
            });
        }

        let device_id = DeviceId(self.next_device.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.limits.outbound_queue_depth);
        state.devices.insert(device_id, tx);
        let snapshot = state.snapshot.clone();
        let peers = state.devices.len();
        drop(state);
        drop(rooms);

        debug!(room = room_name, device = %device_id, peers, "device joined");

        Ok(JoinedDevice { handle: DeviceHandle { device_id, room }, snapshot, outbound: rx })
    }

    /// Forward one opaque frame from `from` to every other device in its
    /// room, appending it to the catch-up snapshot first. The frame is
    /// broadcast unmodified; the relay never looks inside.
    ///
    /// Returns the number of devices the frame was queued for. Devices
    /// whose outbound queue is full (or already gone) are disconnected.
    pub fn publish(&self, from: &DeviceHandle, frame: Bytes) -> usize {
        let mut state = from.room.lock();

        state.snapshot.push(frame.clone());

        let mut delivered = 0;
        let mut dead: Vec<DeviceId> = Vec::new();
        for (device_id, tx) in &state.devices {
            if *device_id == from.device_id {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        room = %from.room.name,
                        device = %device_id,
                        "outbound queue overflow, disconnecting slow device"
                    );
                    dead.push(*device_id);
                }
                Err(TrySendError::Closed(_)) => dead.push(*device_id),
            }
        }
        for device_id in dead {
            state.devices.remove(&device_id);
        }

        self.stats.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        delivered
    }

    /// Remove a device from its room; an emptied room is discarded along
    /// with its snapshot.
    pub fn leave(&self, handle: &DeviceHandle) {
        let mut rooms = self.lock_rooms();
        let mut state = handle.room.lock();

        state.devices.remove(&handle.device_id);
        let emptied = state.devices.is_empty();
        drop(state);

        if emptied {
            // Guard against a racing join having replaced the map entry.
            if rooms.get(&handle.room.name).is_some_and(|r| Arc::ptr_eq(r, &handle.room)) {
                rooms.remove(&handle.room.name);
                debug!(room = %handle.room.name, "room emptied and discarded");
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.lock_rooms().len()
    }

    pub fn device_count(&self) -> usize {
        let rooms: Vec<Arc<Room>> = self.lock_rooms().values().cloned().collect();
        rooms.iter().map(|r| r.lock().devices.len()).sum()
    }

    fn lock_rooms(&self) -> MutexGuard<'_, HashMap<String, Arc<Room>>> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }
}
