//! In-memory WebRTC signaling relay
//!
//! Call setup data (offers, answers, ICE candidates) is exchanged through
//! short-lived rooms keyed by match id. Rooms are evicted after a period of
//! inactivity so an abandoned call cannot pin memory forever; a background
//! task calls [`SignalingStore::sweep_expired`] periodically.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::store::AccountId;

/// Signals one peer has published for the other to poll
#[derive(Debug, Default, Clone)]
pub struct PeerSignals {
    pub offer: Option<Value>,
    pub answer: Option<Value>,
    pub ice_candidates: Vec<Value>,
}

#[derive(Debug)]
struct CallRoom {
    initiator: AccountId,
    started_at: DateTime<Utc>,
    peers: HashMap<AccountId, PeerSignals>,
    last_activity: Instant,
}

/// Snapshot returned by [`SignalingStore::status`]
#[derive(Debug, Clone)]
pub struct CallStatus {
    pub active: bool,
    pub initiator: Option<AccountId>,
    pub started_at: Option<DateTime<Utc>>,
    pub participants: usize,
}

pub struct SignalingStore {
    rooms: RwLock<HashMap<String, CallRoom>>,
    ttl: Duration,
}

impl SignalingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Open a room for a match, or touch it if one already exists.
    pub fn initiate(&self, match_id: &str, caller: &AccountId) {
        let mut rooms = self.rooms.write().unwrap();
        rooms
            .entry(match_id.to_string())
            .and_modify(|room| room.last_activity = Instant::now())
            .or_insert_with(|| CallRoom {
                initiator: caller.clone(),
                started_at: Utc::now(),
                peers: HashMap::new(),
                last_activity: Instant::now(),
            });
    }

    pub fn put_offer(&self, match_id: &str, sender: &AccountId, offer: Value) {
        let mut rooms = self.rooms.write().unwrap();
        let room = Self::room_entry(&mut rooms, match_id, sender);
        room.peers.entry(sender.clone()).or_default().offer = Some(offer);
        room.last_activity = Instant::now();
    }

    pub fn put_answer(&self, match_id: &str, sender: &AccountId, answer: Value) {
        let mut rooms = self.rooms.write().unwrap();
        let room = Self::room_entry(&mut rooms, match_id, sender);
        room.peers.entry(sender.clone()).or_default().answer = Some(answer);
        room.last_activity = Instant::now();
    }

    pub fn put_ice_candidate(&self, match_id: &str, sender: &AccountId, candidate: Value) {
        let mut rooms = self.rooms.write().unwrap();
        let room = Self::room_entry(&mut rooms, match_id, sender);
        room.peers
            .entry(sender.clone())
            .or_default()
            .ice_candidates
            .push(candidate);
        room.last_activity = Instant::now();
    }

    /// Read the signals the counterpart peer has published so far.
    pub fn poll(&self, match_id: &str, counterpart: &AccountId) -> PeerSignals {
        let rooms = self.rooms.read().unwrap();
        rooms
            .get(match_id)
            .and_then(|room| room.peers.get(counterpart))
            .cloned()
            .unwrap_or_default()
    }

    /// Tear down a room. Ending a call that was never started is a no-op.
    pub fn end(&self, match_id: &str) {
        let mut rooms = self.rooms.write().unwrap();
        rooms.remove(match_id);
    }

    pub fn status(&self, match_id: &str) -> CallStatus {
        let rooms = self.rooms.read().unwrap();
        match rooms.get(match_id) {
            Some(room) => CallStatus {
                active: true,
                initiator: Some(room.initiator.clone()),
                started_at: Some(room.started_at),
                participants: room.peers.len(),
            },
            None => CallStatus {
                active: false,
                initiator: None,
                started_at: None,
                participants: 0,
            },
        }
    }

    /// Drop rooms with no activity within the TTL. Returns how many were
    /// evicted.
    pub fn sweep_expired(&self) -> usize {
        let mut rooms = self.rooms.write().unwrap();
        let before = rooms.len();
        let ttl = self.ttl;
        rooms.retain(|_, room| room.last_activity.elapsed() < ttl);
        before - rooms.len()
    }

    // Publishing a signal before /initiate still creates the room; the first
    // publisher becomes the recorded initiator.
    fn room_entry<'a>(
        rooms: &'a mut HashMap<String, CallRoom>,
        match_id: &str,
        sender: &AccountId,
    ) -> &'a mut CallRoom {
        rooms
            .entry(match_id.to_string())
            .or_insert_with(|| CallRoom {
                initiator: sender.clone(),
                started_at: Utc::now(),
                peers: HashMap::new(),
                last_activity: Instant::now(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> AccountId {
        AccountId(s.to_string())
    }

    #[test]
    fn test_poll_sees_counterpart_signals_only() {
        let store = SignalingStore::new(Duration::from_secs(60));
        store.initiate("m1", &id("alice"));
        store.put_offer("m1", &id("alice"), json!({"sdp": "offer-a"}));
        store.put_ice_candidate("m1", &id("alice"), json!({"candidate": "c1"}));
        store.put_ice_candidate("m1", &id("alice"), json!({"candidate": "c2"}));

        // Bob polls for Alice's signals
        let signals = store.poll("m1", &id("alice"));
        assert_eq!(signals.offer, Some(json!({"sdp": "offer-a"})));
        assert!(signals.answer.is_none());
        assert_eq!(signals.ice_candidates.len(), 2);

        // Nothing published by Bob yet
        let signals = store.poll("m1", &id("bob"));
        assert!(signals.offer.is_none());
        assert!(signals.ice_candidates.is_empty());
    }

    #[test]
    fn test_status_and_end() {
        let store = SignalingStore::new(Duration::from_secs(60));
        assert!(!store.status("m1").active);

        store.initiate("m1", &id("alice"));
        store.put_offer("m1", &id("alice"), json!({}));
        store.put_answer("m1", &id("bob"), json!({}));

        let status = store.status("m1");
        assert!(status.active);
        assert_eq!(status.initiator, Some(id("alice")));
        assert_eq!(status.participants, 2);

        store.end("m1");
        assert!(!store.status("m1").active);
        // Ending twice is fine
        store.end("m1");
    }

    #[test]
    fn test_sweep_evicts_idle_rooms() {
        let store = SignalingStore::new(Duration::from_millis(0));
        store.initiate("m1", &id("alice"));
        store.initiate("m2", &id("bob"));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.sweep_expired(), 2);
        assert!(!store.status("m1").active);
    }

    #[test]
    fn test_activity_keeps_room_alive() {
        let store = SignalingStore::new(Duration::from_secs(60));
        store.initiate("m1", &id("alice"));
        assert_eq!(store.sweep_expired(), 0);
        assert!(store.status("m1").active);
    }
}
