//! Event dispatcher: stamps ordering metadata and fans events out.
//!
//! The dispatcher owns the in-memory log for the combat and the set of
//! consumer channels. Consumers are pure sinks behind unbounded senders;
//! a consumer that goes away is dropped with a warning and the simulation
//! continues — consumer failure must never corrupt a combat.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::warn;

use super::{EventPayload, EventRecord};
use crate::config;

/// Salt separating the event-id RNG stream from the gameplay stream, so id
/// generation never perturbs gameplay rolls for the same seed.
const ID_STREAM_SALT: u64 = 0x5eed_1d5;

pub struct EventDispatcher {
    seq: u64,
    id_rng: StdRng,
    log: Vec<EventRecord>,
    consumers: Vec<mpsc::UnboundedSender<EventRecord>>,
}

impl EventDispatcher {
    pub fn new(seed: u64) -> EventDispatcher {
        EventDispatcher {
            seq: 0,
            id_rng: StdRng::seed_from_u64(seed ^ ID_STREAM_SALT),
            log: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Register a consumer channel. Everything dispatched from now on is
    /// forwarded; use `events_since` to catch up on the past.
    pub fn add_consumer(&mut self, tx: mpsc::UnboundedSender<EventRecord>) {
        self.consumers.push(tx);
    }

    /// Convenience: open a fresh channel and register its sender.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EventRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_consumer(tx);
        rx
    }

    /// Seal and deliver one event: assign the next `seq`, generate the
    /// event id, stamp the current simulation time, forward to consumers,
    /// append to the log. Returns the assigned `seq`.
    pub fn dispatch(&mut self, now_ticks: u64, payload: EventPayload) -> u64 {
        self.seq += 1;
        let record = EventRecord {
            seq: self.seq,
            event_id: self.next_event_id(),
            timestamp: config::ticks_to_secs(now_ticks),
            payload,
        };

        self.consumers.retain(|tx| {
            let delivered = tx.send(record.clone()).is_ok();
            if !delivered {
                warn!(
                    seq = record.seq,
                    kind = record.payload.kind_name(),
                    "event consumer went away, dropping it"
                );
            }
            delivered
        });

        self.log.push(record);
        self.seq
    }

    /// UUID-shaped id from the dedicated id stream. Deterministic for a
    /// given seed.
    fn next_event_id(&mut self) -> String {
        let hi: u64 = self.id_rng.gen();
        let lo: u64 = self.id_rng.gen();
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (hi >> 32) as u32,
            (hi >> 16) as u16,
            hi as u16,
            (lo >> 48) as u16,
            lo & 0xffff_ffff_ffff
        )
    }

    /// All events with `seq` strictly greater than `after_seq`, in order.
    /// Backs resumable streaming for the lifetime of the combat instance.
    pub fn events_since(&self, after_seq: u64) -> Vec<EventRecord> {
        self.log
            .iter()
            .filter(|e| e.seq > after_seq)
            .cloned()
            .collect()
    }

    pub fn log(&self) -> &[EventRecord] {
        &self.log
    }

    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    pub fn into_log(self) -> Vec<EventRecord> {
        self.log
    }
}
