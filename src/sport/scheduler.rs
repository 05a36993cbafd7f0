//! # Sensor Scheduler
//!
//! Fixed-capacity table of outbound sensor values with two-tier, age-based
//! pop ordering. Status-text chunks (0x5000) are tier 2 and only go out
//! when no other sensor value is pending, so a chatty autopilot cannot
//! starve flight-critical telemetry.

use tracing::warn;

use super::pack::PackRequest;
use super::protocol::sensor;

/// Number of table slots.
pub const TABLE_CAPACITY: usize = 32;

/// Log every Nth dropped record, not every one.
const DROP_LOG_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy)]
struct Slot {
    request: PackRequest,
    enqueued_ms: u64,
    in_use: bool,
}

const EMPTY_SLOT: Slot = Slot {
    request: PackRequest {
        id: 0,
        sub_id: 0,
        payload: 0,
    },
    enqueued_ms: 0,
    in_use: false,
};

/// Pending-sensor table. Push is fire-and-forget; pop frees the slot
/// immediately, there is no retransmission path.
pub struct SensorTable {
    slots: [Slot; TABLE_CAPACITY],
    dropped: u64,
}

impl SensorTable {
    pub fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; TABLE_CAPACITY],
            dropped: 0,
        }
    }

    /// Records dropped because the table was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Number of slots currently in use.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Place a record in the first free slot. A full table drops the new
    /// record; existing entries are never overwritten.
    pub fn push(&mut self, request: PackRequest, now_ms: u64) {
        match self.slots.iter_mut().find(|s| !s.in_use) {
            Some(slot) => {
                *slot = Slot {
                    request,
                    enqueued_ms: now_ms,
                    in_use: true,
                };
            }
            None => {
                self.dropped += 1;
                if self.dropped % DROP_LOG_INTERVAL == 1 {
                    warn!(
                        dropped = self.dropped,
                        "sensor table full, check downlink throughput"
                    );
                }
            }
        }
    }

    /// Pop the record most starved of airtime.
    ///
    /// Each in-use slot gets a score of `now - enqueued - sub_id`; the
    /// sub-id penalty gives earlier chunks of a multi-part value priority
    /// over later ones. The highest-scoring non-text record wins; text
    /// records are considered only when no non-text record scores above
    /// zero. Returns `None` when nothing has a positive score.
    pub fn pop_best(&mut self, now_ms: u64) -> Option<PackRequest> {
        let mut max_tier1: i64 = 0;
        let mut max_tier2: i64 = 0;
        let mut ptr_tier1 = None;
        let mut ptr_tier2 = None;

        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.in_use {
                continue;
            }
            let age = now_ms as i64 - slot.enqueued_ms as i64 - i64::from(slot.request.sub_id);
            if slot.request.id == sensor::TEXT_MSG {
                if age >= max_tier2 {
                    max_tier2 = age;
                    ptr_tier2 = Some(i);
                }
            } else if age >= max_tier1 {
                max_tier1 = age;
                ptr_tier1 = Some(i);
            }
        }

        let winner = if max_tier1 > 0 {
            ptr_tier1
        } else if max_tier2 > 0 {
            ptr_tier2
        } else {
            None
        }?;

        self.slots[winner].in_use = false;
        Some(self.slots[winner].request)
    }
}

impl Default for SensorTable {
    fn default() -> Self {
        Self::new()
    }
}
