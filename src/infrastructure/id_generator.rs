// Snowflake-style id generation with embedded shard information

use std::sync::Mutex;

use crate::models::{current_time_millis, TaoId};

const SHARD_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// 64-bit id layout: [timestamp:42][shard_id:10][sequence:12]
///
/// Ids are strictly increasing per generator, so ordering by id is ordering
/// by creation time within a shard.
#[derive(Debug)]
pub struct TaoIdGenerator {
    shard_id: u16,
    // (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl TaoIdGenerator {
    pub fn new(shard_id: u16) -> Self {
        assert!(shard_id < 1024, "Shard ID must be less than 1024");

        Self {
            shard_id,
            state: Mutex::new((0, 0)),
        }
    }

    pub fn next_id(&self) -> TaoId {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (last_ts, sequence) = *state;

        let mut now = current_time_millis().max(0) as u64;
        // Clock went backwards or same millisecond: stay on the last timestamp
        if now <= last_ts {
            now = last_ts;
        }

        let sequence = if now == last_ts {
            if sequence >= MAX_SEQUENCE {
                // Sequence exhausted, borrow the next millisecond
                now += 1;
                0
            } else {
                sequence + 1
            }
        } else {
            0
        };
        *state = (now, sequence);

        (((now & 0x3FF_FFFF_FFFF) << (SHARD_BITS + SEQUENCE_BITS))
            | ((self.shard_id as u64) << SEQUENCE_BITS)
            | sequence) as TaoId
    }

    pub fn extract_shard_id(id: TaoId) -> u16 {
        ((id as u64) >> SEQUENCE_BITS & 0x3FF) as u16
    }

    pub fn extract_timestamp(id: TaoId) -> u64 {
        (id as u64) >> (SHARD_BITS + SEQUENCE_BITS)
    }

    pub fn shard_id(&self) -> u16 {
        self.shard_id
    }
}
