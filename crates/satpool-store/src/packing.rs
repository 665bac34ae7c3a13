//! Fixed-width packing of multi-field records into single 256-bit slots.
//!
//! Layouts are byte-oriented big-endian so every validator decodes identical
//! state. Two records are packed: the reservation header and a reservation
//! chunk. Signed accumulators store as two's complement over the full slot.

use alloy_primitives::U256;
use satpool_types::QueueKind;

/// Reservation header fields packed into one slot.
///
/// Layout (big-endian byte offsets):
/// `[0..8] created_at | [8..16] expiration | [16] activation_delay |`
/// `[17] flags (bit0 reserved_for_pool, bit1 timeout) | [18..22] purge_index |`
/// `[22..26] chunk_count`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationHeader {
    pub created_at: u64,
    pub expiration: u64,
    pub activation_delay: u8,
    pub reserved_for_pool: bool,
    pub timeout: bool,
    pub purge_index: u32,
    pub chunk_count: u32,
}

impl ReservationHeader {
    /// Encode into one storage slot. The all-default header encodes to zero,
    /// which is the "no reservation" sentinel.
    #[must_use]
    pub fn pack(&self) -> U256 {
        let mut bytes = [0u8; 32];
        bytes[0..8].copy_from_slice(&self.created_at.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.expiration.to_be_bytes());
        bytes[16] = self.activation_delay;
        bytes[17] = u8::from(self.reserved_for_pool) | (u8::from(self.timeout) << 1);
        bytes[18..22].copy_from_slice(&self.purge_index.to_be_bytes());
        bytes[22..26].copy_from_slice(&self.chunk_count.to_be_bytes());
        U256::from_be_bytes(bytes)
    }

    /// Decode from one storage slot. Zero decodes as `None` (no reservation).
    #[must_use]
    pub fn unpack(slot: U256) -> Option<Self> {
        if slot.is_zero() {
            return None;
        }
        let bytes: [u8; 32] = slot.to_be_bytes();
        Some(Self {
            created_at: u64::from_be_bytes(bytes[0..8].try_into().unwrap()),
            expiration: u64::from_be_bytes(bytes[8..16].try_into().unwrap()),
            activation_delay: bytes[16],
            reserved_for_pool: bytes[17] & 0b01 != 0,
            timeout: bytes[17] & 0b10 != 0,
            purge_index: u32::from_be_bytes(bytes[18..22].try_into().unwrap()),
            chunk_count: u32::from_be_bytes(bytes[22..26].try_into().unwrap()),
        })
    }
}

/// One reservation chunk packed into one slot.
///
/// Layout: `[0] queue tag | [1..9] queue slot | [9..25] token amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedChunk {
    pub queue: QueueKind,
    pub slot: u64,
    pub amount: u128,
}

impl PackedChunk {
    /// Encode into one storage slot.
    #[must_use]
    pub fn pack(&self) -> U256 {
        let mut bytes = [0u8; 32];
        bytes[0] = self.queue.to_u8() + 1; // +1 so a zero slot is never a valid chunk
        bytes[1..9].copy_from_slice(&self.slot.to_be_bytes());
        bytes[9..25].copy_from_slice(&self.amount.to_be_bytes());
        U256::from_be_bytes(bytes)
    }

    /// Decode from one storage slot; `None` for the zero slot or unknown tag.
    #[must_use]
    pub fn unpack(slot: U256) -> Option<Self> {
        if slot.is_zero() {
            return None;
        }
        let bytes: [u8; 32] = slot.to_be_bytes();
        let queue = QueueKind::from_u8(bytes[0].checked_sub(1)?)?;
        Some(Self {
            queue,
            slot: u64::from_be_bytes(bytes[1..9].try_into().unwrap()),
            amount: u128::from_be_bytes(bytes[9..25].try_into().unwrap()),
        })
    }
}

/// Store an i128 as its two's-complement image in a slot.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn pack_i128(value: i128) -> U256 {
    let low = U256::from(value as u128);
    if value < 0 {
        // Sign-extend into the high 128 bits.
        low | (U256::MAX << 128)
    } else {
        low
    }
}

/// Inverse of [`pack_i128`].
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unpack_i128(slot: U256) -> i128 {
    slot.wrapping_to::<u128>() as i128
}

/// Store a 32-byte id in a slot.
#[must_use]
pub fn pack_id(id: [u8; 32]) -> U256 {
    U256::from_be_bytes(id)
}

/// Inverse of [`pack_id`].
#[must_use]
pub fn unpack_id(slot: U256) -> [u8; 32] {
    slot.to_be_bytes()
}
