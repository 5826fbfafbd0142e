use bytes::{BufMut, Bytes, BytesMut};

use crate::parity::parity_bit;

/// Stream slots produced per message byte: the data byte itself plus its
/// parity bit in the following slot.
pub const SLOTS_PER_BYTE: usize = 2;

/// Append the interleaved data/parity stream for `message` to `dst`.
///
/// Stream layout per message byte:
/// ```text
/// ┌────────────┬─────────────────┐
/// │ data byte  │ parity (0 or 1) │
/// └────────────┴─────────────────┘
/// ```
/// The UART capability packs each adjacent pair into one 9-bit symbol
/// before it reaches the wire.
pub fn assemble_into(message: &[u8], dst: &mut BytesMut) {
    dst.reserve(message.len() * SLOTS_PER_BYTE);
    for &byte in message {
        dst.put_u8(byte);
        dst.put_u8(parity_bit(byte));
    }
}

/// Assemble `message` into a freshly allocated frame stream.
pub fn assemble(message: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(message.len() * SLOTS_PER_BYTE);
    assemble_into(message, &mut buf);
    buf.freeze()
}
