// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// This is a very small reimplementation of [bytes::Buf] with just the parts needed for this
/// crate.
///
/// [bytes::Buf]: https://docs.rs/bytes/*/bytes/trait.Buf.html
pub(crate) trait Buffer {
    fn get_u16_le(&mut self) -> u16;
}

impl Buffer for &[u8] {
    fn get_u16_le(&mut self) -> u16 {
        let (bytes, rest) = self.split_at(2);
        *self = rest;
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}

/// Set or clear the n-th bit.
pub(crate) fn with_bit<B>(value: B, index: usize, set: bool) -> B
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    let mask = B::one() << index;
    if set {
        value | mask
    } else {
        value & !mask
    }
}
