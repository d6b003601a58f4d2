//! Typed field decoding and state updates for framed packets.

pub mod ascii;
pub mod raw;
