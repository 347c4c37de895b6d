//! Little-endian save-state codec for petrel components.
//!
//! Save states are flat byte streams: each component encodes its fields in a
//! fixed, documented order and decodes them back in the same order. The
//! stream carries no self-describing structure; components intersperse
//! literal marker tokens so that a desynchronized stream fails loudly
//! instead of silently shifting every following field.

mod codec;
mod error;

pub use crate::codec::{Decoder, Encoder};
pub use crate::error::{Result, SnapshotError};
