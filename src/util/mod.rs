//! Small bit-level helpers shared by attribute-byte and status-word decoding.

pub mod bits;
pub use bits::Bits;
