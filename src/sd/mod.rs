//! SD-over-SPI block transport (component A): single- and multi-block
//! read/write, erase, and well-written-block count.

pub mod bus;
pub mod status;
pub mod transport;

pub use bus::SpiBus;
pub use status::{TransportError, TransportOutcome, TransportSuccess};
pub use transport::SdCard;
