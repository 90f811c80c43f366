//! The external SPI capability the block transport is driven through.
//!
//! Nothing in this crate toggles a GPIO pin or clocks a byte out of a shift
//! register; a caller supplies an [`SpiBus`] impl wired to real hardware (or
//! a scripted fixture for tests) and [`super::SdCard`] sequences commands
//! and tokens over it.

/// SD command indices used by [`super::SdCard`]. Named the way the command
/// table in the SD simplified physical layer spec names them.
pub mod cmd {
    pub const GO_IDLE_STATE: u8 = 0;
    pub const APP_CMD: u8 = 55;
    pub const READ_SINGLE_BLOCK: u8 = 17;
    pub const WRITE_BLOCK: u8 = 24;
    pub const READ_MULTIPLE_BLOCK: u8 = 18;
    pub const WRITE_MULTIPLE_BLOCK: u8 = 25;
    pub const STOP_TRANSMISSION: u8 = 12;
    pub const ERASE_WR_BLK_START_ADDR: u8 = 32;
    pub const ERASE_WR_BLK_END_ADDR: u8 = 33;
    pub const ERASE: u8 = 38;
    /// ACMD22, sent after `APP_CMD`.
    pub const SEND_NUM_WR_BLOCKS: u8 = 22;
}

/// Tokens exchanged during data transfer, per the SD simplified physical
/// layer spec.
pub mod token {
    pub const START_BLOCK: u8 = 0xFE;
    pub const START_BLOCK_MULTI_WRITE: u8 = 0xFC;
    pub const STOP_TRAN: u8 = 0xFD;

    pub const DATA_RESPONSE_MASK: u8 = 0x1F;
    pub const DATA_ACCEPTED: u8 = 0x05;
    pub const DATA_CRC_ERROR: u8 = 0x0B;
    pub const DATA_WRITE_ERROR: u8 = 0x0D;
}

/// R1 response, card idle after `GO_IDLE_STATE`/reset.
pub const R1_OUT_OF_IDLE: u8 = 0x00;

/// Bounded busy-wait iteration counts. The original AVR source picks these
/// empirically for the SPI clock it runs at; no wall-clock timer is
/// available so every wait in this crate is iteration-bounded instead.
pub mod timeout {
    pub const START_TOKEN: u32 = 0x511;
    pub const DATA_RESPONSE: u32 = 0xFF;
    pub const CARD_BUSY: u32 = 511;
    pub const SINGLE_BLOCK_TIMEOUT_LIMIT: u32 = 0xFF;
}

/// Raw SPI primitives plus the command/response framing SD-over-SPI layers
/// on top of them. A single trait rather than `spi_send`/`spi_recv` plus a
/// free-standing command encoder, since every implementor ends up needing
/// both halves together.
pub trait SpiBus {
    fn send_byte(&mut self, b: u8);
    fn recv_byte(&mut self) -> u8;

    fn cs_low(&mut self);
    fn cs_high(&mut self);

    /// Sends a 6-byte command frame (command token, 32-bit big-endian
    /// argument, CRC byte) and leaves the bus ready for `get_r1`.
    fn send_command(&mut self, cmd: u8, arg: u32);

    /// Polls for the R1 response byte following a command (top bit clear).
    fn get_r1(&mut self) -> u8;
}
