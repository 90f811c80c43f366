//! Sum-type outcomes for the block transport, replacing the packed
//! `(upper byte = class) | (lower byte = raw R1)` status words the original
//! source returns from every `sd_*`/`SD_*` call.
//!
//! [`TransportSuccess`] and [`TransportError`] both carry the raw R1 byte
//! so nothing is lost versus the packed representation, and
//! [`TransportOutcome::to_packed`] reconstructs the exact original layout
//! for callers (logging, FFI) that still want it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSuccess {
    ReadSuccess,
    DataAccepted,
    EraseSuccessful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    R1Error,
    StartTokenTimeout,
    DataResponseTimeout,
    CardBusyTimeout,
    CrcErrorTokenReceived,
    WriteErrorTokenReceived,
    InvalidDataResponse,
    SetEraseStartAddrError,
    SetEraseEndAddrError,
    EraseError,
    EraseBusyTimeout,
}

impl TransportSuccess {
    const fn class_byte(self) -> u8 {
        match self {
            TransportSuccess::ReadSuccess => 0x01,
            TransportSuccess::DataAccepted => 0x02,
            TransportSuccess::EraseSuccessful => 0x03,
        }
    }
}

impl TransportError {
    const fn class_byte(self) -> u8 {
        match self {
            TransportError::R1Error => 0x80,
            TransportError::StartTokenTimeout => 0x81,
            TransportError::DataResponseTimeout => 0x82,
            TransportError::CardBusyTimeout => 0x83,
            TransportError::CrcErrorTokenReceived => 0x84,
            TransportError::WriteErrorTokenReceived => 0x85,
            TransportError::InvalidDataResponse => 0x86,
            TransportError::SetEraseStartAddrError => 0x87,
            TransportError::SetEraseEndAddrError => 0x88,
            TransportError::EraseError => 0x89,
            TransportError::EraseBusyTimeout => 0x8A,
        }
    }
}

/// An `(outcome, raw R1 byte)` pair, exactly what every `sd_*` call in the
/// original source returns, just not packed into one `u16` on the way out.
pub type TransportOutcome = Result<TransportSuccess, TransportError>;

/// Packs `(outcome, r1)` into the original `upper byte = class, lower byte
/// = raw R1` layout.
pub fn to_packed(outcome: TransportOutcome, r1: u8) -> u16 {
    let class = match outcome {
        Ok(s) => s.class_byte(),
        Err(e) => e.class_byte(),
    };
    ((class as u16) << 8) | (r1 as u16)
}

using_std! {
    use std::fmt;

    impl fmt::Display for TransportError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    impl std::error::Error for TransportError {}
}
