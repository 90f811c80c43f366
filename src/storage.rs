//! Home of the [`Storage`] trait: the sector-addressed medium abstraction
//! that both [`crate::sd::SdCard`] and any in-memory test fixture implement.

use core::fmt::Debug;

use generic_array::{ArrayLength, GenericArray};
use typenum::marker_traits::Unsigned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WriteError<T> {
    /// `sector_idx >= self.sector_count()`.
    OutOfRange { requested_sector: u64 },
    Other(T),
}

impl<T> From<T> for WriteError<T> {
    fn from(other: T) -> Self {
        WriteError::Other(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReadError<T> {
    /// `sector_idx >= self.sector_count()`.
    OutOfRange { requested_sector: u64 },
    Other(T),
}

impl<T> From<T> for ReadError<T> {
    fn from(other: T) -> Self {
        ReadError::Other(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EraseError<W, T> {
    ErrorInIndividualWrite(WriteError<W>),
    Other(T),
}

impl<W, T> From<T> for EraseError<W, T> {
    fn from(other: T) -> Self {
        EraseError::Other(other)
    }
}

/// Implementors of this trait provide sector-addressed access to some block
/// medium (an SD card, a file standing in for one, a scripted fixture).
///
/// Sector size is fixed per implementor via `SECTOR_SIZE`; every consumer in
/// this crate uses `U512`, matching the `bytes_per_sector == 512` invariant
/// FAT32 volumes are validated against.
pub trait Storage {
    #[allow(non_camel_case_types)]
    type SECTOR_SIZE: ArrayLength<u8>;

    type ReadErr: Debug;
    type WriteErr: Debug;

    /// Reads one sector. `sector_idx` is a sector index, not a byte offset.
    fn read_sector(
        &mut self,
        sector_idx: u64,
        buffer: &mut GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), ReadError<Self::ReadErr>>;

    /// Writes one sector. `sector_idx` is a sector index, not a byte offset.
    fn write_sector(
        &mut self,
        sector_idx: u64,
        buffer: &GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), WriteError<Self::WriteErr>>;

    /// Number of sectors in the medium.
    fn sector_count(&self) -> u64;

    /// One greater than the largest valid byte offset in the medium.
    fn byte_count(&self) -> u64 {
        self.sector_count() * (Self::SECTOR_SIZE::to_usize() as u64)
    }

    /// Zeroes every sector. Mediums with a cheaper bulk-erase primitive
    /// (like an SD card's `CMD38`) should override this.
    fn erase(&mut self) -> Result<(), EraseError<Self::WriteErr, core::convert::Infallible>> {
        let zero = GenericArray::default();
        for idx in 0..self.sector_count() {
            self.write_sector(idx, &zero)
                .map_err(EraseError::ErrorInIndividualWrite)?;
        }
        Ok(())
    }
}

using_std! {
    use std::fmt::{self, Debug as _, Display};

    macro_rules! display_using_debug {
        ($ty:ident) => {
            impl<T: fmt::Debug> Display for $ty<T> {
                fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(self, fmt)
                }
            }
        };
    }

    macro_rules! err {
        ($ty:ident) => {
            display_using_debug!($ty);
            impl<T: fmt::Debug> std::error::Error for $ty<T> { }
        };
    }

    err!(WriteError);
    err!(ReadError);

    impl<W: fmt::Debug, T: fmt::Debug> Display for EraseError<W, T> {
        fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, fmt)
        }
    }
    impl<W: fmt::Debug, T: fmt::Debug> std::error::Error for EraseError<W, T> { }
}
