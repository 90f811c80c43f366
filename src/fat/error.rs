//! The filesystem-level error taxonomy (component-agnostic; every
//! component in `fat` returns through this).

use crate::sd::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FatError {
    /// Boot sector signature (`0x55 0xAA`) missing.
    NotABootSector,
    /// `bytes_per_sector != 512`.
    UnsupportedSectorSize,
    /// `sectors_per_cluster` not a power of two in `1..=128`.
    UnsupportedClusterSize,
    /// A FAT entry's reserved upper nibble was non-zero in a way that made
    /// the cluster value unusable, or a cluster chain ran past a reasonable
    /// bound without reaching an end-of-chain marker. Always fatal; the
    /// cursor this happened during is left unmodified.
    CorruptFatEntry,
    /// `cd`/`open_file` found no entry matching the requested name.
    NotFound,
    /// `cd` matched an entry that is not a directory.
    NotADirectory,
    /// `open_file` matched an entry that is a directory.
    NotAFile,
    /// The requested name fails the legality pre-check (empty, leading
    /// space, all spaces, or contains one of `\ / : * ? " < > |`).
    IllegalName,
    /// The underlying block transport failed.
    Transport(TransportError),
}

impl From<TransportError> for FatError {
    fn from(e: TransportError) -> Self {
        FatError::Transport(e)
    }
}

using_std! {
    use std::fmt;

    impl fmt::Display for FatError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    impl std::error::Error for FatError {}
}
