//! FAT32 directory traversal and file access (components B through G) on
//! top of a [`Storage`] medium.
//!
//! [`FatVolume`] is the entry point: mount it over a [`Storage`] and a
//! [`BootSectorLocator`], then drive it with [`FatVolume::cd`],
//! [`FatVolume::list_entries`], and [`FatVolume::read_file_to_sink`]/
//! [`FatVolume::open_file`].

pub mod boot_sector;
pub mod dir;
pub mod error;
pub mod file;
pub mod lfn;
pub mod navigator;
pub mod table;

pub use boot_sector::{Bpb, BootSectorLocator, FixedBootSector};
pub use dir::{AttributeSet, DirEntryInfo, DirEntryStream};
pub use error::FatError;
pub use file::{read_file_to_sink, FileReader};
pub use navigator::{is_illegal_name, DirCursor, EntryFilter};
pub use table::Cluster;

use crate::sink::ByteSink;
use crate::storage::Storage;

use typenum::consts::U512;

/// A mounted FAT32 volume: a [`Bpb`] plus the navigator's "current
/// directory" cursor. Every operation takes the backing [`Storage`] by
/// reference rather than owning it, matching this crate's no-heap,
/// no-ownership-of-the-transport design (see [`crate::sd::SdCard`]).
pub struct FatVolume {
    bpb: Bpb,
    cursor: DirCursor,
}

impl FatVolume {
    /// Locates and validates the boot sector via `locator`, then mounts at
    /// the root directory.
    pub fn mount<S: Storage<SECTOR_SIZE = U512>>(
        storage: &mut S,
        locator: &mut impl BootSectorLocator<S>,
    ) -> Result<Self, FatError> {
        let boot_sector_lba = locator.find_boot_sector(storage)?;
        let bpb = boot_sector::load_bpb(storage, boot_sector_lba)?;
        let cursor = DirCursor::root(&bpb);
        Ok(Self { bpb, cursor })
    }

    pub fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    pub fn cursor(&self) -> &DirCursor {
        &self.cursor
    }

    /// Changes the current directory. Atomic on failure: the cursor is
    /// left untouched unless `name` resolves successfully.
    pub fn cd<S: Storage<SECTOR_SIZE = U512>>(&mut self, storage: &mut S, name: &str) -> Result<(), FatError> {
        navigator::cd(storage, &self.bpb, &mut self.cursor, name)
    }

    /// Lists the entries of the current directory.
    pub fn list_entries<S: Storage<SECTOR_SIZE = U512>>(
        &self,
        storage: &mut S,
        filter: EntryFilter,
        visit: impl FnMut(&DirEntryInfo),
    ) -> Result<(), FatError> {
        navigator::list_entries(storage, &self.bpb, self.cursor.first_cluster, filter, visit)
    }

    /// Resolves `name` against the current directory, requiring it to be a
    /// (non-directory) file. Matches short names by splitting `name` at its
    /// first `.` into a name part and an extension part, unlike [`cd`][Self::cd]'s
    /// whole-name match (see [`navigator::resolve_with_extension`]).
    pub fn resolve_file<S: Storage<SECTOR_SIZE = U512>>(
        &self,
        storage: &mut S,
        name: &str,
    ) -> Result<DirEntryInfo, FatError> {
        if is_illegal_name(name) {
            return Err(FatError::IllegalName);
        }
        navigator::resolve_with_extension(storage, &self.bpb, self.cursor.first_cluster, name, |e| {
            !e.attrs.is_dir()
        })
    }

    /// Opens a read cursor over `entry`'s contents (see [`FileReader`]).
    pub fn open_file<'a, S: Storage<SECTOR_SIZE = U512>>(
        &'a self,
        storage: &'a mut S,
        entry: &'a DirEntryInfo,
    ) -> FileReader<'a, S> {
        FileReader::new(storage, &self.bpb, entry)
    }

    /// Resolves `name` against the current directory and streams its
    /// contents to `sink`.
    pub fn read_file_to_sink<S: Storage<SECTOR_SIZE = U512>>(
        &self,
        storage: &mut S,
        name: &str,
        sink: &mut impl ByteSink,
    ) -> Result<(), FatError> {
        let entry = self.resolve_file(storage, name)?;
        file::read_file_to_sink(storage, &self.bpb, &entry, sink)
    }
}
